// Tue Jan 13 2026 - Alex

pub mod access;
pub mod address;
pub mod allocation;
pub mod encoding;
pub mod error;
pub mod maps;
pub mod protection;
pub mod region;
pub mod simulated;
pub mod traits;
pub mod value;

#[cfg(target_os = "linux")]
pub mod local;
#[cfg(target_os = "linux")]
pub mod remote;
#[cfg(target_os = "linux")]
pub mod vm;

pub use access::TypedMemory;
pub use address::{Address, AddressWidth};
pub use allocation::{AllocatedMemory, AllocationKey, AllocationTable, ScopedAllocation};
pub use encoding::StringEncoding;
pub use error::MemoryError;
pub use protection::Protection;
pub use region::{MemoryRegion, ModuleInfo};
pub use simulated::SimulatedProcess;
pub use traits::{AccessKind, ProcessAccess};
pub use value::{Primitive, StructReader, StructWriter, Structure};

#[cfg(target_os = "linux")]
pub use local::LocalProcess;
#[cfg(target_os = "linux")]
pub use remote::RemoteProcess;
