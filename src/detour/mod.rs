// Thu Jan 16 2026 - Alex

pub mod asm;
pub mod convention;
pub mod detour;
pub mod error;
pub mod function;
pub mod manager;

pub use asm::PatchStrategy;
pub use convention::CallingConvention;
pub use detour::{Detour, DetourBuilder, DetourStatus};
pub use error::DetourError;
pub use function::FunctionPtr;
pub use manager::DetourManager;
