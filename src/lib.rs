// Tue Jan 15 2026 - Alex

pub mod config;
pub mod detour;
pub mod memory;
pub mod pattern;
pub mod process;
pub mod rtti;
pub mod symbol;
pub mod utils;

pub use config::EngineConfig;
pub use detour::{CallingConvention, Detour, DetourBuilder, DetourError, DetourManager, FunctionPtr};
pub use memory::{Address, AddressWidth, MemoryError, ProcessAccess, Protection, TypedMemory};
pub use pattern::{Pattern, PatternError, PatternScanner, ScanResult, SearchAlgorithm};
pub use process::TargetProcess;
pub use rtti::RttiResolver;
