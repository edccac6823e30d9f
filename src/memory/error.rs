// Tue Jan 13 2026 - Alex

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Access violation at address 0x{0:x}")]
    AccessViolation(u64),
    #[error("Write failed at address 0x{0:x}")]
    WriteFailed(u64),
    #[error("Allocation of {0} bytes failed")]
    AllocationFailure(usize),
    #[error("Region not found: {0}")]
    RegionNotFound(String),
    #[error("Process not found: {0}")]
    ProcessNotFound(String),
    #[error("Module not found: {0}")]
    ModuleNotFound(String),
    #[error("Invalid memory range")]
    InvalidRange,
    #[error("Encoding error: {0}")]
    Encoding(String),
    #[error("Not supported: {0}")]
    NotSupported(String),
}

impl MemoryError {
    pub fn is_access_violation(&self) -> bool {
        matches!(self, Self::AccessViolation(_))
    }
}
