// Wed Jan 15 2026 - Alex

use crate::memory::{Address, AddressWidth, MemoryError, ModuleInfo, Protection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    /// Memory of the calling process, accessed by direct copy.
    Local,
    /// Another process, accessed through OS calls.
    Remote,
}

/// Raw OS-level access to one target process.
///
/// Implementations never interpret the bytes they move; typing, string
/// decoding and failure policy live in [`crate::memory::TypedMemory`].
pub trait ProcessAccess: Send + Sync {
    fn kind(&self) -> AccessKind;

    fn address_width(&self) -> AddressWidth;

    /// Fills `buf` from `addr`. Either the whole buffer is read or an
    /// `AccessViolation` is returned.
    fn read_into(&self, addr: Address, buf: &mut [u8]) -> Result<(), MemoryError>;

    fn read_bytes(&self, addr: Address, len: usize) -> Result<Vec<u8>, MemoryError> {
        let mut buf = vec![0u8; len];
        self.read_into(addr, &mut buf)?;
        Ok(buf)
    }

    /// Returns the number of bytes written.
    fn write_bytes(&self, addr: Address, data: &[u8]) -> Result<usize, MemoryError>;

    fn allocate(&self, size: usize, protection: Protection) -> Result<Address, MemoryError>;

    fn free(&self, addr: Address, size: usize) -> Result<(), MemoryError>;

    /// Changes protection and returns the previous one.
    fn protect(&self, addr: Address, size: usize, protection: Protection) -> Result<Protection, MemoryError>;

    fn enumerate_modules(&self) -> Result<Vec<ModuleInfo>, MemoryError>;
}
