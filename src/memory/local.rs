// Wed Jan 15 2026 - Alex

use crate::memory::maps::{modules_from_maps, read_maps};
use crate::memory::vm;
use crate::memory::{
    AccessKind, Address, AddressWidth, MemoryError, MemoryRegion, ModuleInfo, ProcessAccess, Protection,
};
use parking_lot::RwLock;

/// The calling process. Reads and writes go through `process_vm_readv` and
/// `process_vm_writev` on our own pid, so a page unmapped behind our back
/// yields `EFAULT` instead of a fault. Where those calls are filtered the
/// copy is guarded by a fresh `/proc/self/maps` snapshot.
pub struct LocalProcess {
    pid: u32,
    regions: RwLock<Vec<MemoryRegion>>,
    page_size: usize,
}

impl LocalProcess {
    pub fn new() -> Result<Self, MemoryError> {
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        let process = Self {
            pid: std::process::id(),
            regions: RwLock::new(Vec::new()),
            page_size: if page_size > 0 { page_size as usize } else { 4096 },
        };
        process.refresh()?;
        Ok(process)
    }

    pub fn refresh(&self) -> Result<(), MemoryError> {
        let mut regions: Vec<MemoryRegion> = read_maps(None)?.iter().map(|e| e.region()).collect();
        regions.sort_by_key(|r| r.start());
        *self.regions.write() = regions;
        Ok(())
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    fn region_at(regions: &[MemoryRegion], addr: Address) -> Option<&MemoryRegion> {
        let idx = regions.partition_point(|r| r.end() <= addr);
        regions.get(idx).filter(|r| r.contains(addr))
    }

    fn covered(&self, addr: Address, len: usize, allowed: fn(Protection) -> bool) -> bool {
        let Some(end) = addr.checked_add(len as u64) else {
            return false;
        };
        let regions = self.regions.read();
        let mut cursor = addr;
        while cursor < end {
            match Self::region_at(&regions, cursor) {
                Some(region) if allowed(region.protection()) => cursor = region.end(),
                _ => return false,
            }
        }
        true
    }

    /// Re-reads the layout, then checks the whole range.
    fn accessible(&self, addr: Address, len: usize, allowed: fn(Protection) -> bool) -> bool {
        if addr.is_null() {
            return false;
        }
        if let Err(e) = self.refresh() {
            log::warn!("Failed to refresh memory layout: {}", e);
            return false;
        }
        self.covered(addr, len, allowed)
    }

    fn guarded_read(&self, addr: Address, buf: &mut [u8]) -> Result<(), MemoryError> {
        if !self.accessible(addr, buf.len(), Protection::can_read) {
            return Err(MemoryError::AccessViolation(addr.as_u64()));
        }
        unsafe {
            std::ptr::copy_nonoverlapping(addr.as_ptr(), buf.as_mut_ptr(), buf.len());
        }
        Ok(())
    }

    fn guarded_write(&self, addr: Address, data: &[u8]) -> Result<usize, MemoryError> {
        if !self.accessible(addr, data.len(), Protection::can_write) {
            return Err(MemoryError::WriteFailed(addr.as_u64()));
        }
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), addr.as_mut_ptr(), data.len());
        }
        Ok(data.len())
    }

    fn page_span(&self, addr: Address, size: usize) -> (Address, usize) {
        let start = addr.align_down(self.page_size);
        let end = (addr + size).align_up(self.page_size);
        (start, (end.as_u64() - start.as_u64()) as usize)
    }
}

impl ProcessAccess for LocalProcess {
    fn kind(&self) -> AccessKind {
        AccessKind::Local
    }

    fn address_width(&self) -> AddressWidth {
        AddressWidth::native()
    }

    fn read_into(&self, addr: Address, buf: &mut [u8]) -> Result<(), MemoryError> {
        if buf.is_empty() {
            return Ok(());
        }
        if addr.is_null() {
            return Err(MemoryError::AccessViolation(0));
        }
        match vm::read(self.pid, addr, buf) {
            Ok(read) if read == buf.len() => Ok(()),
            Err(e) if vm::unavailable(&e) => self.guarded_read(addr, buf),
            _ => Err(MemoryError::AccessViolation(addr.as_u64())),
        }
    }

    fn write_bytes(&self, addr: Address, data: &[u8]) -> Result<usize, MemoryError> {
        if data.is_empty() {
            return Ok(0);
        }
        if addr.is_null() {
            return Err(MemoryError::WriteFailed(0));
        }
        match vm::write(self.pid, addr, data) {
            Ok(written) if written > 0 => Ok(written),
            Err(e) if vm::unavailable(&e) => self.guarded_write(addr, data),
            _ => Err(MemoryError::WriteFailed(addr.as_u64())),
        }
    }

    fn allocate(&self, size: usize, protection: Protection) -> Result<Address, MemoryError> {
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                protection.to_prot(),
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(MemoryError::AllocationFailure(size));
        }
        self.refresh()?;
        Ok(Address::from_ptr(ptr))
    }

    fn free(&self, addr: Address, size: usize) -> Result<(), MemoryError> {
        let result = unsafe { libc::munmap(addr.as_mut_ptr() as *mut libc::c_void, size) };
        if result != 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        self.refresh()
    }

    fn protect(&self, addr: Address, size: usize, protection: Protection) -> Result<Protection, MemoryError> {
        let old = {
            let regions = self.regions.read();
            Self::region_at(&regions, addr).map(|r| r.protection())
        };
        let old = match old {
            Some(p) => p,
            None => {
                self.refresh()?;
                let regions = self.regions.read();
                Self::region_at(&regions, addr)
                    .map(|r| r.protection())
                    .ok_or_else(|| MemoryError::RegionNotFound(addr.to_string()))?
            }
        };

        let (start, len) = self.page_span(addr, size);
        let result = unsafe { libc::mprotect(start.as_mut_ptr() as *mut libc::c_void, len, protection.to_prot()) };
        if result != 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        self.refresh()?;
        Ok(old)
    }

    fn enumerate_modules(&self) -> Result<Vec<ModuleInfo>, MemoryError> {
        Ok(modules_from_maps(&read_maps(None)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_own_memory() {
        let process = LocalProcess::new().unwrap();
        let value: u64 = 0xDEAD_BEEF_CAFE_BABE;
        let addr = Address::from_ptr(&value as *const u64);

        let bytes = process.read_bytes(addr, 8).unwrap();
        assert_eq!(bytes, value.to_le_bytes());
    }

    #[test]
    fn test_unmapped_read_is_access_violation() {
        let process = LocalProcess::new().unwrap();
        let err = process.read_bytes(Address::new(0x10), 4).unwrap_err();
        assert!(err.is_access_violation());
    }

    #[test]
    fn test_read_after_foreign_protect_is_access_violation() {
        let process = LocalProcess::new().unwrap();
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                4096,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        assert_ne!(ptr, libc::MAP_FAILED);
        let page = Address::from_ptr(ptr as *const u8);
        process.refresh().unwrap();
        assert_eq!(process.read_bytes(page, 8).unwrap(), vec![0; 8]);

        // the cached layout still lists the page as read-write
        assert_eq!(unsafe { libc::mprotect(ptr, 4096, libc::PROT_NONE) }, 0);
        let err = process.read_bytes(page, 8).unwrap_err();
        assert!(err.is_access_violation());
        assert!(process.write_bytes(page, &[1]).is_err());

        assert_eq!(unsafe { libc::munmap(ptr, 4096) }, 0);
    }

    #[test]
    fn test_allocate_protect_free() {
        let process = LocalProcess::new().unwrap();
        let page = process.allocate(4096, Protection::ReadWrite).unwrap();

        assert_eq!(process.write_bytes(page, &[1, 2, 3]).unwrap(), 3);
        assert_eq!(process.read_bytes(page, 3).unwrap(), vec![1, 2, 3]);

        let old = process.protect(page, 16, Protection::Read).unwrap();
        assert_eq!(old, Protection::ReadWrite);
        assert!(process.write_bytes(page, &[9]).is_err());

        process.free(page, 4096).unwrap();
    }

    #[test]
    fn test_modules_present() {
        let process = LocalProcess::new().unwrap();
        let modules = process.enumerate_modules().unwrap();
        assert!(!modules.is_empty());
    }
}
