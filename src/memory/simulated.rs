// Thu Jan 16 2026 - Alex

use crate::memory::{
    AccessKind, Address, AddressWidth, MemoryError, MemoryRegion, ModuleInfo, ProcessAccess, Protection,
};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

const ALLOCATION_BASE: u64 = 0x7000_0000;
const ALLOCATION_GRANULARITY: usize = 0x1000;

struct SimRegion {
    data: Vec<u8>,
    protection: Protection,
}

struct SimState {
    regions: BTreeMap<u64, SimRegion>,
    modules: Vec<ModuleInfo>,
    next_allocation: u64,
}

impl SimState {
    fn region_start(&self, addr: u64) -> Option<u64> {
        let (&start, region) = self.regions.range(..=addr).next_back()?;
        if addr < start + region.data.len() as u64 {
            Some(start)
        } else {
            None
        }
    }

    /// Calls `visit` for each contiguous chunk of `[addr, addr + len)`, or
    /// fails if any byte is unmapped or lacks the required access.
    fn for_each_chunk(
        &self,
        addr: u64,
        len: usize,
        allowed: fn(Protection) -> bool,
        mut visit: impl FnMut(u64, usize, usize),
    ) -> bool {
        let mut cursor = addr;
        let mut done = 0;
        while done < len {
            let Some(start) = self.region_start(cursor) else {
                return false;
            };
            let region = &self.regions[&start];
            if !allowed(region.protection) {
                return false;
            }
            let offset = (cursor - start) as usize;
            let chunk = (region.data.len() - offset).min(len - done);
            visit(start, offset, chunk);
            done += chunk;
            cursor += chunk as u64;
        }
        true
    }
}

/// An address space that lives entirely in this process.
///
/// Honours the same contract as the OS-backed implementations, with
/// explicit mapping control and call counters for tests and offline
/// analysis of dumped images.
pub struct SimulatedProcess {
    width: AddressWidth,
    state: RwLock<SimState>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl SimulatedProcess {
    pub fn new(width: AddressWidth) -> Self {
        Self {
            width,
            state: RwLock::new(SimState {
                regions: BTreeMap::new(),
                modules: Vec::new(),
                next_allocation: ALLOCATION_BASE,
            }),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    /// Maps `data` at `addr`. Fails if it would overlap an existing mapping.
    pub fn map(&self, addr: Address, data: Vec<u8>, protection: Protection) -> Result<(), MemoryError> {
        if data.is_empty() {
            return Err(MemoryError::InvalidRange);
        }
        let mut state = self.state.write();
        let start = addr.as_u64();
        let end = start
            .checked_add(data.len() as u64)
            .ok_or(MemoryError::InvalidRange)?;

        let overlaps = state
            .regions
            .range(..end)
            .next_back()
            .map(|(&s, r)| s + r.data.len() as u64 > start)
            .unwrap_or(false);
        if overlaps {
            return Err(MemoryError::InvalidAddress(format!("{} is already mapped", addr)));
        }

        state.regions.insert(start, SimRegion { data, protection });
        Ok(())
    }

    pub fn map_zeroed(&self, addr: Address, size: usize, protection: Protection) -> Result<(), MemoryError> {
        self.map(addr, vec![0u8; size], protection)
    }

    /// Maps `image` read-execute at `base` and registers it as a module.
    pub fn add_module(&self, name: &str, path: &str, base: Address, image: Vec<u8>) -> Result<ModuleInfo, MemoryError> {
        let module = ModuleInfo::new(name, path, base, image.len());
        self.map(base, image, Protection::ReadExecute)?;
        self.state.write().modules.push(module.clone());
        Ok(module)
    }

    pub fn regions(&self) -> Vec<MemoryRegion> {
        self.state
            .read()
            .regions
            .iter()
            .map(|(&start, r)| MemoryRegion::new(Address::new(start), r.data.len(), r.protection))
            .collect()
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn reset_counters(&self) {
        self.reads.store(0, Ordering::Relaxed);
        self.writes.store(0, Ordering::Relaxed);
    }
}

impl ProcessAccess for SimulatedProcess {
    fn kind(&self) -> AccessKind {
        AccessKind::Remote
    }

    fn address_width(&self) -> AddressWidth {
        self.width
    }

    fn read_into(&self, addr: Address, buf: &mut [u8]) -> Result<(), MemoryError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let state = self.state.read();
        let mut filled = 0;
        let ok = state.for_each_chunk(addr.as_u64(), buf.len(), Protection::can_read, |start, offset, len| {
            let source = &state.regions[&start].data[offset..offset + len];
            buf[filled..filled + len].copy_from_slice(source);
            filled += len;
        });
        if ok {
            Ok(())
        } else {
            Err(MemoryError::AccessViolation(addr.as_u64()))
        }
    }

    fn write_bytes(&self, addr: Address, data: &[u8]) -> Result<usize, MemoryError> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.write();
        let mut chunks = Vec::new();
        let ok = state.for_each_chunk(addr.as_u64(), data.len(), Protection::can_write, |start, offset, len| {
            chunks.push((start, offset, len));
        });
        if !ok {
            return Err(MemoryError::WriteFailed(addr.as_u64()));
        }

        let mut consumed = 0;
        for (start, offset, len) in chunks {
            if let Some(region) = state.regions.get_mut(&start) {
                region.data[offset..offset + len].copy_from_slice(&data[consumed..consumed + len]);
            }
            consumed += len;
        }
        Ok(consumed)
    }

    fn allocate(&self, size: usize, protection: Protection) -> Result<Address, MemoryError> {
        if size == 0 {
            return Err(MemoryError::AllocationFailure(size));
        }
        let rounded = (size + ALLOCATION_GRANULARITY - 1) & !(ALLOCATION_GRANULARITY - 1);
        let addr = {
            let mut state = self.state.write();
            let addr = state.next_allocation;
            if addr + rounded as u64 > self.width.max_address() {
                return Err(MemoryError::AllocationFailure(size));
            }
            state.next_allocation += rounded as u64;
            Address::new(addr)
        };
        self.map_zeroed(addr, rounded, protection)
            .map_err(|_| MemoryError::AllocationFailure(size))?;
        Ok(addr)
    }

    fn free(&self, addr: Address, _size: usize) -> Result<(), MemoryError> {
        match self.state.write().regions.remove(&addr.as_u64()) {
            Some(_) => Ok(()),
            None => Err(MemoryError::RegionNotFound(addr.to_string())),
        }
    }

    fn protect(&self, addr: Address, _size: usize, protection: Protection) -> Result<Protection, MemoryError> {
        let mut state = self.state.write();
        let start = state
            .region_start(addr.as_u64())
            .ok_or_else(|| MemoryError::RegionNotFound(addr.to_string()))?;
        let region = state
            .regions
            .get_mut(&start)
            .ok_or_else(|| MemoryError::RegionNotFound(addr.to_string()))?;
        let old = region.protection;
        region.protection = protection;
        Ok(old)
    }

    fn enumerate_modules(&self) -> Result<Vec<ModuleInfo>, MemoryError> {
        Ok(self.state.read().modules.clone())
    }
}
