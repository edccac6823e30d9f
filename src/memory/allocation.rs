// Thu Jan 16 2026 - Alex

use crate::memory::{Address, MemoryError, MemoryRegion, ProcessAccess, Protection};
use parking_lot::Mutex;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Slot index plus generation; a released slot never matches an old key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllocationKey {
    index: usize,
    generation: u64,
}

/// A block of target memory owned by whoever holds this value.
///
/// It carries no reference to the table that created it. Releasing goes
/// through [`AllocationTable::release`], which is idempotent.
#[derive(Debug)]
pub struct AllocatedMemory {
    key: AllocationKey,
    name: String,
    region: MemoryRegion,
}

impl AllocatedMemory {
    pub fn key(&self) -> AllocationKey {
        self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> Address {
        self.region.address()
    }

    pub fn size(&self) -> usize {
        self.region.size()
    }

    pub fn region(&self) -> &MemoryRegion {
        &self.region
    }
}

impl fmt::Display for AllocatedMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.region)
    }
}

struct Slot {
    generation: u64,
    live: Option<MemoryRegion>,
}

struct Slots {
    entries: Vec<Slot>,
    vacant: Vec<usize>,
}

/// Registry of every live allocation in one target.
pub struct AllocationTable {
    access: Arc<dyn ProcessAccess>,
    slots: Mutex<Slots>,
}

impl AllocationTable {
    pub fn new(access: Arc<dyn ProcessAccess>) -> Self {
        Self {
            access,
            slots: Mutex::new(Slots {
                entries: Vec::new(),
                vacant: Vec::new(),
            }),
        }
    }

    pub fn allocate(&self, name: &str, size: usize, protection: Protection) -> Result<AllocatedMemory, MemoryError> {
        let address = self.access.allocate(size, protection)?;
        let region = MemoryRegion::new(address, size, protection);

        let mut slots = self.slots.lock();
        let index = match slots.vacant.pop() {
            Some(index) => index,
            None => {
                slots.entries.push(Slot {
                    generation: 0,
                    live: None,
                });
                slots.entries.len() - 1
            }
        };
        let slot = &mut slots.entries[index];
        slot.live = Some(region.clone());
        let key = AllocationKey {
            index,
            generation: slot.generation,
        };
        log::debug!("Allocated {} bytes for '{}' at {}", size, name, address);

        Ok(AllocatedMemory {
            key,
            name: name.to_string(),
            region,
        })
    }

    pub fn allocate_scoped(
        &self,
        name: &str,
        size: usize,
        protection: Protection,
    ) -> Result<ScopedAllocation<'_>, MemoryError> {
        let allocation = self.allocate(name, size, protection)?;
        Ok(ScopedAllocation {
            table: self,
            allocation: Some(allocation),
        })
    }

    /// Frees the block. Returns `Ok(false)` if it was already released.
    pub fn release(&self, allocation: &AllocatedMemory) -> Result<bool, MemoryError> {
        self.release_key(allocation.key)
    }

    pub fn release_key(&self, key: AllocationKey) -> Result<bool, MemoryError> {
        let region = {
            let mut slots = self.slots.lock();
            let Some(slot) = slots.entries.get_mut(key.index) else {
                return Ok(false);
            };
            if slot.generation != key.generation {
                return Ok(false);
            }
            let Some(region) = slot.live.take() else {
                return Ok(false);
            };
            slot.generation += 1;
            slots.vacant.push(key.index);
            region
        };

        log::debug!("Releasing {}", region);
        self.access.free(region.address(), region.size())?;
        Ok(true)
    }

    pub fn is_live(&self, key: AllocationKey) -> bool {
        self.slots
            .lock()
            .entries
            .get(key.index)
            .map(|slot| slot.generation == key.generation && slot.live.is_some())
            .unwrap_or(false)
    }

    pub fn live_count(&self) -> usize {
        self.slots.lock().entries.iter().filter(|s| s.live.is_some()).count()
    }

    /// Releases every outstanding allocation once. Returns how many were freed.
    pub fn release_all(&self) -> usize {
        let keys: Vec<AllocationKey> = {
            let slots = self.slots.lock();
            slots
                .entries
                .iter()
                .enumerate()
                .filter(|(_, slot)| slot.live.is_some())
                .map(|(index, slot)| AllocationKey {
                    index,
                    generation: slot.generation,
                })
                .collect()
        };

        let mut released = 0;
        for key in keys {
            match self.release_key(key) {
                Ok(true) => released += 1,
                Ok(false) => {}
                Err(e) => {
                    released += 1;
                    log::warn!("Failed to free allocation during teardown: {}", e);
                }
            }
        }
        released
    }
}

/// Releases its allocation when dropped unless [`ScopedAllocation::keep`] is called.
pub struct ScopedAllocation<'a> {
    table: &'a AllocationTable,
    allocation: Option<AllocatedMemory>,
}

impl ScopedAllocation<'_> {
    pub fn keep(mut self) -> Option<AllocatedMemory> {
        self.allocation.take()
    }
}

impl Deref for ScopedAllocation<'_> {
    type Target = AllocatedMemory;

    fn deref(&self) -> &Self::Target {
        // only None after keep(), which consumes the guard
        match &self.allocation {
            Some(allocation) => allocation,
            None => unreachable!(),
        }
    }
}

impl Drop for ScopedAllocation<'_> {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            if let Err(e) = self.table.release(&allocation) {
                log::warn!("Failed to release '{}': {}", allocation.name(), e);
            }
        }
    }
}
