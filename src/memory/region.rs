// Tue Jan 13 2026 - Alex

use crate::memory::{Address, Protection};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRegion {
    address: Address,
    size: usize,
    protection: Protection,
}

impl MemoryRegion {
    pub fn new(address: Address, size: usize, protection: Protection) -> Self {
        Self {
            address,
            size,
            protection,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn start(&self) -> Address {
        self.address
    }

    pub fn end(&self) -> Address {
        self.address + self.size
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn protection(&self) -> Protection {
        self.protection
    }

    pub fn contains(&self, addr: Address) -> bool {
        addr.is_within_range(self.start(), self.end())
    }

    /// True when `[addr, addr + len)` lies entirely inside this region.
    pub fn contains_range(&self, addr: Address, len: usize) -> bool {
        if !self.contains(addr) {
            return false;
        }
        match addr.checked_add(len as u64) {
            Some(end) => end <= self.end(),
            None => false,
        }
    }

    pub fn overlaps(&self, addr: Address, len: usize) -> bool {
        let end = addr + len;
        addr < self.end() && end > self.start()
    }
}

impl fmt::Display for MemoryRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{} {} ({} bytes)", self.start(), self.end(), self.protection, self.size)
    }
}

/// A module image loaded in the target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub name: String,
    pub path: String,
    pub base: Address,
    pub size: usize,
}

impl ModuleInfo {
    pub fn new(name: &str, path: &str, base: Address, size: usize) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            base,
            size,
        }
    }

    pub fn end(&self) -> Address {
        self.base + self.size
    }

    pub fn contains(&self, addr: Address) -> bool {
        addr.is_within_range(self.base, self.end())
    }
}

impl fmt::Display for ModuleInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {} ({:#x} bytes)", self.name, self.base, self.size)
    }
}
