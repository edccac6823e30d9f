// Tue Jan 13 2026 - Alex

use crate::memory::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub found: bool,
    pub match_offset: usize,
    pub base_address: Address,
    pub read_address: Address,
}

impl ScanResult {
    pub fn not_found() -> Self {
        Self::default()
    }

    pub fn function(module_base: Address, offset: usize) -> Self {
        let address = module_base + offset;
        Self {
            found: true,
            match_offset: offset,
            base_address: address,
            read_address: address,
        }
    }

    /// `read_address` is the dereferenced pointer, `base_address` the same
    /// pointer relative to the module base.
    pub fn data(module_base: Address, offset: usize, read_address: Address) -> Self {
        Self {
            found: true,
            match_offset: offset,
            base_address: read_address.rebase(module_base),
            read_address,
        }
    }
}

impl fmt::Display for ScanResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.found {
            return write!(f, "not found");
        }
        write!(
            f,
            "+{:#x} base={} read={}",
            self.match_offset, self.base_address, self.read_address
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_all_zero() {
        let result = ScanResult::not_found();
        assert!(!result.found);
        assert_eq!(result.match_offset, 0);
        assert!(result.base_address.is_null());
        assert!(result.read_address.is_null());
    }

    #[test]
    fn test_data_rebases() {
        let result = ScanResult::data(Address::new(0x40_0000), 0x20, Address::new(0x40_5000));
        assert_eq!(result.base_address, Address::new(0x5000));
        assert_eq!(result.read_address, Address::new(0x40_5000));
    }
}
