// Tue Jan 13 2026 - Alex

use crate::memory::{Address, ModuleInfo, TypedMemory};
use crate::pattern::search::search;
use crate::pattern::{Pattern, PatternError, PatternKind, ScanCache, ScanCacheKey, ScanResult};
use rayon::prelude::*;
use std::sync::Arc;

/// Signature search over one module.
///
/// The module image is read once, at construction; every search runs
/// against that snapshot. Data patterns dereference through live memory.
pub struct PatternScanner {
    memory: Arc<TypedMemory>,
    module: ModuleInfo,
    image: Vec<u8>,
    cache: Option<&'static ScanCache>,
}

impl PatternScanner {
    pub fn new(memory: Arc<TypedMemory>, module: ModuleInfo) -> Result<Self, PatternError> {
        let image = memory
            .read_image(module.base, module.size)
            .map_err(|source| PatternError::ModuleRead {
                module: module.name.clone(),
                source,
            })?;
        log::debug!("Snapshot of {} taken ({} bytes)", module.name, image.len());

        Ok(Self {
            memory,
            module,
            image,
            cache: Some(ScanCache::global()),
        })
    }

    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    pub fn module(&self) -> &ModuleInfo {
        &self.module
    }

    pub fn image(&self) -> &[u8] {
        &self.image
    }

    fn cache_key(&self, pattern: &Pattern) -> ScanCacheKey {
        ScanCacheKey {
            pattern_text: pattern.text(),
            module_name: self.module.name.clone(),
            module_path: self.module.path.clone(),
            search_start_offset: pattern.search_start_offset(),
        }
    }

    pub fn find(&self, pattern: &Pattern) -> ScanResult {
        let key = self.cache.map(|_| self.cache_key(pattern));

        if let (Some(cache), Some(key)) = (self.cache, key.as_ref()) {
            if let Some(offset) = cache.get(key) {
                log::debug!("Cache hit for '{}' in {}: +{:#x}", key.pattern_text, self.module.name, offset);
                return self.resolve(pattern, offset);
            }
        }

        let Some(offset) = search(pattern, &self.image) else {
            log::debug!("Pattern '{}' not found in {}", pattern, self.module.name);
            return ScanResult::not_found();
        };

        if let (Some(cache), Some(key)) = (self.cache, key) {
            cache.insert(key, offset);
        }
        self.resolve(pattern, offset)
    }

    /// Runs every pattern against the same snapshot in parallel.
    pub fn find_many(&self, patterns: &[Pattern]) -> Vec<ScanResult> {
        patterns.par_iter().map(|pattern| self.find(pattern)).collect()
    }

    fn resolve(&self, pattern: &Pattern, offset: usize) -> ScanResult {
        let base = self.module.base;
        match pattern.kind() {
            PatternKind::Function => ScanResult::function(base, offset),
            PatternKind::Data { deref_offset } => {
                let slot = (base + offset).offset(deref_offset);
                let read_address = self.memory.read_address(slot).unwrap_or_else(|e| {
                    log::warn!("Could not dereference data pattern at {}: {}", slot, e);
                    Address::zero()
                });
                ScanResult::data(base, offset, read_address)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{AddressWidth, ProcessAccess, Protection, SimulatedProcess};
    use crate::pattern::SearchAlgorithm;

    const IMAGE_BASE: Address = Address::new(0x0040_0000);

    fn scanner_for(name: &str, image: Vec<u8>) -> (Arc<SimulatedProcess>, PatternScanner) {
        let process = Arc::new(SimulatedProcess::new(AddressWidth::Bits64));
        let module = process
            .add_module(name, &format!("/opt/test/{}", name), IMAGE_BASE, image)
            .unwrap();
        let memory = Arc::new(TypedMemory::new(process.clone()));
        let scanner = PatternScanner::new(memory, module).unwrap();
        (process, scanner)
    }

    fn call_image() -> Vec<u8> {
        let mut image = vec![0xCCu8; 1024];
        image[120..126].copy_from_slice(&[0xE8, 0x11, 0x22, 0x33, 0x44, 0x90]);
        image
    }

    #[test]
    fn test_function_pattern_both_algorithms() {
        let (_process, scanner) = scanner_for("planted_call.so", call_image());
        let scanner = scanner.without_cache();

        for algorithm in [SearchAlgorithm::Naive, SearchAlgorithm::BoyerMooreHorspool] {
            let pattern = Pattern::parse("E8 ?? ?? ?? ?? 90").unwrap().with_algorithm(algorithm);
            let result = scanner.find(&pattern);
            assert!(result.found);
            assert_eq!(result.match_offset, 120);
            assert_eq!(result.base_address, IMAGE_BASE + 120u64);
            assert_eq!(result.read_address, result.base_address);
        }
    }

    #[test]
    fn test_missing_pattern_is_sentinel() {
        let (_process, scanner) = scanner_for("missing.so", call_image());
        let result = scanner.find(&Pattern::parse("DE AD BE EF").unwrap());
        assert_eq!(result, ScanResult::not_found());
    }

    #[test]
    fn test_second_find_served_from_cache() {
        let (process, scanner) = scanner_for("cache_coherence.so", call_image());
        let pattern = Pattern::parse("E8 ?? ?? ?? ?? 90").unwrap();

        let first = scanner.find(&pattern);
        let reads_after_first = process.read_count();
        let second = scanner.find(&pattern);

        assert_eq!(first, second);
        assert_eq!(process.read_count(), reads_after_first);
    }

    #[test]
    fn test_cache_shared_between_scanners() {
        let (process, scanner) = scanner_for("shared_cache.so", call_image());
        let pattern = Pattern::parse("E8 11 22").unwrap();
        let first = scanner.find(&pattern);

        // same module identity, fresh scanner
        let memory = Arc::new(TypedMemory::new(process.clone()));
        let other = PatternScanner::new(memory, scanner.module().clone()).unwrap();
        assert_eq!(other.find(&pattern), first);
    }

    #[test]
    fn test_data_pattern_dereferences() {
        let mut image = vec![0u8; 256];
        image[32..35].copy_from_slice(&[0x48, 0x8B, 0x05]);
        image[35..43].copy_from_slice(&(IMAGE_BASE.as_u64() + 0x80).to_le_bytes());
        let (_process, scanner) = scanner_for("data_pattern.so", image);

        let pattern = Pattern::parse_data("48 8B 05", 3).unwrap();
        let first = scanner.find(&pattern);
        assert!(first.found);
        assert_eq!(first.match_offset, 32);
        assert_eq!(first.read_address, IMAGE_BASE + 0x80u64);
        assert_eq!(first.base_address, Address::new(0x80));

        assert_eq!(scanner.find(&pattern), first);
    }

    #[test]
    fn test_data_cache_hit_reads_live_pointer() {
        let mut image = vec![0u8; 64];
        image[0..2].copy_from_slice(&[0x8B, 0x0D]);
        image[2..10].copy_from_slice(&(IMAGE_BASE.as_u64() + 0x10).to_le_bytes());
        let (process, scanner) = scanner_for("live_pointer.so", image);
        let pattern = Pattern::parse_data("8B 0D", 2).unwrap();
        assert_eq!(scanner.find(&pattern).read_address, IMAGE_BASE + 0x10u64);

        process.protect(IMAGE_BASE, 64, Protection::ReadWrite).unwrap();
        let memory = TypedMemory::new(process.clone());
        memory.write(IMAGE_BASE + 2u64, IMAGE_BASE.as_u64() + 0x20).unwrap();

        let hit = scanner.find(&pattern);
        assert_eq!(hit.read_address, IMAGE_BASE + 0x20u64);
        assert_eq!(hit.base_address, Address::new(0x20));
    }

    #[test]
    fn test_find_many_matches_find() {
        let (_process, scanner) = scanner_for("find_many.so", call_image());
        let scanner = scanner.without_cache();
        let patterns = vec![
            Pattern::parse("E8 ?? ?? ?? ?? 90").unwrap(),
            Pattern::parse("CC CC E8").unwrap().with_algorithm(SearchAlgorithm::BoyerMooreHorspool),
            Pattern::parse("00 00").unwrap(),
        ];
        let results = scanner.find_many(&patterns);
        assert_eq!(results[0].match_offset, 120);
        assert_eq!(results[1].match_offset, 118);
        assert!(!results[2].found);
    }

    #[test]
    fn test_scans_past_reserved_gap() {
        let process = Arc::new(SimulatedProcess::new(AddressWidth::Bits64));
        process.map(IMAGE_BASE, vec![0xCC; 0x1000], Protection::ReadExecute).unwrap();
        process.map_zeroed(IMAGE_BASE + 0x1000u64, 0x1000, Protection::None).unwrap();
        let mut data = vec![0x90u8; 0x1000];
        data[0x40..0x44].copy_from_slice(&[0xDE, 0xC0, 0xAD, 0x0B]);
        process.map(IMAGE_BASE + 0x2000u64, data, Protection::Read).unwrap();

        let memory = Arc::new(TypedMemory::new(process));
        let module = ModuleInfo::new("gapped.so", "/opt/test/gapped.so", IMAGE_BASE, 0x3000);
        let scanner = PatternScanner::new(memory, module).unwrap().without_cache();

        assert_eq!(scanner.image().len(), 0x3000);
        let result = scanner.find(&Pattern::parse("DE C0 AD 0B").unwrap());
        assert!(result.found);
        assert_eq!(result.match_offset, 0x2040);
        assert_eq!(result.base_address, IMAGE_BASE + 0x2040u64);
    }

    #[test]
    fn test_unreadable_module_fails_construction() {
        let process = Arc::new(SimulatedProcess::new(AddressWidth::Bits64));
        let memory = Arc::new(TypedMemory::new(process));
        let module = ModuleInfo::new("ghost.so", "/ghost.so", IMAGE_BASE, 0x100);
        assert!(matches!(
            PatternScanner::new(memory, module),
            Err(PatternError::ModuleRead { .. })
        ));
    }
}
