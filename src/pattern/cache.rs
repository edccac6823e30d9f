// Tue Jan 13 2026 - Alex

use ahash::AHashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

static GLOBAL_SCAN_CACHE: Lazy<ScanCache> = Lazy::new(ScanCache::new);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScanCacheKey {
    pub pattern_text: String,
    pub module_name: String,
    pub module_path: String,
    pub search_start_offset: usize,
}

/// Match offsets keyed by pattern and module identity.
///
/// Entries are never evicted. A module that is unloaded and reloaded
/// with different contents under the same name and path will be served
/// stale offsets until [`ScanCache::clear`] is called.
pub struct ScanCache {
    entries: RwLock<AHashMap<ScanCacheKey, usize>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl ScanCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(AHashMap::new()),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// The process-wide cache shared by every scanner.
    pub fn global() -> &'static ScanCache {
        &GLOBAL_SCAN_CACHE
    }

    pub fn get(&self, key: &ScanCacheKey) -> Option<usize> {
        let found = self.entries.read().get(key).copied();
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    /// Last writer wins.
    pub fn insert(&self, key: ScanCacheKey, offset: usize) {
        self.entries.write().insert(key, offset);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }
}

impl Default for ScanCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(start: usize) -> ScanCacheKey {
        ScanCacheKey {
            pattern_text: "90 90".to_string(),
            module_name: "a.so".to_string(),
            module_path: "/lib/a.so".to_string(),
            search_start_offset: start,
        }
    }

    #[test]
    fn test_start_offset_is_part_of_key() {
        let cache = ScanCache::new();
        cache.insert(key(0), 10);
        cache.insert(key(16), 40);

        assert_eq!(cache.get(&key(0)), Some(10));
        assert_eq!(cache.get(&key(16)), Some(40));
        assert_eq!(cache.get(&key(8)), None);
        assert_eq!(cache.hits(), 2);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn test_last_write_wins() {
        let cache = ScanCache::new();
        cache.insert(key(0), 1);
        cache.insert(key(0), 2);
        assert_eq!(cache.get(&key(0)), Some(2));
        assert_eq!(cache.len(), 1);
    }
}
