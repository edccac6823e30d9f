// Thu Jan 16 2026 - Alex

use crate::detour::{Detour, DetourError};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// Owns a set of detours keyed by identifier, in installation order.
#[derive(Default)]
pub struct DetourManager {
    detours: RwLock<IndexMap<String, Arc<Detour>>>,
}

impl DetourManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects duplicate identifiers and patches that overlap an existing one.
    pub fn add(&self, detour: Detour) -> Result<Arc<Detour>, DetourError> {
        let mut detours = self.detours.write();
        if detours.contains_key(detour.identifier()) {
            return Err(DetourError::DuplicateIdentifier(detour.identifier().to_string()));
        }
        if let Some(other) = detours
            .values()
            .find(|existing| existing.overlaps(detour.target(), detour.patch_len()))
        {
            return Err(DetourError::Overlap {
                identifier: detour.identifier().to_string(),
                other: other.identifier().to_string(),
            });
        }

        let detour = Arc::new(detour);
        detours.insert(detour.identifier().to_string(), detour.clone());
        log::info!("Registered detour '{}' at {}", detour.identifier(), detour.target());
        Ok(detour)
    }

    pub fn get(&self, identifier: &str) -> Option<Arc<Detour>> {
        self.detours.read().get(identifier).cloned()
    }

    pub fn identifiers(&self) -> Vec<String> {
        self.detours.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.detours.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.detours.read().is_empty()
    }

    /// Disposes and forgets the detour. Returns `Ok(false)` if it was unknown.
    pub fn remove(&self, identifier: &str) -> Result<bool, DetourError> {
        let removed = self.detours.write().shift_remove(identifier);
        match removed {
            Some(detour) => {
                detour.dispose()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Returns how many detours changed state.
    pub fn enable_all(&self, by_policy: bool) -> Result<usize, DetourError> {
        let mut changed = 0;
        for detour in self.snapshot() {
            let did = if by_policy {
                detour.enable_by_policy()?
            } else {
                detour.enable()?
            };
            changed += did as usize;
        }
        Ok(changed)
    }

    pub fn disable_all(&self, by_policy: bool) -> Result<usize, DetourError> {
        let mut changed = 0;
        for detour in self.snapshot().into_iter().rev() {
            let did = if by_policy {
                detour.disable_by_policy()?
            } else {
                detour.disable()?
            };
            changed += did as usize;
        }
        Ok(changed)
    }

    /// Disposes every detour in reverse installation order, logging failures.
    pub fn dispose_all(&self) -> usize {
        let drained: Vec<_> = self.detours.write().drain(..).collect();
        let mut disposed = 0;
        for (identifier, detour) in drained.into_iter().rev() {
            match detour.dispose() {
                Ok(()) => disposed += 1,
                Err(e) => log::warn!("Failed to dispose detour '{}': {}", identifier, e),
            }
        }
        disposed
    }

    fn snapshot(&self) -> Vec<Arc<Detour>> {
        self.detours.read().values().cloned().collect()
    }
}

impl Drop for DetourManager {
    fn drop(&mut self) {
        self.dispose_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detour::DetourBuilder;
    use crate::memory::{Address, AddressWidth, AllocationTable, SimulatedProcess, TypedMemory};

    const TARGET: Address = Address::new(0x401000);

    struct Fixture {
        memory: Arc<TypedMemory>,
        allocations: Arc<AllocationTable>,
    }

    impl Fixture {
        fn new() -> Self {
            let process = Arc::new(SimulatedProcess::new(AddressWidth::Bits64));
            process
                .add_module("game.exe", "C:\\game.exe", Address::new(0x400000), vec![0x90; 0x2000])
                .unwrap();
            Self {
                memory: Arc::new(TypedMemory::new(process.clone())),
                allocations: Arc::new(AllocationTable::new(process)),
            }
        }

        fn detour(&self, id: &str, target: Address) -> Detour {
            DetourBuilder::new(id, target, Address::new(0x500000))
                .build(self.memory.clone(), self.allocations.clone())
                .unwrap()
        }
    }

    #[test]
    fn test_rejects_duplicates_and_overlaps() {
        let fx = Fixture::new();
        let manager = DetourManager::new();
        manager.add(fx.detour("a", TARGET)).unwrap();

        let dup = manager.add(fx.detour("a", TARGET + 0x100u64));
        assert!(matches!(dup, Err(DetourError::DuplicateIdentifier(_))));

        let overlap = manager.add(fx.detour("b", TARGET + 0x4u64));
        assert!(matches!(overlap, Err(DetourError::Overlap { .. })));

        manager.add(fx.detour("c", TARGET + 0xCu64)).unwrap();
        assert_eq!(manager.identifiers(), vec!["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_bulk_enable_and_policy() {
        let fx = Fixture::new();
        let manager = DetourManager::new();
        let a = manager.add(fx.detour("a", TARGET)).unwrap();
        let b = manager.add(fx.detour("b", TARGET + 0x40u64)).unwrap();
        let exempt = DetourBuilder::new("c", TARGET + 0x80u64, Address::new(0x500000))
            .ignoring_policy(true)
            .build(fx.memory.clone(), fx.allocations.clone())
            .unwrap();
        let c = manager.add(exempt).unwrap();

        assert_eq!(manager.enable_all(false).unwrap(), 3);
        assert_eq!(manager.enable_all(false).unwrap(), 0);

        b.disable().unwrap();
        assert_eq!(manager.disable_all(true).unwrap(), 1);
        assert!(a.is_disabled_by_policy());
        assert!(c.is_enabled());
        assert!(!c.is_disabled_by_policy());

        assert_eq!(manager.enable_all(true).unwrap(), 1);
        assert!(a.is_enabled());
        assert!(!b.is_enabled());
        assert!(c.is_enabled());

        assert_eq!(manager.disable_all(false).unwrap(), 2);
        assert!(!c.is_enabled());
    }

    #[test]
    fn test_remove_and_dispose_all() {
        let fx = Fixture::new();
        let original = fx.memory.read_bytes(TARGET, 12).unwrap();
        let manager = DetourManager::new();
        let a = manager.add(fx.detour("a", TARGET)).unwrap();
        manager.add(fx.detour("b", TARGET + 0x40u64)).unwrap();
        manager.enable_all(false).unwrap();

        assert!(manager.remove("a").unwrap());
        assert!(!manager.remove("a").unwrap());
        assert_eq!(fx.memory.read_bytes(TARGET, 12).unwrap(), original);
        assert!(matches!(a.enable(), Err(DetourError::Disposed(_))));

        assert_eq!(manager.dispose_all(), 1);
        assert!(manager.is_empty());
    }
}
