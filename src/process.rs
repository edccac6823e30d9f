// Thu Jan 16 2026 - Alex

use crate::config::EngineConfig;
use crate::detour::{Detour, DetourBuilder, DetourError, DetourManager};
use crate::memory::{
    AccessKind, Address, AllocatedMemory, AllocationTable, MemoryError, ModuleInfo, ProcessAccess, Protection,
    TypedMemory,
};
use crate::pattern::{Pattern, PatternError, PatternScanner};
use crate::rtti::RttiResolver;
use std::sync::Arc;

/// Everything bound to one target: typed memory, allocations, detours,
/// the RTTI cache and config. Dropping it disposes every detour before the
/// allocations they point into are released.
pub struct TargetProcess {
    access: Arc<dyn ProcessAccess>,
    memory: Arc<TypedMemory>,
    allocations: Arc<AllocationTable>,
    detours: DetourManager,
    rtti: RttiResolver,
    config: EngineConfig,
}

impl TargetProcess {
    #[cfg(target_os = "linux")]
    pub fn local(config: EngineConfig) -> Result<Self, MemoryError> {
        let access = crate::memory::LocalProcess::new()?;
        Ok(Self::from_access(Arc::new(access), config))
    }

    #[cfg(target_os = "linux")]
    pub fn attach(pid: u32, config: EngineConfig) -> Result<Self, MemoryError> {
        let access = crate::memory::RemoteProcess::open(pid)?;
        Ok(Self::from_access(Arc::new(access), config))
    }

    #[cfg(target_os = "linux")]
    pub fn attach_by_name(name: &str, config: EngineConfig) -> Result<Self, MemoryError> {
        let access = crate::memory::RemoteProcess::open_by_name(name)?;
        Ok(Self::from_access(Arc::new(access), config))
    }

    pub fn from_access(access: Arc<dyn ProcessAccess>, config: EngineConfig) -> Self {
        let memory = Arc::new(TypedMemory::new(access.clone()).with_string_max_len(config.string_max_len));
        let allocations = Arc::new(AllocationTable::new(access.clone()));
        let rtti = RttiResolver::new(memory.clone())
            .with_name_max_len(config.rtti_name_max_len)
            .with_max_base_classes(config.rtti_max_base_classes);

        log::info!(
            "Bound {:?} target ({}, {} modules visible)",
            access.kind(),
            access.address_width(),
            access.enumerate_modules().map(|m| m.len()).unwrap_or(0)
        );

        Self {
            access,
            memory,
            allocations,
            detours: DetourManager::new(),
            rtti,
            config,
        }
    }

    pub fn access(&self) -> &Arc<dyn ProcessAccess> {
        &self.access
    }

    pub fn kind(&self) -> AccessKind {
        self.access.kind()
    }

    pub fn memory(&self) -> &Arc<TypedMemory> {
        &self.memory
    }

    pub fn allocations(&self) -> &Arc<AllocationTable> {
        &self.allocations
    }

    pub fn detours(&self) -> &DetourManager {
        &self.detours
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn modules(&self) -> Result<Vec<ModuleInfo>, MemoryError> {
        self.access.enumerate_modules()
    }

    /// Case-insensitive lookup by module name.
    pub fn module(&self, name: &str) -> Result<ModuleInfo, MemoryError> {
        self.modules()?
            .into_iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| MemoryError::ModuleNotFound(name.to_string()))
    }

    pub fn scanner(&self, module: &ModuleInfo) -> Result<PatternScanner, PatternError> {
        let scanner = PatternScanner::new(self.memory.clone(), module.clone())?;
        if self.config.pattern_cache_enabled {
            Ok(scanner)
        } else {
            Ok(scanner.without_cache())
        }
    }

    /// Parses a signature with the configured default search algorithm.
    pub fn pattern(&self, text: &str) -> Result<Pattern, PatternError> {
        Ok(Pattern::parse(text)?.with_algorithm(self.config.default_algorithm))
    }

    pub fn allocate(&self, name: &str, size: usize, protection: Protection) -> Result<AllocatedMemory, MemoryError> {
        self.allocations.allocate(name, size, protection)
    }

    pub fn release(&self, allocation: &AllocatedMemory) -> Result<bool, MemoryError> {
        self.allocations.release(allocation)
    }

    pub fn rtti(&self, instance: Address) -> Option<String> {
        self.rtti.resolve(instance)
    }

    pub fn rtti_resolver(&self) -> &RttiResolver {
        &self.rtti
    }

    pub fn detour(&self, identifier: &str, target: Address, hook: Address) -> DetourBuilder {
        DetourBuilder::new(identifier, target, hook)
    }

    /// Builds the detour and registers it, so it is disposed with the target.
    pub fn build_detour(&self, builder: DetourBuilder) -> Result<Arc<Detour>, DetourError> {
        let detour = builder.build(self.memory.clone(), self.allocations.clone())?;
        self.detours.add(detour)
    }
}

impl Drop for TargetProcess {
    fn drop(&mut self) {
        let disposed = self.detours.dispose_all();
        if disposed > 0 {
            log::debug!("Disposed {} detours", disposed);
        }
        let released = self.allocations.release_all();
        if released > 0 {
            log::debug!("Released {} outstanding allocations", released);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detour::{CallingConvention, DetourStatus};
    use crate::memory::{AddressWidth, SimulatedProcess, StringEncoding};

    fn simulated() -> (Arc<SimulatedProcess>, TargetProcess) {
        let process = Arc::new(SimulatedProcess::new(AddressWidth::Bits64));
        let mut image = vec![0u8; 0x400];
        image[0x80..0x86].copy_from_slice(&[0xE8, 0x10, 0x20, 0x30, 0x40, 0x90]);
        process
            .add_module("Client.DLL", "C:\\game\\Client.DLL", Address::new(0x140000000), image)
            .unwrap();
        let target = TargetProcess::from_access(process.clone(), EngineConfig::default());
        (process, target)
    }

    #[test]
    fn test_module_lookup_ignores_case() {
        let (_, target) = simulated();
        let module = target.module("client.dll").unwrap();
        assert_eq!(module.base, Address::new(0x140000000));
        assert!(matches!(target.module("server.dll"), Err(MemoryError::ModuleNotFound(_))));
    }

    #[test]
    fn test_scan_through_context() {
        let (_, target) = simulated();
        let module = target.module("Client.DLL").unwrap();
        let scanner = target.scanner(&module).unwrap();
        let result = scanner.find(&target.pattern("E8 ?? ?? ?? ?? 90").unwrap());
        assert!(result.found);
        assert_eq!(result.match_offset, 0x80);
    }

    #[test]
    fn test_drop_releases_allocations() {
        let (process, target) = simulated();
        let a = target.allocate("a", 0x100, Protection::ReadWrite).unwrap();
        target.allocate("b", 0x100, Protection::ReadWrite).unwrap();
        assert!(target.release(&a).unwrap());
        assert!(!target.release(&a).unwrap());

        let before = process.regions().len();
        drop(target);
        assert_eq!(process.regions().len(), before - 1);
    }

    #[test]
    fn test_detour_through_context() {
        let (_, target) = simulated();
        let module = target.module("Client.DLL").unwrap();
        let func = module.base + 0x80u64;
        let detour = target
            .build_detour(target.detour("client_call", func, Address::new(0x150000000)))
            .unwrap();
        detour.enable().unwrap();
        assert_eq!(target.memory().read::<u8>(func).unwrap(), 0x48);
        detour.dispose().unwrap();
        assert_eq!(target.memory().read::<u8>(func).unwrap(), 0xE8);
    }

    #[test]
    fn test_config_reaches_typed_memory() {
        let process = Arc::new(SimulatedProcess::new(AddressWidth::Bits64));
        process.map_zeroed(Address::new(0x10000), 0x100, Protection::ReadWrite).unwrap();
        let config = EngineConfig::new().with_string_max_len(4);
        let target = TargetProcess::from_access(process, config);

        let at = Address::new(0x10000);
        target.memory().write_string(at, "abcdefghij", StringEncoding::Utf8).unwrap();
        assert_eq!(target.memory().read_string(at, StringEncoding::Utf8).unwrap(), "abcd");
    }

    #[test]
    fn test_drop_disposes_bridged_detour() {
        let process = Arc::new(SimulatedProcess::new(AddressWidth::Bits32));
        let mut image = vec![0xCCu8; 0x100];
        image[0x10..0x1A].copy_from_slice(&[0x55, 0x8B, 0xEC, 0x83, 0xEC, 0x10, 0x53, 0x56, 0x57, 0xC3]);
        let module = process
            .add_module("game.exe", "C:\\game.exe", Address::new(0x400000), image)
            .unwrap();
        let func = module.base + 0x10u64;
        let target = TargetProcess::from_access(process.clone(), EngineConfig::default());

        let detour = target
            .build_detour(
                target
                    .detour("bridged", func, Address::new(0x500000))
                    .with_target_convention(CallingConvention::Fastcall)
                    .with_hook_convention(CallingConvention::Stdcall)
                    .with_param_count(2),
            )
            .unwrap();
        detour.enable().unwrap();
        assert_eq!(target.allocations().live_count(), 2);
        assert_ne!(process.read_bytes(func, 6).unwrap(), vec![0x55, 0x8B, 0xEC, 0x83, 0xEC, 0x10]);

        let regions = process.regions().len();
        drop(target);
        assert_eq!(detour.status(), DetourStatus::Disposed);
        assert_eq!(process.read_bytes(func, 6).unwrap(), vec![0x55, 0x8B, 0xEC, 0x83, 0xEC, 0x10]);
        assert_eq!(process.regions().len(), regions - 2);
    }

    #[test]
    fn test_rtti_absent_for_plain_memory() {
        let (_, target) = simulated();
        assert_eq!(target.rtti(Address::new(0x140000100)), None);
        assert_eq!(target.rtti(Address::new(0x10)), None);
    }
}
