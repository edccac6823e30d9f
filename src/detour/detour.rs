// Thu Jan 16 2026 - Alex

use crate::detour::asm::{self, PatchStrategy};
use crate::detour::{CallingConvention, DetourError, FunctionPtr};
use crate::memory::{Address, AllocatedMemory, AllocationTable, MemoryError, Protection, TypedMemory};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetourStatus {
    Disabled,
    Enabled,
    Disposed,
}

struct DetourState {
    status: DetourStatus,
    disabled_by_policy: bool,
}

struct Trampoline {
    allocation: AllocatedMemory,
    code: Vec<u8>,
}

/// Entry stub reached from the patched target, exit stub used to call the original.
struct Bridge {
    entry: Trampoline,
    exit: Trampoline,
}

pub struct DetourBuilder {
    identifier: String,
    target: Address,
    hook: Address,
    target_convention: Option<CallingConvention>,
    hook_convention: Option<CallingConvention>,
    param_count: usize,
    ignores_policy: bool,
}

impl DetourBuilder {
    pub fn new(identifier: &str, target: Address, hook: Address) -> Self {
        Self {
            identifier: identifier.to_string(),
            target,
            hook,
            target_convention: None,
            hook_convention: None,
            param_count: 0,
            ignores_policy: false,
        }
    }

    pub fn with_target_convention(mut self, convention: CallingConvention) -> Self {
        self.target_convention = Some(convention);
        self
    }

    pub fn with_hook_convention(mut self, convention: CallingConvention) -> Self {
        self.hook_convention = Some(convention);
        self
    }

    pub fn with_param_count(mut self, count: usize) -> Self {
        self.param_count = count;
        self
    }

    pub fn ignoring_policy(mut self, ignores: bool) -> Self {
        self.ignores_policy = ignores;
        self
    }

    /// Captures the original bytes and prepares trampolines. The detour starts disabled.
    pub fn build(self, memory: Arc<TypedMemory>, allocations: Arc<AllocationTable>) -> Result<Detour, DetourError> {
        let width = memory.width();
        let target_convention = self.target_convention.unwrap_or_else(|| CallingConvention::default_for(width));
        let hook_convention = self.hook_convention.unwrap_or_else(|| CallingConvention::default_for(width));

        if self.hook.is_null() {
            return Err(MemoryError::InvalidAddress("null hook".to_string()).into());
        }

        let strategy = asm::select_strategy(width, target_convention, hook_convention, self.param_count)?;
        let original_bytes = memory.try_read_bytes(self.target, asm::patch_len(width))?;

        let bridge = match strategy {
            PatchStrategy::Direct => None,
            PatchStrategy::Bridge => Some(self.build_bridge(&memory, &allocations, target_convention, hook_convention)?),
        };
        let destination = match &bridge {
            Some(bridge) => bridge.entry.allocation.address(),
            None => self.hook,
        };
        let patch_bytes = asm::absolute_jump(width, destination);
        debug_assert_eq!(patch_bytes.len(), original_bytes.len());

        log::debug!(
            "Prepared detour '{}' {} -> {} ({:?}, {} -> {})",
            self.identifier,
            self.target,
            self.hook,
            strategy,
            target_convention,
            hook_convention
        );

        Ok(Detour {
            identifier: self.identifier,
            target: self.target,
            hook: self.hook,
            target_convention,
            hook_convention,
            strategy,
            original_bytes,
            patch_bytes,
            bridge,
            ignores_policy: self.ignores_policy,
            memory,
            allocations,
            state: Mutex::new(DetourState {
                status: DetourStatus::Disabled,
                disabled_by_policy: false,
            }),
        })
    }

    fn build_bridge(
        &self,
        memory: &TypedMemory,
        allocations: &AllocationTable,
        target_convention: CallingConvention,
        hook_convention: CallingConvention,
    ) -> Result<Bridge, DetourError> {
        let target_regs = target_convention.used_registers(self.param_count);
        let hook_regs = hook_convention.used_registers(self.param_count);
        let entry_code = asm::bridge_trampoline(target_regs, hook_regs, self.hook);
        let exit_code = asm::bridge_trampoline(hook_regs, target_regs, self.target);

        let entry = allocations.allocate_scoped(
            &format!("{}:entry", self.identifier),
            entry_code.len(),
            Protection::ReadWriteExecute,
        )?;
        let exit = allocations.allocate_scoped(
            &format!("{}:exit", self.identifier),
            exit_code.len(),
            Protection::ReadWriteExecute,
        )?;
        memory.write_bytes(entry.address(), &entry_code)?;
        memory.write_bytes(exit.address(), &exit_code)?;

        match (entry.keep(), exit.keep()) {
            (Some(entry), Some(exit)) => Ok(Bridge {
                entry: Trampoline {
                    allocation: entry,
                    code: entry_code,
                },
                exit: Trampoline {
                    allocation: exit,
                    code: exit_code,
                },
            }),
            _ => Err(MemoryError::AllocationFailure(entry_code.len()).into()),
        }
    }
}

/// A redirect from a target function to a hook, toggled by rewriting the
/// target's first instructions.
pub struct Detour {
    identifier: String,
    target: Address,
    hook: Address,
    target_convention: CallingConvention,
    hook_convention: CallingConvention,
    strategy: PatchStrategy,
    original_bytes: Vec<u8>,
    patch_bytes: Vec<u8>,
    bridge: Option<Bridge>,
    ignores_policy: bool,
    memory: Arc<TypedMemory>,
    allocations: Arc<AllocationTable>,
    state: Mutex<DetourState>,
}

impl Detour {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn target(&self) -> Address {
        self.target
    }

    pub fn hook(&self) -> Address {
        self.hook
    }

    pub fn conventions(&self) -> (CallingConvention, CallingConvention) {
        (self.target_convention, self.hook_convention)
    }

    pub fn strategy(&self) -> PatchStrategy {
        self.strategy
    }

    pub fn original_bytes(&self) -> &[u8] {
        &self.original_bytes
    }

    pub fn patch_bytes(&self) -> &[u8] {
        &self.patch_bytes
    }

    pub fn patch_len(&self) -> usize {
        self.patch_bytes.len()
    }

    /// Whether `[addr, addr + len)` intersects this detour's patched bytes.
    pub fn overlaps(&self, addr: Address, len: usize) -> bool {
        let start = self.target.as_u64();
        let end = start + self.patch_len() as u64;
        addr.as_u64() < end && start < addr.as_u64() + len as u64
    }

    pub fn entry_trampoline(&self) -> Option<Address> {
        self.bridge.as_ref().map(|b| b.entry.allocation.address())
    }

    pub fn exit_trampoline(&self) -> Option<Address> {
        self.bridge.as_ref().map(|b| b.exit.allocation.address())
    }

    pub fn ignores_policy(&self) -> bool {
        self.ignores_policy
    }

    pub fn status(&self) -> DetourStatus {
        self.state.lock().status
    }

    pub fn is_enabled(&self) -> bool {
        self.status() == DetourStatus::Enabled
    }

    pub fn is_disabled_by_policy(&self) -> bool {
        self.state.lock().disabled_by_policy
    }

    /// Returns `Ok(true)` if the patch was written. A detour suppressed by
    /// policy stays disabled until [`Detour::enable_by_policy`].
    pub fn enable(&self) -> Result<bool, DetourError> {
        let mut state = self.lock_live()?;
        if state.status == DetourStatus::Enabled || state.disabled_by_policy {
            return Ok(false);
        }
        self.apply_patch()?;
        state.status = DetourStatus::Enabled;
        log::debug!("Enabled detour '{}'", self.identifier);
        Ok(true)
    }

    pub fn disable(&self) -> Result<bool, DetourError> {
        let mut state = self.lock_live()?;
        if state.status == DetourStatus::Disabled {
            // the caller now owns the disabled state
            state.disabled_by_policy = false;
            return Ok(false);
        }
        self.write_code(self.target, &self.original_bytes)?;
        state.status = DetourStatus::Disabled;
        state.disabled_by_policy = false;
        log::debug!("Disabled detour '{}'", self.identifier);
        Ok(true)
    }

    /// Re-enables only a detour that policy itself disabled.
    pub fn enable_by_policy(&self) -> Result<bool, DetourError> {
        let mut state = self.lock_live()?;
        if !state.disabled_by_policy {
            return Ok(false);
        }
        self.apply_patch()?;
        state.status = DetourStatus::Enabled;
        state.disabled_by_policy = false;
        log::debug!("Policy re-enabled detour '{}'", self.identifier);
        Ok(true)
    }

    pub fn disable_by_policy(&self) -> Result<bool, DetourError> {
        let mut state = self.lock_live()?;
        if self.ignores_policy || state.status == DetourStatus::Disabled {
            return Ok(false);
        }
        self.write_code(self.target, &self.original_bytes)?;
        state.status = DetourStatus::Disabled;
        state.disabled_by_policy = true;
        log::debug!("Policy disabled detour '{}'", self.identifier);
        Ok(true)
    }

    /// Runs `invoke` with a pointer to the original function while the
    /// target bytes are restored. The previous enabled state is put back afterwards.
    pub fn call_original<F, R>(&self, invoke: impl FnOnce(F) -> R) -> Result<R, DetourError>
    where
        F: FunctionPtr,
    {
        let was_enabled = {
            let mut state = self.lock_live()?;
            let was_enabled = state.status == DetourStatus::Enabled;
            if was_enabled {
                self.write_code(self.target, &self.original_bytes)?;
                state.status = DetourStatus::Disabled;
            }
            was_enabled
        };

        let guard = RepatchGuard {
            detour: self,
            armed: was_enabled,
        };
        let entry = self.exit_trampoline().unwrap_or(self.target);
        let result = invoke(unsafe { F::from_address(entry) });
        guard.finish()?;
        Ok(result)
    }

    fn repatch(&self) -> Result<(), DetourError> {
        let mut state = self.lock_live()?;
        if state.status == DetourStatus::Disabled && !state.disabled_by_policy {
            self.apply_patch()?;
            state.status = DetourStatus::Enabled;
        }
        Ok(())
    }

    /// Restores the target and frees trampolines. Safe to call more than once.
    pub fn dispose(&self) -> Result<(), DetourError> {
        let mut state = self.state.lock();
        if state.status == DetourStatus::Disposed {
            return Ok(());
        }
        if state.status == DetourStatus::Enabled {
            self.write_code(self.target, &self.original_bytes)?;
        }
        if let Some(bridge) = &self.bridge {
            self.allocations.release(&bridge.entry.allocation)?;
            self.allocations.release(&bridge.exit.allocation)?;
        }
        state.status = DetourStatus::Disposed;
        state.disabled_by_policy = false;
        log::debug!("Disposed detour '{}'", self.identifier);
        Ok(())
    }

    fn lock_live(&self) -> Result<parking_lot::MutexGuard<'_, DetourState>, DetourError> {
        let state = self.state.lock();
        if state.status == DetourStatus::Disposed {
            return Err(DetourError::Disposed(self.identifier.clone()));
        }
        Ok(state)
    }

    fn apply_patch(&self) -> Result<(), DetourError> {
        if let Some(bridge) = &self.bridge {
            for trampoline in [&bridge.entry, &bridge.exit] {
                self.memory.write_bytes(trampoline.allocation.address(), &trampoline.code)?;
            }
        }
        self.write_code(self.target, &self.patch_bytes)
    }

    /// Writes through a temporary RWX window when the backend supports protection changes.
    fn write_code(&self, addr: Address, code: &[u8]) -> Result<(), DetourError> {
        let access = self.memory.access();
        let previous = match access.protect(addr, code.len(), Protection::ReadWriteExecute) {
            Ok(old) => Some(old),
            Err(MemoryError::NotSupported(_)) => None,
            Err(e) => return Err(e.into()),
        };

        let written = self.memory.write_bytes(addr, code);

        if let Some(old) = previous {
            if let Err(e) = access.protect(addr, code.len(), old) {
                log::warn!("Failed to restore {} protection at {}: {}", old, addr, e);
            }
        }

        if written? != code.len() {
            return Err(MemoryError::WriteFailed(addr.as_u64()).into());
        }
        Ok(())
    }
}

impl Drop for Detour {
    fn drop(&mut self) {
        if let Err(e) = self.dispose() {
            log::warn!("Failed to dispose detour '{}': {}", self.identifier, e);
        }
    }
}

impl std::fmt::Debug for Detour {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detour")
            .field("identifier", &self.identifier)
            .field("target", &self.target)
            .field("hook", &self.hook)
            .field("strategy", &self.strategy)
            .field("status", &self.status())
            .finish()
    }
}

/// Puts the patch back after `call_original`, including when `invoke` unwinds.
struct RepatchGuard<'a> {
    detour: &'a Detour,
    armed: bool,
}

impl RepatchGuard<'_> {
    fn finish(mut self) -> Result<(), DetourError> {
        if !self.armed {
            return Ok(());
        }
        self.armed = false;
        self.detour.repatch()
    }
}

impl Drop for RepatchGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = self.detour.repatch() {
                log::warn!("Failed to re-enable detour '{}': {}", self.detour.identifier, e);
            }
        }
    }
}
