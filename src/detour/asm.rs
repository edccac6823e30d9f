// Thu Jan 16 2026 - Alex

use crate::detour::convention::Register;
use crate::detour::{CallingConvention, DetourError};
use crate::memory::{Address, AddressWidth};

/// Bytes overwritten at the target for the given bitness.
pub fn patch_len(width: AddressWidth) -> usize {
    match width {
        AddressWidth::Bits32 => 6,
        AddressWidth::Bits64 => 12,
    }
}

/// `push imm32; ret` on x86, `mov rax, imm64; jmp rax` on x64.
pub fn absolute_jump(width: AddressWidth, destination: Address) -> Vec<u8> {
    let mut code = Vec::with_capacity(patch_len(width));
    match width {
        AddressWidth::Bits32 => {
            code.push(0x68);
            code.extend_from_slice(&(destination.as_u64() as u32).to_le_bytes());
            code.push(0xC3);
        }
        AddressWidth::Bits64 => {
            code.extend_from_slice(&[0x48, 0xB8]);
            code.extend_from_slice(&destination.as_u64().to_le_bytes());
            code.extend_from_slice(&[0xFF, 0xE0]);
        }
    }
    code
}

/// x86 stub that moves register arguments of one convention onto the stack
/// and loads the registers of another, then continues at `destination`.
///
/// The return address is parked in eax while the arguments move:
/// `pop eax; push <from regs reversed>; pop <to regs>; push eax; push dest; ret`.
pub fn bridge_trampoline(from: &[Register], to: &[Register], destination: Address) -> Vec<u8> {
    let mut code = Vec::with_capacity(from.len() + to.len() + 8);
    code.push(Register::Eax.pop_opcode());
    for reg in from.iter().rev() {
        code.push(reg.push_opcode());
    }
    for reg in to {
        code.push(reg.pop_opcode());
    }
    code.push(Register::Eax.push_opcode());
    code.push(0x68);
    code.extend_from_slice(&(destination.as_u64() as u32).to_le_bytes());
    code.push(0xC3);
    code
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchStrategy {
    /// Target jumps straight to the hook.
    Direct,
    /// Target jumps to an entry trampoline that reorders arguments.
    Bridge,
}

pub fn select_strategy(
    width: AddressWidth,
    target: CallingConvention,
    hook: CallingConvention,
    param_count: usize,
) -> Result<PatchStrategy, DetourError> {
    let unsupported = || DetourError::UnsupportedBridge { target, hook };

    if !target.fits(width) || !hook.fits(width) {
        return Err(unsupported());
    }
    if target == hook {
        return Ok(PatchStrategy::Direct);
    }

    let same_registers = target.used_registers(param_count) == hook.used_registers(param_count);
    let stack_args = param_count.saturating_sub(target.used_registers(param_count).len());
    let same_cleanup = target.callee_cleans() == hook.callee_cleans() || stack_args == 0;
    if same_registers && same_cleanup {
        return Ok(PatchStrategy::Direct);
    }

    if width == AddressWidth::Bits32 && target.callee_cleans() && hook.callee_cleans() {
        Ok(PatchStrategy::Bridge)
    } else {
        Err(unsupported())
    }
}
