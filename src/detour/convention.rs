// Thu Jan 16 2026 - Alex

use crate::memory::AddressWidth;
use serde::{Deserialize, Serialize};
use std::fmt;

/// x86 general purpose registers used for argument passing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    Eax = 0,
    Ecx = 1,
    Edx = 2,
}

impl Register {
    pub fn push_opcode(self) -> u8 {
        0x50 + self as u8
    }

    pub fn pop_opcode(self) -> u8 {
        0x58 + self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallingConvention {
    Cdecl,
    Stdcall,
    Fastcall,
    Thiscall,
    SysV64,
    Win64,
}

impl CallingConvention {
    /// The C convention of the platform this crate was built for.
    pub fn native() -> Self {
        Self::default_for(AddressWidth::native())
    }

    pub fn default_for(width: AddressWidth) -> Self {
        match width {
            AddressWidth::Bits32 => Self::Cdecl,
            AddressWidth::Bits64 if cfg!(windows) => Self::Win64,
            AddressWidth::Bits64 => Self::SysV64,
        }
    }

    pub fn is_x86(self) -> bool {
        !matches!(self, Self::SysV64 | Self::Win64)
    }

    pub fn fits(self, width: AddressWidth) -> bool {
        match width {
            AddressWidth::Bits32 => self.is_x86(),
            AddressWidth::Bits64 => !self.is_x86(),
        }
    }

    pub fn callee_cleans(self) -> bool {
        matches!(self, Self::Stdcall | Self::Fastcall | Self::Thiscall)
    }

    /// x86 argument registers, in argument order. Empty on x64, where
    /// this crate never reorders arguments.
    pub fn register_args(self) -> &'static [Register] {
        match self {
            Self::Fastcall => &[Register::Ecx, Register::Edx],
            Self::Thiscall => &[Register::Ecx],
            _ => &[],
        }
    }

    /// Registers actually carrying arguments for a call with `param_count` parameters.
    pub fn used_registers(self, param_count: usize) -> &'static [Register] {
        let regs = self.register_args();
        &regs[..regs.len().min(param_count)]
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "cdecl" => Some(Self::Cdecl),
            "stdcall" => Some(Self::Stdcall),
            "fastcall" => Some(Self::Fastcall),
            "thiscall" => Some(Self::Thiscall),
            "sysv64" => Some(Self::SysV64),
            "win64" => Some(Self::Win64),
            _ => None,
        }
    }
}

impl Default for CallingConvention {
    fn default() -> Self {
        Self::native()
    }
}

impl fmt::Display for CallingConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cdecl => "cdecl",
            Self::Stdcall => "stdcall",
            Self::Fastcall => "fastcall",
            Self::Thiscall => "thiscall",
            Self::SysV64 => "sysv64",
            Self::Win64 => "win64",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_used_registers_truncate() {
        assert_eq!(CallingConvention::Fastcall.used_registers(1), &[Register::Ecx]);
        assert_eq!(CallingConvention::Fastcall.used_registers(5), &[Register::Ecx, Register::Edx]);
        assert!(CallingConvention::Stdcall.used_registers(3).is_empty());
    }

    #[test]
    fn test_opcodes() {
        assert_eq!(Register::Edx.push_opcode(), 0x52);
        assert_eq!(Register::Ecx.pop_opcode(), 0x59);
        assert_eq!(Register::Eax.pop_opcode(), 0x58);
    }

    #[test]
    fn test_width_fit() {
        assert!(CallingConvention::Thiscall.fits(AddressWidth::Bits32));
        assert!(!CallingConvention::Thiscall.fits(AddressWidth::Bits64));
        assert!(CallingConvention::SysV64.fits(AddressWidth::Bits64));
    }
}
