// Thu Jan 16 2026 - Alex

use crate::detour::CallingConvention;
use crate::memory::MemoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetourError {
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),
    #[error("Cannot bridge {target} target to {hook} hook")]
    UnsupportedBridge {
        target: CallingConvention,
        hook: CallingConvention,
    },
    #[error("Detour '{0}' already exists")]
    DuplicateIdentifier(String),
    #[error("Detour '{identifier}' overlaps patch of '{other}'")]
    Overlap { identifier: String, other: String },
    #[error("Detour '{0}' has been disposed")]
    Disposed(String),
}
