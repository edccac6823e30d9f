// Tue Jan 13 2026 - Alex

use crate::memory::MemoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PatternError {
    #[error("Invalid pattern token '{0}'")]
    InvalidToken(String),
    #[error("Pattern is empty")]
    EmptyPattern,
    #[error("Could not read image of module {module}: {source}")]
    ModuleRead {
        module: String,
        #[source]
        source: MemoryError,
    },
}
