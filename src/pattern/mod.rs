// Tue Jan 13 2026 - Alex

pub mod cache;
pub mod error;
pub mod pattern;
pub mod result;
pub mod scanner;
pub mod search;

pub use cache::{ScanCache, ScanCacheKey};
pub use error::PatternError;
pub use pattern::{Pattern, PatternBuilder, PatternKind};
pub use result::ScanResult;
pub use scanner::PatternScanner;
pub use search::SearchAlgorithm;
