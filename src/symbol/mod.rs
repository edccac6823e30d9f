// Tue Jan 13 2026 - Alex

pub mod demangle;

pub use demangle::{demangle_msvc, MsvcDemangler, SymbolDemangler};
