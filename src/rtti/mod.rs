// Thu Jan 16 2026 - Alex

pub mod layout;
pub mod resolver;

pub use layout::RttiLayout;
pub use resolver::RttiResolver;
