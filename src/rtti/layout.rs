// Thu Jan 16 2026 - Alex

use crate::memory::AddressWidth;

/// Base-class counts at or above this are treated as garbage.
pub const MAX_BASE_CLASSES: i32 = 25;

/// Longest type-descriptor name read, in bytes.
pub const MAX_NAME_LENGTH: usize = 60;

/// Field offsets of the MSVC RTTI structures for one target bitness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RttiLayout {
    /// Object locator -> class hierarchy descriptor (pointer or RVA)
    pub hierarchy_descriptor: u64,
    /// Object locator -> RVA of the locator itself (64-bit only)
    pub self_offset: Option<u64>,
    /// Class hierarchy descriptor -> number of base classes
    pub base_class_count: u64,
    /// Class hierarchy descriptor -> base class array (pointer or RVA)
    pub base_class_array: u64,
    /// Width of one base class array entry
    pub array_stride: u64,
    /// Type descriptor -> decorated name, past the `.?AV` prefix
    pub type_name: u64,
}

impl RttiLayout {
    pub const MSVC32: Self = Self {
        hierarchy_descriptor: 0x10,
        self_offset: None,
        base_class_count: 0x08,
        base_class_array: 0x0C,
        array_stride: 4,
        type_name: 0x0C,
    };

    pub const MSVC64: Self = Self {
        hierarchy_descriptor: 0x10,
        self_offset: Some(0x14),
        base_class_count: 0x08,
        base_class_array: 0x0C,
        array_stride: 4,
        type_name: 0x14,
    };

    pub fn for_width(width: AddressWidth) -> Self {
        match width {
            AddressWidth::Bits32 => Self::MSVC32,
            AddressWidth::Bits64 => Self::MSVC64,
        }
    }

    /// 64-bit images link these structures by image-relative offsets.
    pub fn is_relative(&self) -> bool {
        self.self_offset.is_some()
    }
}
