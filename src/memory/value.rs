// Wed Jan 15 2026 - Alex

use crate::memory::{Address, AddressWidth};

/// Fixed-size values moved by plain little-endian bit reinterpretation.
pub trait Primitive: Copy + Default + Send + Sync + 'static {
    const SIZE: usize;

    /// `bytes` is exactly `SIZE` long.
    fn from_le_slice(bytes: &[u8]) -> Self;

    /// `out` is exactly `SIZE` long.
    fn write_le(self, out: &mut [u8]);
}

/// Largest primitive, used to size stack buffers.
pub const MAX_PRIMITIVE_SIZE: usize = 8;

macro_rules! impl_primitive {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Primitive for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn from_le_slice(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..Self::SIZE]);
                    <$ty>::from_le_bytes(raw)
                }

                fn write_le(self, out: &mut [u8]) {
                    out[..Self::SIZE].copy_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

impl_primitive!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

impl Primitive for bool {
    const SIZE: usize = 1;

    fn from_le_slice(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    fn write_le(self, out: &mut [u8]) {
        out[0] = self as u8;
    }
}

impl Primitive for char {
    const SIZE: usize = 4;

    fn from_le_slice(bytes: &[u8]) -> Self {
        char::from_u32(u32::from_le_slice(bytes)).unwrap_or_default()
    }

    fn write_le(self, out: &mut [u8]) {
        (self as u32).write_le(out);
    }
}

/// Flat compound values laid out field by field in target memory.
///
/// Pointer-sized fields follow the target's [`AddressWidth`], so one
/// definition serves both 32 and 64-bit targets.
pub trait Structure: Sized {
    fn size(width: AddressWidth) -> usize;

    fn read_from(reader: &mut StructReader<'_>) -> Self;

    fn write_to(&self, writer: &mut StructWriter);
}

pub struct StructReader<'a> {
    data: &'a [u8],
    cursor: usize,
    width: AddressWidth,
}

impl<'a> StructReader<'a> {
    pub fn new(data: &'a [u8], width: AddressWidth) -> Self {
        Self {
            data,
            cursor: 0,
            width,
        }
    }

    pub fn width(&self) -> AddressWidth {
        self.width
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Out-of-range fields read as zero, like every other failed read.
    pub fn read<T: Primitive>(&mut self) -> T {
        let end = self.cursor + T::SIZE;
        let value = match self.data.get(self.cursor..end) {
            Some(bytes) => T::from_le_slice(bytes),
            None => T::default(),
        };
        self.cursor = end;
        value
    }

    pub fn read_address(&mut self) -> Address {
        match self.width {
            AddressWidth::Bits32 => Address::new(self.read::<u32>() as u64),
            AddressWidth::Bits64 => Address::new(self.read::<u64>()),
        }
    }

    pub fn skip(&mut self, count: usize) {
        self.cursor += count;
    }
}

pub struct StructWriter {
    data: Vec<u8>,
    width: AddressWidth,
}

impl StructWriter {
    pub fn new(width: AddressWidth) -> Self {
        Self {
            data: Vec::new(),
            width,
        }
    }

    pub fn width(&self) -> AddressWidth {
        self.width
    }

    pub fn write<T: Primitive>(&mut self, value: T) {
        let start = self.data.len();
        self.data.resize(start + T::SIZE, 0);
        value.write_le(&mut self.data[start..]);
    }

    pub fn write_address(&mut self, value: Address) {
        match self.width {
            AddressWidth::Bits32 => self.write(value.as_u64() as u32),
            AddressWidth::Bits64 => self.write(value.as_u64()),
        }
    }

    pub fn pad(&mut self, count: usize) {
        self.data.resize(self.data.len() + count, 0);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Entry {
        id: u32,
        next: Address,
        weight: f32,
    }

    impl Structure for Entry {
        fn size(width: AddressWidth) -> usize {
            4 + width.pointer_size() + 4
        }

        fn read_from(reader: &mut StructReader<'_>) -> Self {
            Self {
                id: reader.read(),
                next: reader.read_address(),
                weight: reader.read(),
            }
        }

        fn write_to(&self, writer: &mut StructWriter) {
            writer.write(self.id);
            writer.write_address(self.next);
            writer.write(self.weight);
        }
    }

    #[test]
    fn test_structure_layout_follows_width() {
        let entry = Entry {
            id: 7,
            next: Address::new(0x1234_5678),
            weight: 1.5,
        };

        for width in [AddressWidth::Bits32, AddressWidth::Bits64] {
            let mut writer = StructWriter::new(width);
            entry.write_to(&mut writer);
            let bytes = writer.into_bytes();
            assert_eq!(bytes.len(), Entry::size(width));

            let mut reader = StructReader::new(&bytes, width);
            assert_eq!(Entry::read_from(&mut reader), entry);
        }
    }

    #[test]
    fn test_short_buffer_reads_zero() {
        let mut reader = StructReader::new(&[1, 0], AddressWidth::Bits64);
        assert_eq!(reader.read::<u32>(), 0);
    }

    #[test]
    fn test_char_and_bool() {
        let mut buf = [0u8; 4];
        'é'.write_le(&mut buf);
        assert_eq!(char::from_le_slice(&buf), 'é');
        assert!(bool::from_le_slice(&[2]));
        assert_eq!(char::from_le_slice(&[0xFF, 0xFF, 0xFF, 0xFF]), '\0');
    }
}
