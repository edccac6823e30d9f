// Tue Jan 13 2026 - Alex

use crate::memory::value::MAX_PRIMITIVE_SIZE;
use crate::memory::{
    Address, AddressWidth, MemoryError, Primitive, ProcessAccess, StringEncoding, StructReader, StructWriter,
    Structure,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const DEFAULT_STRING_LENGTH: usize = 512;

const PAGE_SIZE: u64 = 0x1000;

/// Typed reads and writes over any [`ProcessAccess`] backend.
///
/// `read*` methods follow the forgiving contract: a null address is an
/// error, but a read the OS refuses yields zeroes, a warning and a bump of
/// [`TypedMemory::failed_reads`]. The `try_read*` variants surface the
/// failure instead.
pub struct TypedMemory {
    access: Arc<dyn ProcessAccess>,
    width: AddressWidth,
    string_max_len: usize,
    failed_reads: AtomicUsize,
}

impl TypedMemory {
    pub fn new(access: Arc<dyn ProcessAccess>) -> Self {
        let width = access.address_width();
        Self {
            access,
            width,
            string_max_len: DEFAULT_STRING_LENGTH,
            failed_reads: AtomicUsize::new(0),
        }
    }

    pub fn with_string_max_len(mut self, max_len: usize) -> Self {
        self.string_max_len = max_len;
        self
    }

    pub fn access(&self) -> &Arc<dyn ProcessAccess> {
        &self.access
    }

    pub fn width(&self) -> AddressWidth {
        self.width
    }

    pub fn pointer_size(&self) -> usize {
        self.width.pointer_size()
    }

    pub fn failed_reads(&self) -> usize {
        self.failed_reads.load(Ordering::Relaxed)
    }

    fn check(addr: Address) -> Result<(), MemoryError> {
        if addr.is_null() {
            return Err(MemoryError::InvalidAddress("null pointer dereference".to_string()));
        }
        Ok(())
    }

    fn absorb<T>(&self, addr: Address, len: usize, result: Result<T, MemoryError>, fallback: T) -> Result<T, MemoryError> {
        match result {
            Err(MemoryError::AccessViolation(_)) => {
                self.failed_reads.fetch_add(1, Ordering::Relaxed);
                log::warn!("Read of {} bytes at {} failed, using zero value", len, addr);
                Ok(fallback)
            }
            other => other,
        }
    }

    pub fn try_read<T: Primitive>(&self, addr: Address) -> Result<T, MemoryError> {
        Self::check(addr)?;
        let mut buf = [0u8; MAX_PRIMITIVE_SIZE];
        self.access.read_into(addr, &mut buf[..T::SIZE])?;
        Ok(T::from_le_slice(&buf[..T::SIZE]))
    }

    pub fn read<T: Primitive>(&self, addr: Address) -> Result<T, MemoryError> {
        let result = self.try_read(addr);
        self.absorb(addr, T::SIZE, result, T::default())
    }

    pub fn try_read_address(&self, addr: Address) -> Result<Address, MemoryError> {
        Ok(match self.width {
            AddressWidth::Bits32 => Address::new(self.try_read::<u32>(addr)? as u64),
            AddressWidth::Bits64 => Address::new(self.try_read::<u64>(addr)?),
        })
    }

    pub fn read_address(&self, addr: Address) -> Result<Address, MemoryError> {
        let result = self.try_read_address(addr);
        self.absorb(addr, self.pointer_size(), result, Address::zero())
    }

    pub fn try_read_bytes(&self, addr: Address, len: usize) -> Result<Vec<u8>, MemoryError> {
        Self::check(addr)?;
        self.access.read_bytes(addr, len)
    }

    pub fn read_bytes(&self, addr: Address, len: usize) -> Result<Vec<u8>, MemoryError> {
        let result = self.try_read_bytes(addr, len);
        self.absorb(addr, len, result, vec![0u8; len])
    }

    /// One read per element at consecutive addresses; not atomic.
    pub fn read_array<T: Primitive>(&self, addr: Address, count: usize) -> Result<Vec<T>, MemoryError> {
        Self::check(addr)?;
        (0..count).map(|i| self.read::<T>(addr + i * T::SIZE)).collect()
    }

    pub fn read_string(&self, addr: Address, encoding: StringEncoding) -> Result<String, MemoryError> {
        self.read_string_with_len(addr, encoding, self.string_max_len)
    }

    /// Reads at most `max_len` bytes and stops at the first terminator.
    /// If the full span is unreadable the read is retried up to the end
    /// of the page holding `addr`.
    pub fn read_string_with_len(
        &self,
        addr: Address,
        encoding: StringEncoding,
        max_len: usize,
    ) -> Result<String, MemoryError> {
        Self::check(addr)?;
        let bytes = match self.access.read_bytes(addr, max_len) {
            Ok(bytes) => bytes,
            Err(MemoryError::AccessViolation(_)) => {
                let to_page_end = (PAGE_SIZE - addr.as_u64() % PAGE_SIZE) as usize;
                let shorter = to_page_end.min(max_len);
                let result = if shorter < max_len {
                    self.access.read_bytes(addr, shorter)
                } else {
                    Err(MemoryError::AccessViolation(addr.as_u64()))
                };
                self.absorb(addr, max_len, result, Vec::new())?
            }
            Err(e) => return Err(e),
        };
        Ok(encoding.decode(&bytes))
    }

    /// Reads `len` bytes for a module snapshot. Pages the OS refuses come
    /// back zero-filled; only a range with nothing readable fails.
    pub fn read_image(&self, addr: Address, len: usize) -> Result<Vec<u8>, MemoryError> {
        Self::check(addr)?;
        match self.access.read_bytes(addr, len) {
            Err(MemoryError::AccessViolation(_)) => {}
            other => return other,
        }

        let mut image = vec![0u8; len];
        let mut offset = 0usize;
        let mut readable = 0usize;
        while offset < len {
            let at = addr + offset;
            let chunk = ((PAGE_SIZE - at.as_u64() % PAGE_SIZE) as usize).min(len - offset);
            let page = &mut image[offset..offset + chunk];
            match self.access.read_into(at, page) {
                Ok(()) => readable += chunk,
                Err(MemoryError::AccessViolation(_)) => page.fill(0),
                Err(e) => return Err(e),
            }
            offset += chunk;
        }

        if readable == 0 {
            return Err(MemoryError::AccessViolation(addr.as_u64()));
        }
        log::debug!("Image at {}: {} of {} bytes readable", addr, readable, len);
        Ok(image)
    }

    pub fn read_struct<S: Structure>(&self, addr: Address) -> Result<S, MemoryError> {
        let bytes = self.read_bytes(addr, S::size(self.width))?;
        let mut reader = StructReader::new(&bytes, self.width);
        Ok(S::read_from(&mut reader))
    }

    pub fn write<T: Primitive>(&self, addr: Address, value: T) -> Result<(), MemoryError> {
        let mut buf = [0u8; MAX_PRIMITIVE_SIZE];
        value.write_le(&mut buf[..T::SIZE]);
        self.write_all(addr, &buf[..T::SIZE])
    }

    pub fn write_address(&self, addr: Address, value: Address) -> Result<(), MemoryError> {
        match self.width {
            AddressWidth::Bits32 => self.write(addr, value.as_u64() as u32),
            AddressWidth::Bits64 => self.write(addr, value.as_u64()),
        }
    }

    pub fn write_array<T: Primitive>(&self, addr: Address, values: &[T]) -> Result<(), MemoryError> {
        for (i, value) in values.iter().enumerate() {
            self.write(addr + i * T::SIZE, *value)?;
        }
        Ok(())
    }

    /// Returns the byte count the backend reports as written.
    pub fn write_bytes(&self, addr: Address, data: &[u8]) -> Result<usize, MemoryError> {
        Self::check(addr)?;
        self.access.write_bytes(addr, data)
    }

    /// Appends a terminator unless `text` already ends with one.
    pub fn write_string(&self, addr: Address, text: &str, encoding: StringEncoding) -> Result<usize, MemoryError> {
        let bytes = encoding.encode(text);
        self.write_all(addr, &bytes)?;
        Ok(bytes.len())
    }

    pub fn write_struct<S: Structure>(&self, addr: Address, value: &S) -> Result<(), MemoryError> {
        let mut writer = StructWriter::new(self.width);
        value.write_to(&mut writer);
        self.write_all(addr, &writer.into_bytes())
    }

    fn write_all(&self, addr: Address, data: &[u8]) -> Result<(), MemoryError> {
        let written = self.write_bytes(addr, data)?;
        if written != data.len() {
            return Err(MemoryError::WriteFailed(addr.as_u64()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Protection, SimulatedProcess};

    const BASE: Address = Address::new(0x0010_0000);

    fn memory(width: AddressWidth) -> (Arc<SimulatedProcess>, TypedMemory) {
        let process = Arc::new(SimulatedProcess::new(width));
        process.map_zeroed(BASE, 0x2000, Protection::ReadWrite).unwrap();
        let memory = TypedMemory::new(process.clone());
        (process, memory)
    }

    fn round_trip<T: Primitive + PartialEq + std::fmt::Debug>(memory: &TypedMemory, value: T) {
        memory.write(BASE + 0x10u64, value).unwrap();
        assert_eq!(memory.read::<T>(BASE + 0x10u64).unwrap(), value);
    }

    #[test]
    fn test_primitive_round_trips() {
        let (_process, memory) = memory(AddressWidth::Bits64);
        round_trip(&memory, 0xABu8);
        round_trip(&memory, -2i8);
        round_trip(&memory, 0xBEEFu16);
        round_trip(&memory, i16::MIN);
        round_trip(&memory, 0xDEAD_BEEFu32);
        round_trip(&memory, -123_456i32);
        round_trip(&memory, u64::MAX - 1);
        round_trip(&memory, i64::MIN);
        round_trip(&memory, 3.25f32);
        round_trip(&memory, -1.0e300f64);
        round_trip(&memory, true);
        round_trip(&memory, 'Z');
    }

    #[test]
    fn test_null_address_is_rejected() {
        let (_process, memory) = memory(AddressWidth::Bits64);
        assert!(matches!(memory.read::<u32>(Address::zero()), Err(MemoryError::InvalidAddress(_))));
        assert!(memory.write(Address::zero(), 1u8).is_err());
    }

    #[test]
    fn test_failed_read_yields_zero_and_counts() {
        let (_process, memory) = memory(AddressWidth::Bits64);
        let unmapped = Address::new(0x0900_0000);

        assert_eq!(memory.read::<u64>(unmapped).unwrap(), 0);
        assert_eq!(memory.failed_reads(), 1);
        assert!(memory.try_read::<u64>(unmapped).unwrap_err().is_access_violation());
    }

    #[test]
    fn test_address_follows_target_width() {
        let (_process, memory) = memory(AddressWidth::Bits32);
        memory.write(BASE, 0x1122_3344_5566_7788u64).unwrap();
        assert_eq!(memory.read_address(BASE).unwrap(), Address::new(0x5566_7788));

        memory.write_address(BASE, Address::new(0xAABB_CCDD)).unwrap();
        assert_eq!(memory.read::<u64>(BASE).unwrap(), 0x1122_3344_AABB_CCDD);
    }

    #[test]
    fn test_arrays() {
        let (_process, memory) = memory(AddressWidth::Bits64);
        memory.write_array(BASE, &[1u16, 2, 3, 4]).unwrap();
        assert_eq!(memory.read_array::<u16>(BASE, 4).unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(memory.read_bytes(BASE, 4).unwrap(), vec![1, 0, 2, 0]);
    }

    #[test]
    fn test_strings() {
        let (_process, memory) = memory(AddressWidth::Bits64);
        let written = memory.write_string(BASE, "CharacterMesh", StringEncoding::Utf8).unwrap();
        assert_eq!(written, 14);
        assert_eq!(memory.read_string(BASE, StringEncoding::Utf8).unwrap(), "CharacterMesh");

        memory.write_string(BASE + 0x100u64, "wide", StringEncoding::Utf16Le).unwrap();
        assert_eq!(memory.read_string(BASE + 0x100u64, StringEncoding::Utf16Le).unwrap(), "wide");
    }

    #[test]
    fn test_string_near_end_of_mapping() {
        let (_process, memory) = memory(AddressWidth::Bits64);
        let tail = BASE + 0x1FF8u64;
        memory.write_string(tail, "edge", StringEncoding::Utf8).unwrap();
        assert_eq!(memory.read_string(tail, StringEncoding::Utf8).unwrap(), "edge");
        assert_eq!(memory.failed_reads(), 0);
    }

    #[test]
    fn test_string_cut_at_max_len() {
        let (_process, memory) = memory(AddressWidth::Bits64);
        memory.write_string(BASE, "abcdefghijklmnopqrst", StringEncoding::Utf8).unwrap();

        let cut = memory.read_string_with_len(BASE, StringEncoding::Utf8, 8).unwrap();
        assert_eq!(cut, "abcdefgh");

        let memory = memory.with_string_max_len(4);
        assert_eq!(memory.read_string(BASE, StringEncoding::Utf8).unwrap(), "abcd");
    }

    #[test]
    fn test_image_read_zero_fills_holes() {
        let process = Arc::new(SimulatedProcess::new(AddressWidth::Bits64));
        process.map(BASE, vec![0x11; 0x1000], Protection::Read).unwrap();
        process.map(BASE + 0x2000u64, vec![0x33; 0x1000], Protection::Read).unwrap();
        let memory = TypedMemory::new(process);

        let image = memory.read_image(BASE, 0x3000).unwrap();
        assert_eq!(image.len(), 0x3000);
        assert!(image[..0x1000].iter().all(|&b| b == 0x11));
        assert!(image[0x1000..0x2000].iter().all(|&b| b == 0));
        assert!(image[0x2000..].iter().all(|&b| b == 0x33));

        let unmapped = Address::new(0x0900_0000);
        assert!(memory.read_image(unmapped, 0x2000).unwrap_err().is_access_violation());
    }

    #[test]
    fn test_write_to_read_only_fails() {
        let process = Arc::new(SimulatedProcess::new(AddressWidth::Bits64));
        process.map_zeroed(BASE, 0x10, Protection::Read).unwrap();
        let memory = TypedMemory::new(process);
        assert!(matches!(memory.write(BASE, 1u32), Err(MemoryError::WriteFailed(_))));
    }
}
