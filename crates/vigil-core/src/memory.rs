//! Typed memory I/O over the raw access trait.

use crate::dit::MemoryAccess;
use vigil_common::{encode_value, Address, Protection, Result, ScalarValue, ValueType};

/// Default cap for C-string reads.
pub const DEFAULT_STRING_CAP: usize = 256;

/// Bytes to read for a typed access: the fixed width, or the caller-supplied
/// length (with a default) for string/byte forms.
fn read_len(ty: ValueType, len: Option<usize>, pointer_size: usize) -> usize {
    match ty.fixed_size(pointer_size) {
        Some(size) => size,
        None => match ty {
            ValueType::WString => len.unwrap_or(DEFAULT_STRING_CAP) * 2,
            _ => len.unwrap_or(DEFAULT_STRING_CAP),
        },
    }
}

/// Read a typed value at `addr`. String reads are clamped to the containing
/// range so a string near the end of a mapping does not fault.
pub fn read_typed(
    mem: &dyn MemoryAccess,
    addr: Address,
    ty: ValueType,
    len: Option<usize>,
    pointer_size: usize,
) -> Result<ScalarValue> {
    let mut wanted = read_len(ty, len, pointer_size);

    if matches!(ty, ValueType::String | ValueType::WString) {
        if let Some(range) = mem.range_containing(addr) {
            if let Some(offset) = addr.offset_from(range.base) {
                let available = range.size.saturating_sub(offset) as usize;
                wanted = wanted.min(available);
            }
        }
    }

    let data = mem.read(addr, wanted)?;
    ScalarValue::decode(ty, &data, pointer_size).ok_or_else(|| {
        vigil_common::Error::MemoryAccess {
            address: addr.as_u64(),
            message: format!("short read for {:?}", ty),
        }
    })
}

/// Encode `text` as `ty` and write it at `addr`.
pub fn write_typed(
    mem: &dyn MemoryAccess,
    addr: Address,
    ty: ValueType,
    text: &str,
    pointer_size: usize,
) -> Result<()> {
    let bytes = encode_value(ty, text, pointer_size)?;
    mem.write(addr, &bytes)
}

pub fn can_read(mem: &dyn MemoryAccess, addr: Address) -> bool {
    mem.range_containing(addr)
        .map(|range| range.protection.read)
        .unwrap_or(false)
}

pub fn can_write(mem: &dyn MemoryAccess, addr: Address) -> bool {
    mem.range_containing(addr)
        .map(|range| range.protection.write)
        .unwrap_or(false)
}

pub fn protection_of(mem: &dyn MemoryAccess, addr: Address) -> Option<Protection> {
    mem.range_containing(addr).map(|range| range.protection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::BufferMemory;
    use vigil_common::Error;

    #[test]
    fn test_read_typed_int() {
        let mem = BufferMemory::new(0x1000, 42i32.to_le_bytes().to_vec());
        let value = read_typed(&mem, Address::new(0x1000), ValueType::I32, None, 8).unwrap();
        assert_eq!(value, ScalarValue::Signed(42));
    }

    #[test]
    fn test_read_typed_unmapped_fails() {
        let mem = BufferMemory::new(0x1000, vec![0; 4]);
        assert!(matches!(
            read_typed(&mem, Address::new(0x9000), ValueType::I32, None, 8),
            Err(Error::MemoryAccess { .. })
        ));
    }

    #[test]
    fn test_read_string_clamped_to_range_end() {
        // "hi" right at the end of the mapping, no NUL terminator in range.
        let mem = BufferMemory::new(0x1000, b"hi".to_vec());
        let value = read_typed(&mem, Address::new(0x1000), ValueType::String, None, 8).unwrap();
        assert_eq!(value, ScalarValue::Text("hi".to_string()));
    }

    #[test]
    fn test_read_string_respects_explicit_cap() {
        let mem = BufferMemory::new(0x1000, b"abcdef\0".to_vec());
        let value =
            read_typed(&mem, Address::new(0x1000), ValueType::String, Some(3), 8).unwrap();
        assert_eq!(value, ScalarValue::Text("abc".to_string()));
    }

    #[test]
    fn test_write_typed_roundtrip() {
        let mem = BufferMemory::new(0x1000, vec![0; 8]);
        write_typed(&mem, Address::new(0x1000), ValueType::F64, "2.5", 8).unwrap();
        let value = read_typed(&mem, Address::new(0x1000), ValueType::F64, None, 8).unwrap();
        assert_eq!(value, ScalarValue::Float(2.5));
    }

    #[test]
    fn test_protection_queries() {
        let mem = BufferMemory::new(0x1000, vec![0; 16]);
        assert!(can_read(&mem, Address::new(0x1000)));
        assert!(can_write(&mem, Address::new(0x1000)));
        assert!(!can_read(&mem, Address::new(0x9000)));
        assert_eq!(
            protection_of(&mem, Address::new(0x1000)).unwrap().to_string(),
            "rw-"
        );
    }
}
