//! Typed value handling: parsing, byte codecs and comparisons.
//!
//! All multi-byte codecs are little-endian; the pattern a typed scan emits is
//! whatever the target architecture's writer would produce.

use super::scan::Comparison;
use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;

/// Tolerance for float/double equality in scan comparisons.
pub const FLOAT_EPSILON: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    String,
    WString,
    Bytes,
    Pointer,
}

impl ValueType {
    /// Parse a type name, accepting the host's alias table.
    pub fn parse(text: &str) -> Result<ValueType> {
        match text.to_lowercase().as_str() {
            "b" | "byte" | "int8" | "i8" => Ok(ValueType::I8),
            "ub" | "ubyte" | "uint8" | "u8" => Ok(ValueType::U8),
            "s" | "short" | "int16" | "i16" => Ok(ValueType::I16),
            "us" | "ushort" | "uint16" | "u16" => Ok(ValueType::U16),
            "i" | "int" | "int32" | "i32" => Ok(ValueType::I32),
            "ui" | "uint" | "uint32" | "u32" => Ok(ValueType::U32),
            "l" | "long" | "int64" | "i64" => Ok(ValueType::I64),
            "ul" | "ulong" | "uint64" | "u64" => Ok(ValueType::U64),
            "f" | "float" | "float32" | "f32" => Ok(ValueType::F32),
            "d" | "double" | "float64" | "f64" => Ok(ValueType::F64),
            "str" | "string" | "utf8" => Ok(ValueType::String),
            "wstr" | "wstring" | "utf16" => Ok(ValueType::WString),
            "bs" | "bytes" | "array" | "aob" => Ok(ValueType::Bytes),
            "p" | "ptr" | "pointer" => Ok(ValueType::Pointer),
            other => Err(Error::UnknownType(other.to_string())),
        }
    }

    /// Byte width for fixed-size types; `None` for string/bytes forms.
    pub fn fixed_size(self, pointer_size: usize) -> Option<usize> {
        match self {
            ValueType::I8 | ValueType::U8 => Some(1),
            ValueType::I16 | ValueType::U16 => Some(2),
            ValueType::I32 | ValueType::U32 | ValueType::F32 => Some(4),
            ValueType::I64 | ValueType::U64 | ValueType::F64 => Some(8),
            ValueType::Pointer => Some(pointer_size),
            ValueType::String | ValueType::WString | ValueType::Bytes => None,
        }
    }
}

/// A typed value decoded from target memory.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl ScalarValue {
    fn ordering(&self, other: &ScalarValue) -> Option<Ordering> {
        match (self, other) {
            (ScalarValue::Signed(a), ScalarValue::Signed(b)) => Some(a.cmp(b)),
            (ScalarValue::Unsigned(a), ScalarValue::Unsigned(b)) => Some(a.cmp(b)),
            (ScalarValue::Float(a), ScalarValue::Float(b)) => {
                if (a - b).abs() < FLOAT_EPSILON {
                    Some(Ordering::Equal)
                } else {
                    a.partial_cmp(b)
                }
            }
            (ScalarValue::Text(a), ScalarValue::Text(b)) => Some(a.cmp(b)),
            (ScalarValue::Bytes(a), ScalarValue::Bytes(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Compare against `other`. Values of mismatched kinds never match.
    pub fn matches(&self, other: &ScalarValue, comparison: Comparison) -> bool {
        let Some(ordering) = self.ordering(other) else {
            return false;
        };
        match comparison {
            Comparison::Eq => ordering == Ordering::Equal,
            Comparison::Ne => ordering != Ordering::Equal,
            Comparison::Gt => ordering == Ordering::Greater,
            Comparison::Lt => ordering == Ordering::Less,
            Comparison::Ge => ordering != Ordering::Less,
            Comparison::Le => ordering != Ordering::Greater,
        }
    }

    /// Decode a value of `ty` from the front of `data`; `None` when `data`
    /// is too short.
    pub fn decode(ty: ValueType, data: &[u8], pointer_size: usize) -> Option<ScalarValue> {
        fn array<const N: usize>(data: &[u8]) -> Option<[u8; N]> {
            data.get(..N)?.try_into().ok()
        }

        match ty {
            ValueType::I8 => data.first().map(|&b| ScalarValue::Signed(b as i8 as i64)),
            ValueType::U8 => data.first().map(|&b| ScalarValue::Unsigned(b as u64)),
            ValueType::I16 => {
                array::<2>(data).map(|a| ScalarValue::Signed(i16::from_le_bytes(a) as i64))
            }
            ValueType::U16 => {
                array::<2>(data).map(|a| ScalarValue::Unsigned(u16::from_le_bytes(a) as u64))
            }
            ValueType::I32 => {
                array::<4>(data).map(|a| ScalarValue::Signed(i32::from_le_bytes(a) as i64))
            }
            ValueType::U32 => {
                array::<4>(data).map(|a| ScalarValue::Unsigned(u32::from_le_bytes(a) as u64))
            }
            ValueType::I64 => array::<8>(data).map(|a| ScalarValue::Signed(i64::from_le_bytes(a))),
            ValueType::U64 => {
                array::<8>(data).map(|a| ScalarValue::Unsigned(u64::from_le_bytes(a)))
            }
            ValueType::F32 => {
                array::<4>(data).map(|a| ScalarValue::Float(f32::from_le_bytes(a) as f64))
            }
            ValueType::F64 => array::<8>(data).map(|a| ScalarValue::Float(f64::from_le_bytes(a))),
            ValueType::Pointer => match pointer_size {
                4 => array::<4>(data).map(|a| ScalarValue::Unsigned(u32::from_le_bytes(a) as u64)),
                _ => array::<8>(data).map(|a| ScalarValue::Unsigned(u64::from_le_bytes(a))),
            },
            ValueType::String => {
                let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
                Some(ScalarValue::Text(
                    String::from_utf8_lossy(&data[..end]).into_owned(),
                ))
            }
            ValueType::WString => {
                let mut units = Vec::new();
                for chunk in data.chunks_exact(2) {
                    let unit = u16::from_le_bytes([chunk[0], chunk[1]]);
                    if unit == 0 {
                        break;
                    }
                    units.push(unit);
                }
                Some(ScalarValue::Text(String::from_utf16_lossy(&units)))
            }
            ValueType::Bytes => Some(ScalarValue::Bytes(data.to_vec())),
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Signed(v) => write!(f, "{}", v),
            ScalarValue::Unsigned(v) => write!(f, "{}", v),
            ScalarValue::Float(v) => write!(f, "{}", v),
            ScalarValue::Text(v) => f.write_str(v),
            ScalarValue::Bytes(v) => {
                for (i, byte) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}

fn parse_unsigned(text: &str) -> Option<u64> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else {
        text.parse::<u64>().ok()
    }
}

fn parse_signed(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else {
        text.parse::<i64>().ok()
    }
}

/// Encode a textual value of `ty` into the bytes the target would hold.
///
/// Strings become UTF-8; wide strings become UTF-16LE (ASCII input gains the
/// zero-padded high bytes); `bytes` accepts whitespace-separated hex pairs.
pub fn encode_value(ty: ValueType, text: &str, pointer_size: usize) -> Result<Vec<u8>> {
    let invalid = || Error::Scan(format!("Invalid {:?} value: '{}'", ty, text));
    let bounded_signed = |min: i64, max: i64| -> Result<i64> {
        let v = parse_signed(text).ok_or_else(invalid)?;
        if v < min || v > max {
            return Err(invalid());
        }
        Ok(v)
    };
    let bounded_unsigned = |max: u64| -> Result<u64> {
        let v = parse_unsigned(text).ok_or_else(invalid)?;
        if v > max {
            return Err(invalid());
        }
        Ok(v)
    };

    match ty {
        ValueType::I8 => Ok((bounded_signed(i8::MIN as i64, i8::MAX as i64)? as i8)
            .to_le_bytes()
            .to_vec()),
        ValueType::U8 => Ok((bounded_unsigned(u8::MAX as u64)? as u8).to_le_bytes().to_vec()),
        ValueType::I16 => Ok((bounded_signed(i16::MIN as i64, i16::MAX as i64)? as i16)
            .to_le_bytes()
            .to_vec()),
        ValueType::U16 => Ok((bounded_unsigned(u16::MAX as u64)? as u16)
            .to_le_bytes()
            .to_vec()),
        ValueType::I32 => Ok((bounded_signed(i32::MIN as i64, i32::MAX as i64)? as i32)
            .to_le_bytes()
            .to_vec()),
        ValueType::U32 => Ok((bounded_unsigned(u32::MAX as u64)? as u32)
            .to_le_bytes()
            .to_vec()),
        ValueType::I64 => Ok(parse_signed(text).ok_or_else(invalid)?.to_le_bytes().to_vec()),
        ValueType::U64 => Ok(parse_unsigned(text)
            .ok_or_else(invalid)?
            .to_le_bytes()
            .to_vec()),
        ValueType::F32 => Ok(text
            .trim()
            .parse::<f32>()
            .map_err(|_| invalid())?
            .to_le_bytes()
            .to_vec()),
        ValueType::F64 => Ok(text
            .trim()
            .parse::<f64>()
            .map_err(|_| invalid())?
            .to_le_bytes()
            .to_vec()),
        ValueType::Pointer => {
            let v = parse_unsigned(text).ok_or_else(invalid)?;
            match pointer_size {
                4 => {
                    if v > u32::MAX as u64 {
                        return Err(invalid());
                    }
                    Ok((v as u32).to_le_bytes().to_vec())
                }
                _ => Ok(v.to_le_bytes().to_vec()),
            }
        }
        ValueType::String => Ok(text.as_bytes().to_vec()),
        ValueType::WString => {
            let mut out = Vec::with_capacity(text.len() * 2);
            for unit in text.encode_utf16() {
                out.extend_from_slice(&unit.to_le_bytes());
            }
            Ok(out)
        }
        ValueType::Bytes => text
            .split_whitespace()
            .map(|pair| u8::from_str_radix(pair, 16).map_err(|_| invalid()))
            .collect(),
    }
}
