//! Memory range and protection types.

use super::address::Address;
use crate::error::{Error, Result};
use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Memory protection flags, rendered on the wire in `"r-x"` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Protection {
    pub read: bool,
    pub write: bool,
    pub execute: bool,
}

impl Protection {
    pub const fn new(read: bool, write: bool, execute: bool) -> Self {
        Self {
            read,
            write,
            execute,
        }
    }

    pub const fn read_only() -> Self {
        Self::new(true, false, false)
    }

    /// Parse a protection mask like `"r--"`, `"rw-"` or `"rx"`.
    pub fn parse(text: &str) -> Result<Protection> {
        let mut protection = Protection::default();
        for c in text.chars() {
            match c {
                'r' => protection.read = true,
                'w' => protection.write = true,
                'x' => protection.execute = true,
                '-' => {}
                other => {
                    return Err(Error::Internal(format!(
                        "Invalid protection character: '{}'",
                        other
                    )))
                }
            }
        }
        Ok(protection)
    }

    /// True when every flag set in `min` is also set here.
    pub fn satisfies(self, min: Protection) -> bool {
        (!min.read || self.read) && (!min.write || self.write) && (!min.execute || self.execute)
    }

    /// The same mask with the write flag raised.
    pub fn with_write(self) -> Self {
        Self {
            write: true,
            ..self
        }
    }
}

impl fmt::Display for Protection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            if self.read { 'r' } else { '-' },
            if self.write { 'w' } else { '-' },
            if self.execute { 'x' } else { '-' }
        )
    }
}

impl Serialize for Protection {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Protection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Protection::parse(&text).map_err(de::Error::custom)
    }
}

/// A contiguous span of the target's address space with uniform protection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRange {
    pub base: Address,
    pub size: u64,
    pub protection: Protection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl MemoryRange {
    /// One past the last byte of the range.
    pub fn end(&self) -> Address {
        self.base.wrapping_add(self.size)
    }

    /// Base-inclusive, end-exclusive containment.
    pub fn contains(&self, addr: Address) -> bool {
        addr >= self.base && addr.as_u64() < self.base.as_u64().saturating_add(self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protection_parse_mask() {
        let p = Protection::parse("r-x").unwrap();
        assert!(p.read);
        assert!(!p.write);
        assert!(p.execute);
    }

    #[test]
    fn test_protection_parse_compact() {
        let p = Protection::parse("rw").unwrap();
        assert!(p.read && p.write && !p.execute);
    }

    #[test]
    fn test_protection_parse_invalid() {
        assert!(Protection::parse("q").is_err());
    }

    #[test]
    fn test_protection_roundtrip_display() {
        let p = Protection::new(true, true, false);
        assert_eq!(p.to_string(), "rw-");
        assert_eq!(Protection::parse(&p.to_string()).unwrap(), p);
    }

    #[test]
    fn test_protection_satisfies() {
        let rx = Protection::parse("r-x").unwrap();
        assert!(rx.satisfies(Protection::read_only()));
        assert!(!rx.satisfies(Protection::parse("rw-").unwrap()));
    }

    #[test]
    fn test_with_write_preserves_execute() {
        let rx = Protection::parse("r-x").unwrap();
        let elevated = rx.with_write();
        assert_eq!(elevated.to_string(), "rwx");
        let ro = Protection::read_only().with_write();
        assert_eq!(ro.to_string(), "rw-");
    }

    #[test]
    fn test_range_contains_endpoints() {
        let range = MemoryRange {
            base: Address::new(0x1000),
            size: 0x1000,
            protection: Protection::read_only(),
            file: None,
        };
        assert!(range.contains(Address::new(0x1000)));
        assert!(range.contains(Address::new(0x1fff)));
        assert!(!range.contains(Address::new(0x2000)));
        assert!(!range.contains(Address::new(0xfff)));
    }

    #[test]
    fn test_range_serializes_protection_string() {
        let range = MemoryRange {
            base: Address::new(0x1000),
            size: 16,
            protection: Protection::parse("rw-").unwrap(),
            file: None,
        };
        let json = serde_json::to_value(&range).unwrap();
        assert_eq!(json["protection"], "rw-");
        assert_eq!(json["base"], "0x1000");
    }
}
