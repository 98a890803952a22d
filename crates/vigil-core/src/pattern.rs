//! Byte patterns with wildcard nibbles.
//!
//! Pattern format: whitespace-separated hex pairs where either nibble may be
//! `?`, e.g. `"48 8b ?? 4? ?c"`. The mask keeps nibble granularity so `4?`
//! matches `0x40..=0x4f`.

use vigil_common::{Error, Result};

/// Longest accepted pattern text.
const MAX_PATTERN_LENGTH: usize = 4096;

#[derive(Debug, Clone)]
pub struct Pattern {
    bytes: Vec<u8>,
    mask: Vec<u8>,
}

impl Pattern {
    /// Parse a pattern string.
    pub fn parse(text: &str) -> Result<Pattern> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Scan("Empty pattern".to_string()));
        }
        if text.len() > MAX_PATTERN_LENGTH {
            return Err(Error::Scan(format!(
                "Pattern too long (max {} chars)",
                MAX_PATTERN_LENGTH
            )));
        }

        let mut bytes = Vec::new();
        let mut mask = Vec::new();
        let mut nibbles = text.chars().filter(|c| !c.is_whitespace());

        while let Some(hi) = nibbles.next() {
            let lo = nibbles
                .next()
                .ok_or_else(|| Error::Scan("Incomplete hex byte in pattern".to_string()))?;

            let mut byte = 0u8;
            let mut byte_mask = 0u8;
            for (shift, c) in [(4u8, hi), (0u8, lo)] {
                match c {
                    '?' => {}
                    c if c.is_ascii_hexdigit() => {
                        byte |= (c.to_digit(16).unwrap() as u8) << shift;
                        byte_mask |= 0x0f << shift;
                    }
                    other => {
                        return Err(Error::Scan(format!(
                            "Invalid character in pattern: '{}'",
                            other
                        )))
                    }
                }
            }
            bytes.push(byte);
            mask.push(byte_mask);
        }

        Ok(Pattern { bytes, mask })
    }

    /// A fully-masked pattern matching `data` exactly.
    pub fn from_bytes(data: &[u8]) -> Pattern {
        Pattern {
            mask: vec![0xff; data.len()],
            bytes: data.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Match against the front of `window`.
    pub fn matches_at(&self, window: &[u8]) -> bool {
        if window.len() < self.bytes.len() {
            return false;
        }
        self.bytes
            .iter()
            .zip(&self.mask)
            .zip(window)
            .all(|((&byte, &mask), &actual)| actual & mask == byte & mask)
    }

    /// Offsets of every match within `data`.
    pub fn find_in(&self, data: &[u8]) -> Vec<usize> {
        if self.bytes.is_empty() || data.len() < self.bytes.len() {
            return Vec::new();
        }
        let last = data.len() - self.bytes.len();
        (0..=last)
            .filter(|&offset| self.matches_at(&data[offset..]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_bytes() {
        let pattern = Pattern::parse("48 8B C0").unwrap();
        assert_eq!(pattern.len(), 3);
        assert!(pattern.matches_at(&[0x48, 0x8b, 0xc0]));
        assert!(!pattern.matches_at(&[0x48, 0x8b, 0xc1]));
    }

    #[test]
    fn test_parse_compact_form() {
        let pattern = Pattern::parse("488bc0").unwrap();
        assert_eq!(pattern.len(), 3);
        assert!(pattern.matches_at(&[0x48, 0x8b, 0xc0]));
    }

    #[test]
    fn test_byte_wildcard() {
        let pattern = Pattern::parse("aa ?? cc").unwrap();
        assert!(pattern.matches_at(&[0xaa, 0x00, 0xcc]));
        assert!(pattern.matches_at(&[0xaa, 0xff, 0xcc]));
        assert!(!pattern.matches_at(&[0xab, 0x00, 0xcc]));
    }

    #[test]
    fn test_nibble_wildcard() {
        let pattern = Pattern::parse("4?").unwrap();
        assert!(pattern.matches_at(&[0x40]));
        assert!(pattern.matches_at(&[0x4f]));
        assert!(!pattern.matches_at(&[0x50]));

        let pattern = Pattern::parse("?4").unwrap();
        assert!(pattern.matches_at(&[0x04]));
        assert!(pattern.matches_at(&[0xf4]));
        assert!(!pattern.matches_at(&[0x45]));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Pattern::parse("").is_err());
        assert!(Pattern::parse("4").is_err());
        assert!(Pattern::parse("zz").is_err());
    }

    #[test]
    fn test_find_in_multiple_matches() {
        let pattern = Pattern::parse("ab ??").unwrap();
        let data = [0xab, 0x01, 0xab, 0x02, 0x00, 0xab, 0x03];
        assert_eq!(pattern.find_in(&data), vec![0, 2, 5]);
    }

    #[test]
    fn test_find_in_overlapping() {
        let pattern = Pattern::parse("aa aa").unwrap();
        let data = [0xaa, 0xaa, 0xaa];
        assert_eq!(pattern.find_in(&data), vec![0, 1]);
    }

    #[test]
    fn test_find_in_short_buffer() {
        let pattern = Pattern::parse("aa bb cc").unwrap();
        assert!(pattern.find_in(&[0xaa, 0xbb]).is_empty());
    }

    #[test]
    fn test_from_bytes_exact() {
        let pattern = Pattern::from_bytes(&[0xde, 0xad]);
        assert!(pattern.matches_at(&[0xde, 0xad, 0x00]));
        assert!(!pattern.matches_at(&[0xde, 0xae]));
    }
}
