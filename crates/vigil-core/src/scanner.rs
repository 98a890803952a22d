//! Progressive memory scanner.
//!
//! Two-phase engine: an initial pattern or typed-value scan collects
//! candidates, then refinements re-read live memory at each candidate and
//! shrink the set. One scan session per agent; the result set and snapshot
//! are replaced wholesale, never merged.

use crate::dit::MemoryAccess;
use crate::pattern::Pattern;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};
use vigil_common::{
    encode_value, Address, Comparison, Error, MemoryRange, Protection, RangeSpec, Result,
    ScalarValue, ScanHit, ValueType,
};

/// Response-size guard: `results` arrays are truncated to this many entries
/// while `count` reports the true set size. Paging reads the full set.
pub const RESPONSE_CAP: usize = 1000;

/// Ranges are read in chunks of this size, with pattern-length overlap.
const SCAN_CHUNK: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub count: usize,
    pub results: Vec<ScanHit>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefinedHit {
    #[serde(flatten)]
    pub hit: ScanHit,
    #[serde(rename = "currentValue")]
    pub current_value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefineSummary {
    pub count: usize,
    pub results: Vec<RefinedHit>,
}

/// One page of live re-read values. `value` is the literal `"(unreadable)"`
/// when the address no longer reads.
#[derive(Debug, Clone, Serialize)]
pub struct ScanValueEntry {
    pub address: Address,
    pub value: String,
}

#[derive(Default)]
pub struct ScanEngine {
    results: Vec<ScanHit>,
    snapshot: HashMap<u64, ScalarValue>,
}

impl ScanEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.results.len()
    }

    fn summary(&self) -> ScanSummary {
        ScanSummary {
            count: self.results.len(),
            results: self.results.iter().take(RESPONSE_CAP).cloned().collect(),
        }
    }

    /// Initial pattern scan. Replaces any prior result set. Ranges that
    /// fault are skipped silently; partial results are the point.
    pub fn scan_pattern(
        &mut self,
        mem: &dyn MemoryAccess,
        pattern: &Pattern,
        pattern_text: &str,
        spec: &RangeSpec,
    ) -> ScanSummary {
        let ranges: Vec<MemoryRange> = match spec {
            RangeSpec::Protection(min) => mem.ranges(Some(*min)),
            RangeSpec::Region { base, size } => vec![MemoryRange {
                base: *base,
                size: *size,
                protection: Protection::read_only(),
                file: None,
            }],
        };

        let mut hits = Vec::new();
        for range in &ranges {
            scan_range(mem, pattern, pattern_text, range, &mut hits);
        }

        info!(target: "vigil_core::scanner",
            ranges = ranges.len(),
            hits = hits.len(),
            "Initial scan complete");

        self.results = hits;
        self.summary()
    }

    /// Initial typed-value scan: the value is materialized to the bytes the
    /// target would hold and scanned as an exact pattern.
    pub fn scan_value(
        &mut self,
        mem: &dyn MemoryAccess,
        ty: ValueType,
        text: &str,
        spec: &RangeSpec,
        pointer_size: usize,
    ) -> Result<ScanSummary> {
        let bytes = encode_value(ty, text, pointer_size)?;
        if bytes.is_empty() {
            return Err(Error::Scan("Empty scan value".to_string()));
        }
        let pattern = Pattern::from_bytes(&bytes);
        Ok(self.scan_pattern(mem, &pattern, &hex::encode(&bytes), spec))
    }

    /// Retype every candidate as `ty`, compare against `text`, and keep the
    /// matches. Unreadable addresses are dropped.
    pub fn refine_next(
        &mut self,
        mem: &dyn MemoryAccess,
        ty: ValueType,
        text: &str,
        comparison: Comparison,
        pointer_size: usize,
    ) -> Result<RefineSummary> {
        let target_bytes = encode_value(ty, text, pointer_size)?;
        let target = ScalarValue::decode(ty, &target_bytes, pointer_size)
            .ok_or_else(|| Error::Scan("Empty scan value".to_string()))?;

        let before = self.results.len();
        let mut kept = Vec::new();
        let mut refined = Vec::new();

        for hit in std::mem::take(&mut self.results) {
            let width = ty.fixed_size(pointer_size).unwrap_or(target_bytes.len());
            let Ok(data) = mem.read(hit.address, width) else {
                continue;
            };
            let Some(current) = ScalarValue::decode(ty, &data, pointer_size) else {
                continue;
            };
            if current.matches(&target, comparison) {
                if refined.len() < RESPONSE_CAP {
                    refined.push(RefinedHit {
                        hit: hit.clone(),
                        current_value: current.to_string(),
                    });
                }
                kept.push(hit);
            }
        }

        debug!(target: "vigil_core::scanner",
            before,
            after = kept.len(),
            comparison = %comparison,
            "Refined scan results");

        self.results = kept;
        Ok(RefineSummary {
            count: self.results.len(),
            results: refined,
        })
    }

    /// Record the current typed value at every candidate as the snapshot
    /// baseline. Replaces any prior snapshot; generations do not chain.
    pub fn take_snapshot(
        &mut self,
        mem: &dyn MemoryAccess,
        ty: ValueType,
        pointer_size: usize,
    ) -> usize {
        self.snapshot.clear();
        for hit in &self.results {
            let width = ty.fixed_size(pointer_size).unwrap_or(hit.size);
            if let Ok(data) = mem.read(hit.address, width) {
                if let Some(value) = ScalarValue::decode(ty, &data, pointer_size) {
                    self.snapshot.insert(hit.address.as_u64(), value);
                }
            }
        }
        info!(target: "vigil_core::scanner",
            addresses = self.snapshot.len(),
            "Snapshot taken");
        self.snapshot.len()
    }

    /// Keep candidates whose live value differs from the snapshot baseline
    /// (`keep_changed`) or equals it. Candidates with no snapshot entry or
    /// that no longer read are dropped either way.
    pub fn retain_by_snapshot(
        &mut self,
        mem: &dyn MemoryAccess,
        ty: ValueType,
        pointer_size: usize,
        keep_changed: bool,
    ) -> ScanSummary {
        let mut kept = Vec::new();
        for hit in std::mem::take(&mut self.results) {
            let Some(original) = self.snapshot.get(&hit.address.as_u64()) else {
                continue;
            };
            let width = ty.fixed_size(pointer_size).unwrap_or(hit.size);
            let Ok(data) = mem.read(hit.address, width) else {
                continue;
            };
            let Some(current) = ScalarValue::decode(ty, &data, pointer_size) else {
                continue;
            };
            let changed = !current.matches(original, Comparison::Eq);
            if changed == keep_changed {
                kept.push(hit);
            }
        }
        self.results = kept;
        self.summary()
    }

    /// Page the current result set.
    pub fn page(&self, offset: usize, limit: usize) -> Vec<ScanHit> {
        self.results
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Page with a live typed re-read at each address.
    pub fn page_values(
        &self,
        mem: &dyn MemoryAccess,
        ty: ValueType,
        offset: usize,
        limit: usize,
        pointer_size: usize,
    ) -> Vec<ScanValueEntry> {
        self.results
            .iter()
            .skip(offset)
            .take(limit)
            .map(|hit| {
                let width = ty.fixed_size(pointer_size).unwrap_or(hit.size);
                let value = mem
                    .read(hit.address, width)
                    .ok()
                    .and_then(|data| ScalarValue::decode(ty, &data, pointer_size))
                    .map(|value| value.to_string())
                    .unwrap_or_else(|| "(unreadable)".to_string());
                ScanValueEntry {
                    address: hit.address,
                    value,
                }
            })
            .collect()
    }

    /// Drop results and snapshot.
    pub fn clear(&mut self) {
        self.results.clear();
        self.snapshot.clear();
    }
}

fn scan_range(
    mem: &dyn MemoryAccess,
    pattern: &Pattern,
    pattern_text: &str,
    range: &MemoryRange,
    hits: &mut Vec<ScanHit>,
) {
    if pattern.is_empty() {
        return;
    }
    let overlap = (pattern.len() - 1) as u64;
    let mut offset = 0u64;

    while offset < range.size {
        let chunk = (SCAN_CHUNK as u64).min(range.size - offset);
        let read_len = (chunk + overlap).min(range.size - offset) as usize;

        if let Ok(data) = mem.read(range.base.wrapping_add(offset), read_len) {
            for position in pattern.find_in(&data) {
                // Matches inside the overlap belong to the next chunk.
                if (position as u64) < chunk {
                    hits.push(ScanHit {
                        address: range.base.wrapping_add(offset + position as u64),
                        size: pattern.len(),
                        pattern: Some(pattern_text.to_string()),
                    });
                }
            }
        }

        offset += chunk;
    }
}
