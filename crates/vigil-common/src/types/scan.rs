//! Scanner wire types.

use super::address::Address;
use super::memory::Protection;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One scanner match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanHit {
    pub address: Address,
    pub size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// Refinement comparator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl Comparison {
    pub fn parse(text: &str) -> Result<Comparison> {
        match text {
            "eq" => Ok(Comparison::Eq),
            "ne" => Ok(Comparison::Ne),
            "gt" => Ok(Comparison::Gt),
            "lt" => Ok(Comparison::Lt),
            "ge" => Ok(Comparison::Ge),
            "le" => Ok(Comparison::Le),
            other => Err(Error::Scan(format!("Invalid comparison: '{}'", other))),
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Comparison::Eq => "eq",
            Comparison::Ne => "ne",
            Comparison::Gt => "gt",
            Comparison::Lt => "lt",
            Comparison::Ge => "ge",
            Comparison::Le => "le",
        })
    }
}

/// Where an initial scan looks: every range matching a minimum protection
/// mask, or one explicit region.
#[derive(Debug, Clone)]
pub enum RangeSpec {
    Protection(Protection),
    Region { base: Address, size: u64 },
}

impl Default for RangeSpec {
    fn default() -> Self {
        RangeSpec::Protection(Protection::read_only())
    }
}
