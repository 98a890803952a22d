//! Module, export/import and symbol records.

use super::address::Address;
use serde::{Deserialize, Serialize};

/// A loaded code object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub name: String,
    pub base: Address,
    pub size: u64,
    pub path: String,
}

impl ModuleInfo {
    pub fn end(&self) -> Address {
        self.base.wrapping_add(self.size)
    }

    pub fn contains(&self, addr: Address) -> bool {
        addr >= self.base && addr.as_u64() < self.base.as_u64().saturating_add(self.size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    Function,
    Variable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportInfo {
    pub name: String,
    pub address: Address,
    #[serde(rename = "type")]
    pub kind: ExportKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportInfo {
    pub name: String,
    pub module: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<Address>,
}

/// A debug-symbol record. Lookups by address always produce a record; every
/// field other than `address` may be unknown.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugSymbol {
    pub name: Option<String>,
    pub address: Address,
    pub module_name: Option<String>,
    pub file_name: Option<String>,
    pub line_number: Option<u32>,
}
