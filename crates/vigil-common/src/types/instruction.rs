//! Decoded instruction records.

use super::address::Address;
use super::process::Arch;
use serde::{Deserialize, Serialize};

/// One decoded instruction, as produced by the DIT's decoder plus the raw
/// bytes captured by the walker (empty when the bytes could not be read).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedInstruction {
    pub address: Address,
    /// Architectural fall-through address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<Address>,
    pub size: usize,
    pub mnemonic: String,
    pub op_str: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub regs_read: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub regs_written: Vec<String>,
    #[serde(default)]
    pub bytes: Vec<u8>,
}

impl DecodedInstruction {
    /// Whether this instruction ends a function walk on the given
    /// architecture. On ARM only `bx lr` counts; `pop {..., pc}` does not.
    pub fn is_return(&self, arch: Arch) -> bool {
        match arch {
            Arch::X64 | Arch::Ia32 => {
                matches!(self.mnemonic.as_str(), "ret" | "retq" | "retn")
            }
            Arch::Arm => self.mnemonic == "bx" && self.op_str.trim() == "lr",
            Arch::Arm64 => self.mnemonic == "ret",
        }
    }
}
