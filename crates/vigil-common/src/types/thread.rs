//! Thread and call-stack records.

use super::address::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadState {
    Running,
    Stopped,
    Waiting,
    Halted,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadInfo {
    pub id: u64,
    pub state: ThreadState,
    #[serde(skip)]
    pub context: Option<CpuContext>,
}

/// A register-state snapshot captured at an instrumentation point. Register
/// names are architecture-specific; values travel as hex strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CpuContext {
    pub registers: BTreeMap<String, Address>,
}

impl CpuContext {
    pub fn register(&self, name: &str) -> Option<Address> {
        self.registers.get(name).copied()
    }

    pub fn stack_pointer(&self) -> Option<Address> {
        ["rsp", "esp", "sp"]
            .iter()
            .find_map(|name| self.register(name))
    }

    pub fn program_counter(&self) -> Option<Address> {
        ["rip", "eip", "pc"]
            .iter()
            .find_map(|name| self.register(name))
    }
}

/// One symbolicated frame of a call stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameRecord {
    pub address: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_register_lookup() {
        let mut registers = BTreeMap::new();
        registers.insert("rsp".to_string(), Address::new(0x7fff_0000));
        registers.insert("rip".to_string(), Address::new(0x40_1000));
        let ctx = CpuContext { registers };
        assert_eq!(ctx.stack_pointer(), Some(Address::new(0x7fff_0000)));
        assert_eq!(ctx.program_counter(), Some(Address::new(0x40_1000)));
        assert_eq!(ctx.register("rbx"), None);
    }

    #[test]
    fn test_context_serializes_flat() {
        let mut registers = BTreeMap::new();
        registers.insert("sp".to_string(), Address::new(0x1000));
        let json = serde_json::to_value(&CpuContext { registers }).unwrap();
        assert_eq!(json["sp"], "0x1000");
    }

    #[test]
    fn test_thread_info_omits_context() {
        let info = ThreadInfo {
            id: 42,
            state: ThreadState::Running,
            context: Some(CpuContext::default()),
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["state"], "running");
        assert!(json.get("context").is_none());
    }

    #[test]
    fn test_frame_skips_unknowns() {
        let frame = FrameRecord {
            address: Address::new(0x1000),
            module: None,
            symbol: None,
            offset: None,
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert!(json.get("module").is_none());
        assert!(json.get("symbol").is_none());
    }
}
