//! Hook identifiers, configuration and state.

use super::address::Address;
use crate::error::{Error, Result};
use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Unique identifier for a hook, `hook_<N>` on the wire. Ids are allocated
/// from a monotonic counter and never recycled within one injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HookId(pub u32);

impl HookId {
    pub fn parse(text: &str) -> Result<HookId> {
        text.strip_prefix("hook_")
            .and_then(|n| n.parse::<u32>().ok())
            .map(HookId)
            .ok_or_else(|| Error::Hook(format!("Invalid hook id: '{}'", text)))
    }
}

impl fmt::Display for HookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hook_{}", self.0)
    }
}

impl Serialize for HookId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HookId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        HookId::parse(&text).map_err(de::Error::custom)
    }
}

/// Per-hook behavior, immutable after attach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HookConfig {
    /// Emit an event on each function entry.
    pub on_enter: bool,
    /// Emit an event on each return.
    pub on_leave: bool,
    /// Include the first `arg_count` arguments as strings.
    pub log_args: bool,
    /// Include the return value as a string.
    pub log_retval: bool,
    /// Number of argument slots to sample.
    pub arg_count: usize,
    /// Non-null entries overwrite the corresponding argument slot.
    pub modify_args: Option<Vec<Option<Address>>>,
    /// Replace the return value with this address.
    pub modify_retval: Option<Address>,
    /// Attach a symbolicated call stack to the enter event.
    pub backtrace: bool,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            on_enter: true,
            on_leave: false,
            log_args: false,
            log_retval: false,
            arg_count: 4,
            modify_args: None,
            modify_retval: None,
            backtrace: false,
        }
    }
}

/// Hook lifecycle state. A disabled hook cannot be resumed in place: the
/// underlying listener is one-shot, so enabling creates a successor hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookState {
    Enabled,
    Disabled,
    Detached,
}

/// A hook table entry as reported to the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookListing {
    pub id: HookId,
    pub target: Address,
    pub enabled: bool,
    pub config: HookConfig,
}
