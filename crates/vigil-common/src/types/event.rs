//! Asynchronous host-bound events.

use super::address::Address;
use super::hook::HookId;
use super::thread::FrameRecord;
use serde::{Deserialize, Serialize};

/// An event pushed to the host through the transport's `send` primitive.
/// Delivery is best-effort and never awaited.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    #[serde(rename_all = "camelCase")]
    HookEnter {
        id: HookId,
        address: Address,
        thread_id: u64,
        depth: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        args: Option<Vec<String>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        backtrace: Option<Vec<FrameRecord>>,
    },
    #[serde(rename_all = "camelCase")]
    HookLeave {
        id: HookId,
        address: Address,
        thread_id: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        retval: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        args: Option<Vec<String>>,
    },
}
