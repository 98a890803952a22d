//! Vigil Agent
//!
//! The remote-procedure surface of the agent. An [`Agent`] owns the hook
//! table and the scan session and dispatches host calls by name. Handlers
//! are total: queries fault to `null` or an empty array, mutations to a
//! `{success: false, error}` envelope — exceptions never cross the RPC
//! boundary.
//!
//! The agent is strictly reactive. State is only ever touched from the
//! toolkit's event loop, so plain mutexes around the hook table and scan
//! session are uncontended bookkeeping, not a concurrency scheme.

mod dispatch;

use parking_lot::Mutex;
use std::sync::Arc;
use vigil_core::hooks::HookManager;
use vigil_core::scanner::ScanEngine;
use vigil_core::{Dit, Transport};

pub use vigil_common::{Error, LogConfig, Result};

pub struct Agent {
    dit: Arc<dyn Dit>,
    transport: Arc<dyn Transport>,
    hooks: Mutex<HookManager>,
    scan: Mutex<ScanEngine>,
}

impl Agent {
    pub fn new(dit: Arc<dyn Dit>, transport: Arc<dyn Transport>) -> Self {
        Self {
            dit,
            transport,
            hooks: Mutex::new(HookManager::new()),
            scan: Mutex::new(ScanEngine::new()),
        }
    }
}
