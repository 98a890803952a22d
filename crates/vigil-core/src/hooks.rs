//! Hook lifecycle management.
//!
//! The hook table owns every interception installed by the host. Listener
//! objects are one-shot: once detached they cannot be resumed, so enabling a
//! disabled hook creates a successor entry under a fresh id. Ids come from a
//! monotonic counter and are never recycled within one injection; only
//! `clear_all` resets the counter.

use crate::dit::{Dit, Invocation, InvocationListener, Listener, Scratch, Transport};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use vigil_common::{
    Address, AgentEvent, Error, FrameRecord, HookConfig, HookId, HookListing, HookState, Result,
};

/// Outcome of an attach.
#[derive(Debug, Clone)]
pub struct AttachOutcome {
    pub id: HookId,
    pub address: Address,
}

/// Outcome of an enable.
#[derive(Debug, Clone)]
pub enum EnableOutcome {
    AlreadyEnabled,
    /// The hook was recreated under a fresh id; the old record is gone.
    Recreated { new_id: HookId },
}

/// Outcome of a disable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisableOutcome {
    Disabled,
    AlreadyDisabled,
}

struct HookEntry {
    target: Address,
    config: HookConfig,
    state: HookState,
    listener: Option<Box<dyn Listener>>,
}

#[derive(Default)]
pub struct HookManager {
    table: BTreeMap<u32, HookEntry>,
    next_id: u32,
}

impl HookManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install an interception at `target`. The address must fall inside an
    /// executable range.
    pub fn attach(
        &mut self,
        dit: &Arc<dyn Dit>,
        transport: &Arc<dyn Transport>,
        target: Address,
        config: HookConfig,
    ) -> Result<AttachOutcome> {
        let executable = dit
            .range_containing(target)
            .map(|range| range.protection.execute)
            .unwrap_or(false);
        if !executable {
            return Err(Error::Hook("Invalid or non-executable address".to_string()));
        }

        let id = HookId(self.next_id);
        let listener = Arc::new(HookListener {
            id,
            target,
            config: config.clone(),
            dit: Arc::clone(dit),
            transport: Arc::clone(transport),
        });
        let handle = dit.attach(target, listener)?;
        self.next_id += 1;

        self.table.insert(
            id.0,
            HookEntry {
                target,
                config,
                state: HookState::Enabled,
                listener: Some(handle),
            },
        );

        info!(target: "vigil_core::hooks",
            hook_id = %id,
            address = %target,
            "Hook attached");

        Ok(AttachOutcome {
            id,
            address: target,
        })
    }

    /// Detach the listener but keep the record. Idempotent.
    pub fn disable(&mut self, id: HookId) -> Result<DisableOutcome> {
        let entry = self
            .table
            .get_mut(&id.0)
            .ok_or_else(|| Error::Hook("Hook not found".to_string()))?;

        if entry.state == HookState::Disabled {
            return Ok(DisableOutcome::AlreadyDisabled);
        }
        if let Some(listener) = entry.listener.take() {
            listener.detach();
        }
        entry.state = HookState::Disabled;
        info!(target: "vigil_core::hooks", hook_id = %id, "Hook disabled");
        Ok(DisableOutcome::Disabled)
    }

    /// Re-arm a disabled hook. The detached listener cannot be resumed, so
    /// the stored config is re-attached as a successor hook and the old
    /// record is removed.
    pub fn enable(
        &mut self,
        dit: &Arc<dyn Dit>,
        transport: &Arc<dyn Transport>,
        id: HookId,
    ) -> Result<EnableOutcome> {
        let entry = self
            .table
            .get(&id.0)
            .ok_or_else(|| Error::Hook("Hook not found".to_string()))?;

        if entry.state == HookState::Enabled {
            return Ok(EnableOutcome::AlreadyEnabled);
        }

        let target = entry.target;
        let config = entry.config.clone();
        let outcome = self.attach(dit, transport, target, config)?;
        self.table.remove(&id.0);

        debug!(target: "vigil_core::hooks",
            old_id = %id,
            new_id = %outcome.id,
            "Hook recreated");

        Ok(EnableOutcome::Recreated { new_id: outcome.id })
    }

    /// Detach and remove the record.
    pub fn detach(&mut self, id: HookId) -> Result<()> {
        let entry = self
            .table
            .remove(&id.0)
            .ok_or_else(|| Error::Hook("Hook not found".to_string()))?;
        if let Some(listener) = entry.listener {
            listener.detach();
        }
        info!(target: "vigil_core::hooks", hook_id = %id, "Hook detached");
        Ok(())
    }

    /// Detach everything, drop the table and reset the id counter.
    pub fn clear_all(&mut self) -> usize {
        let count = self.table.len();
        for (_, entry) in std::mem::take(&mut self.table) {
            if let Some(listener) = entry.listener {
                listener.detach();
            }
        }
        self.next_id = 0;
        info!(target: "vigil_core::hooks", count, "All hooks cleared");
        count
    }

    pub fn list(&self) -> Vec<HookListing> {
        self.table
            .iter()
            .map(|(&id, entry)| HookListing {
                id: HookId(id),
                target: entry.target,
                enabled: entry.state == HookState::Enabled,
                config: entry.config.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// The callback pair synthesized from a hook's config. Runs on arbitrary
/// target threads; must stay short and swallow its own failures.
struct HookListener {
    id: HookId,
    target: Address,
    config: HookConfig,
    dit: Arc<dyn Dit>,
    transport: Arc<dyn Transport>,
}

impl HookListener {
    /// Sample exactly `arg_count` slots; a faulting slot yields the literal
    /// `"(error)"` so the array length stays fixed.
    fn sample_args(&self, invocation: &dyn Invocation) -> Vec<String> {
        (0..self.config.arg_count)
            .map(|index| {
                invocation
                    .arg(index)
                    .map(|value| value.to_string())
                    .unwrap_or_else(|_| "(error)".to_string())
            })
            .collect()
    }

    fn capture_backtrace(&self, invocation: &dyn Invocation) -> Vec<FrameRecord> {
        let context = invocation.cpu_context();
        self.dit
            .backtrace(context.as_ref())
            .into_iter()
            .map(|address| {
                let symbol = self.dit.find_by_address(address);
                let offset = symbol
                    .name
                    .is_some()
                    .then(|| address.offset_from(symbol.address))
                    .flatten();
                FrameRecord {
                    address,
                    module: symbol.module_name,
                    symbol: symbol.name,
                    offset,
                }
            })
            .collect()
    }
}

impl InvocationListener for HookListener {
    fn on_enter(&self, invocation: &mut dyn Invocation) -> Option<Scratch> {
        let args = self
            .config
            .log_args
            .then(|| self.sample_args(invocation));

        if self.config.on_enter {
            let backtrace = self
                .config
                .backtrace
                .then(|| self.capture_backtrace(invocation));
            self.transport.send(AgentEvent::HookEnter {
                id: self.id,
                address: self.target,
                thread_id: invocation.thread_id(),
                depth: invocation.depth(),
                args: args.clone(),
                backtrace,
            });
        }

        if let Some(rewrites) = &self.config.modify_args {
            for (index, slot) in rewrites.iter().enumerate() {
                if let Some(value) = slot {
                    // A failed slot must not corrupt the call or stop the
                    // remaining rewrites.
                    if let Err(e) = invocation.set_arg(index, *value) {
                        warn!(target: "vigil_core::hooks",
                            hook_id = %self.id,
                            index,
                            error = %e,
                            "Argument rewrite failed");
                    }
                }
            }
        }

        args.map(|captured| Box::new(captured) as Scratch)
    }

    fn on_leave(&self, invocation: &mut dyn Invocation, scratch: Option<Scratch>) {
        if self.config.on_leave {
            let retval = self.config.log_retval.then(|| {
                invocation
                    .retval()
                    .map(|value| value.to_string())
                    .unwrap_or_else(|_| "(error)".to_string())
            });
            let args = scratch
                .and_then(|captured| captured.downcast::<Vec<String>>().ok())
                .map(|captured| *captured);
            self.transport.send(AgentEvent::HookLeave {
                id: self.id,
                address: self.target,
                thread_id: invocation.thread_id(),
                retval,
                args,
            });
        }

        if let Some(value) = self.config.modify_retval {
            if let Err(e) = invocation.set_retval(value) {
                warn!(target: "vigil_core::hooks",
                    hook_id = %self.id,
                    error = %e,
                    "Return value rewrite failed");
            }
        }
    }
}
