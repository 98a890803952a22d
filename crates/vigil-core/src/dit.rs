//! Capability traits the embedding dynamic-instrumentation toolkit provides.
//!
//! The agent never talks to the target process directly; every primitive —
//! memory access, symbol lookup, instruction decoding, interception, thread
//! inspection, event transport — arrives through these traits. A backend
//! implements the individual traits and gets [`Dit`] for free.

use std::any::Any;
use std::sync::Arc;
use vigil_common::{
    Address, AgentEvent, Arch, CpuContext, DebugSymbol, DecodedInstruction, ExportInfo,
    ImportInfo, MemoryRange, ModuleInfo, Protection, Result, ThreadInfo,
};

/// Process-level facts.
pub trait ProcessView: Send + Sync {
    fn pid(&self) -> u32;
    fn os(&self) -> String;
    fn arch(&self) -> Arch;
    fn pointer_size(&self) -> usize;
    fn page_size(&self) -> usize;
}

/// Raw memory access and protection control.
pub trait MemoryAccess: Send + Sync {
    /// Read `len` bytes at `addr`. Reads that touch unmapped memory fail.
    fn read(&self, addr: Address, len: usize) -> Result<Vec<u8>>;

    /// Write `data` at `addr`. The range's protection applies.
    fn write(&self, addr: Address, data: &[u8]) -> Result<()>;

    /// Enumerate ranges whose protection includes every flag of `min`
    /// (all mapped ranges when `min` is `None`).
    fn ranges(&self, min: Option<Protection>) -> Vec<MemoryRange>;

    /// The range containing `addr`, if any.
    fn range_containing(&self, addr: Address) -> Option<MemoryRange>;

    /// Change protection on `size` bytes starting at `addr`.
    fn protect(&self, addr: Address, size: u64, protection: Protection) -> Result<()>;
}

/// Module and symbol enumeration.
pub trait SymbolSource: Send + Sync {
    fn modules(&self) -> Vec<ModuleInfo>;
    fn exports(&self, module: &str) -> Result<Vec<ExportInfo>>;
    fn imports(&self, module: &str) -> Result<Vec<ImportInfo>>;
    fn symbols(&self, module: &str) -> Result<Vec<DebugSymbol>>;
    fn resolve_export(&self, module: &str, name: &str) -> Option<Address>;
    fn find_by_name(&self, name: &str) -> Option<DebugSymbol>;
    /// Always produces a record; fields other than `address` may be unknown.
    fn find_by_address(&self, addr: Address) -> DebugSymbol;
}

/// Instruction decoding at an address.
pub trait InstructionDecoder: Send + Sync {
    fn decode(&self, addr: Address) -> Result<DecodedInstruction>;
}

/// One intercepted call, as seen from inside a callback. Argument slots and
/// the return value are addresses by convention; interpretation is the
/// host's business.
pub trait Invocation {
    fn arg(&self, index: usize) -> Result<Address>;
    fn set_arg(&mut self, index: usize, value: Address) -> Result<()>;
    fn retval(&self) -> Result<Address>;
    fn set_retval(&mut self, value: Address) -> Result<()>;
    fn thread_id(&self) -> u64;
    /// Reentrancy counter maintained by the toolkit.
    fn depth(&self) -> u32;
    fn cpu_context(&self) -> Option<CpuContext>;
}

/// Opaque per-invocation state carried from entry to exit.
pub type Scratch = Box<dyn Any + Send>;

/// Callbacks synthesized by the hook manager. The toolkit serializes entry
/// into these from target threads; bodies must be short and must swallow
/// their own failures.
pub trait InvocationListener: Send + Sync {
    fn on_enter(&self, invocation: &mut dyn Invocation) -> Option<Scratch>;
    fn on_leave(&self, invocation: &mut dyn Invocation, scratch: Option<Scratch>);
}

/// A live interception. Detaching is one-shot: a detached listener cannot be
/// resumed, only replaced.
pub trait Listener: Send + Sync {
    fn detach(&self);
}

/// Function interception.
pub trait Interceptor: Send + Sync {
    fn attach(
        &self,
        target: Address,
        listener: Arc<dyn InvocationListener>,
    ) -> Result<Box<dyn Listener>>;
}

/// Thread enumeration and stack walking.
pub trait ThreadAccess: Send + Sync {
    fn threads(&self) -> Vec<ThreadInfo>;
    /// Walk the stack from `context`, or from the current thread when absent.
    fn backtrace(&self, context: Option<&CpuContext>) -> Vec<Address>;
}

/// A managed-runtime bridge (Java, Objective-C), present only when the
/// target hosts that runtime.
pub trait RuntimeInspector: Send + Sync {
    fn classes(&self) -> Vec<String>;
    fn methods(&self, class: &str) -> Vec<String>;
}

/// The combined capability surface.
pub trait Dit:
    ProcessView + MemoryAccess + SymbolSource + InstructionDecoder + Interceptor + ThreadAccess
{
    fn java_bridge(&self) -> Option<&dyn RuntimeInspector> {
        None
    }

    fn objc_bridge(&self) -> Option<&dyn RuntimeInspector> {
        None
    }
}

/// Host-bound event channel. `send` is fire-and-forget: events may be
/// buffered downstream and delivery is never awaited.
pub trait Transport: Send + Sync {
    fn send(&self, event: AgentEvent);
}
