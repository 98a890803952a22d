//! Shared data model for the agent core and RPC surface.

mod address;
mod event;
mod hook;
mod instruction;
mod memory;
mod module;
mod process;
mod scan;
mod thread;
mod value;

pub use address::Address;
pub use event::AgentEvent;
pub use hook::{HookConfig, HookId, HookListing, HookState};
pub use instruction::DecodedInstruction;
pub use memory::{MemoryRange, Protection};
pub use module::{DebugSymbol, ExportInfo, ExportKind, ImportInfo, ModuleInfo};
pub use process::{Arch, ProcessInfo};
pub use scan::{Comparison, RangeSpec, ScanHit};
pub use thread::{CpuContext, FrameRecord, ThreadInfo, ThreadState};
pub use value::{encode_value, ScalarValue, ValueType};
