//! Thread inspection: stacks and backtraces.

use crate::dit::{MemoryAccess, ProcessView, SymbolSource, ThreadAccess};
use serde::Serialize;
use vigil_common::{Address, CpuContext, FrameRecord, ScalarValue, ValueType};

/// One stack slot: the slot's own address plus its pointer-sized content,
/// symbolicated when the content lands in a known symbol.
#[derive(Debug, Clone, Serialize)]
pub struct StackSlot {
    pub offset: u64,
    pub address: Address,
    pub value: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

/// Read `depth` pointer-sized slots upward from `sp`, stopping at the first
/// fault.
pub fn read_stack(
    mem: &dyn MemoryAccess,
    sym: &dyn SymbolSource,
    view: &dyn ProcessView,
    sp: Address,
    depth: usize,
) -> Vec<StackSlot> {
    let pointer_size = view.pointer_size();
    let mut slots = Vec::new();

    for index in 0..depth {
        let offset = (index * pointer_size) as u64;
        let Some(slot) = sp.checked_add(offset) else {
            break;
        };
        let Ok(data) = mem.read(slot, pointer_size) else {
            break;
        };
        let Some(ScalarValue::Unsigned(raw)) =
            ScalarValue::decode(ValueType::Pointer, &data, pointer_size)
        else {
            break;
        };

        let value = Address::new(raw);
        let symbol = sym.find_by_address(value);
        slots.push(StackSlot {
            offset,
            address: slot,
            value,
            module: symbol.module_name,
            symbol: symbol.name,
        });
    }

    slots
}

/// Walk and symbolicate a call stack. `context` selects the starting point;
/// absent, the toolkit uses the calling thread.
pub fn backtrace_frames(
    threads: &dyn ThreadAccess,
    sym: &dyn SymbolSource,
    context: Option<&CpuContext>,
) -> Vec<FrameRecord> {
    threads
        .backtrace(context)
        .into_iter()
        .map(|address| {
            let symbol = sym.find_by_address(address);
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
