//! Disassembly walker.
//!
//! Linear sweeps over the DIT decoder's fall-through pointer. Branches are
//! never followed; the function walk is a linear-sweep approximation bounded
//! by a return-class instruction or a revisited address.

use crate::dit::{InstructionDecoder, MemoryAccess};
use std::collections::HashSet;
use tracing::trace;
use vigil_common::{Address, Arch, DecodedInstruction};

/// Default instruction count for a plain sweep.
pub const DEFAULT_DISASM_COUNT: usize = 20;

/// Upper bound on a function walk.
pub const MAX_FUNCTION_INSTRUCTIONS: usize = 500;

/// Decode one instruction, capturing its raw bytes best-effort: a failed
/// byte read leaves `bytes` empty but still emits the instruction.
pub fn instruction_at(
    decoder: &dyn InstructionDecoder,
    mem: &dyn MemoryAccess,
    addr: Address,
) -> Option<DecodedInstruction> {
    let mut instruction = decoder.decode(addr).ok()?;
    if instruction.bytes.is_empty() {
        instruction.bytes = mem.read(addr, instruction.size).unwrap_or_default();
    }
    Some(instruction)
}

/// Decode up to `count` instructions in a linear sweep, stopping early on
/// any decode failure.
pub fn disassemble(
    decoder: &dyn InstructionDecoder,
    mem: &dyn MemoryAccess,
    addr: Address,
    count: usize,
) -> Vec<DecodedInstruction> {
    let mut instructions = Vec::new();
    let mut cursor = addr;

    while instructions.len() < count {
        let Some(instruction) = instruction_at(decoder, mem, cursor) else {
            break;
        };
        let next = instruction.next;
        instructions.push(instruction);
        match next {
            Some(next) if next != cursor => cursor = next,
            _ => break,
        }
    }

    instructions
}

/// Linear sweep bounded by function-end heuristics: a return-class
/// instruction for the architecture, a revisited address, or `max`
/// instructions.
pub fn disassemble_function(
    decoder: &dyn InstructionDecoder,
    mem: &dyn MemoryAccess,
    arch: Arch,
    addr: Address,
    max: usize,
) -> Vec<DecodedInstruction> {
    let mut instructions = Vec::new();
    let mut visited = HashSet::new();
    let mut cursor = addr;

    while instructions.len() < max {
        if !visited.insert(cursor.as_u64()) {
            trace!(target: "vigil_core::disasm",
                address = %cursor,
                "Walk revisited an address, stopping");
            break;
        }
        let Some(instruction) = instruction_at(decoder, mem, cursor) else {
            break;
        };
        let is_return = instruction.is_return(arch);
        let next = instruction.next;
        instructions.push(instruction);
        if is_return {
            break;
        }
        match next {
            Some(next) => cursor = next,
            None => break,
        }
    }

    instructions
}
