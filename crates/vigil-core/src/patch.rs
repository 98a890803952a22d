//! Safe code patching.
//!
//! Writes to protected memory go through a scoped writable window: the
//! minimal elevated mask (the original flags plus `w`, never `rwx` unless
//! the range was already executable) is applied for exactly the patched
//! span and restored when the window drops, on error paths included.

use crate::dit::{InstructionDecoder, MemoryAccess};
use serde::Serialize;
use tracing::{debug, info};
use vigil_common::{Address, Arch, Error, Protection, Result};

#[derive(Debug, Clone, Serialize)]
pub struct PatchOutcome {
    pub address: Address,
    pub original: Vec<u8>,
    pub patched: Vec<u8>,
}

/// Scoped protection elevation. Restores the original mask on drop.
struct WritableWindow<'a> {
    mem: &'a dyn MemoryAccess,
    addr: Address,
    size: u64,
    restore: Option<Protection>,
}

impl<'a> WritableWindow<'a> {
    fn open(mem: &'a dyn MemoryAccess, addr: Address, size: u64) -> Result<Self> {
        let range = mem
            .range_containing(addr)
            .ok_or(Error::RangeNotFound(addr.as_u64()))?;
        if range.protection.write {
            return Ok(Self {
                mem,
                addr,
                size,
                restore: None,
            });
        }

        let elevated = range.protection.with_write();
        mem.protect(addr, size, elevated)?;
        debug!(target: "vigil_core::patch",
            address = %addr,
            size,
            from = %range.protection,
            to = %elevated,
            "Opened writable window");
        Ok(Self {
            mem,
            addr,
            size,
            restore: Some(range.protection),
        })
    }
}

impl Drop for WritableWindow<'_> {
    fn drop(&mut self) {
        if let Some(original) = self.restore {
            if self.mem.protect(self.addr, self.size, original).is_err() {
                tracing::warn!(target: "vigil_core::patch",
                    address = %self.addr,
                    "Failed to restore protection");
            }
        }
    }
}

/// Overwrite `bytes.len()` bytes at `addr`, stashing the originals.
pub fn patch_bytes(mem: &dyn MemoryAccess, addr: Address, bytes: &[u8]) -> Result<PatchOutcome> {
    if bytes.is_empty() {
        return Err(Error::Patch("No bytes to write".to_string()));
    }
    mem.range_containing(addr)
        .ok_or(Error::RangeNotFound(addr.as_u64()))?;

    let original = mem.read(addr, bytes.len())?;
    {
        let _window = WritableWindow::open(mem, addr, bytes.len() as u64)?;
        mem.write(addr, bytes)?;
    }

    info!(target: "vigil_core::patch",
        address = %addr,
        size = bytes.len(),
        "Patched bytes");

    Ok(PatchOutcome {
        address: addr,
        original,
        patched: bytes.to_vec(),
    })
}

/// The single-instruction NOP encoding for `arch`, in memory order.
fn nop_unit(arch: Arch) -> &'static [u8] {
    match arch {
        Arch::X64 | Arch::Ia32 => &[0x90],
        Arch::Arm => &[0x00, 0xf0, 0x20, 0xe3],
        Arch::Arm64 => &[0x1f, 0x20, 0x03, 0xd5],
    }
}

/// Replace `count` consecutive instructions at `addr` with a NOP sled of
/// exactly the same total size.
pub fn nop_instructions(
    decoder: &dyn InstructionDecoder,
    mem: &dyn MemoryAccess,
    arch: Arch,
    addr: Address,
    count: usize,
) -> Result<PatchOutcome> {
    if count == 0 {
        return Err(Error::Patch("Instruction count must be positive".to_string()));
    }

    let mut total = 0usize;
    let mut cursor = addr;
    for _ in 0..count {
        let instruction = decoder
            .decode(cursor)
            .map_err(|_| Error::Patch(format!("Failed to decode instruction at {}", cursor)))?;
        total += instruction.size;
        cursor = instruction
            .next
            .unwrap_or_else(|| cursor.wrapping_add(instruction.size as u64));
    }

    let unit = nop_unit(arch);
    if total % unit.len() != 0 {
        return Err(Error::Patch(format!(
            "Cannot fill {} bytes with {}-byte NOPs",
            total,
            unit.len()
        )));
    }

    let sled: Vec<u8> = unit.iter().copied().cycle().take(total).collect();
    patch_bytes(mem, addr, &sled)
}

/// Put previously stashed bytes back.
pub fn restore_bytes(
    mem: &dyn MemoryAccess,
    addr: Address,
    original: &[u8],
) -> Result<PatchOutcome> {
    patch_bytes(mem, addr, original)
}
