//! In-memory `MemoryAccess` fake shared by the engine unit tests.

use crate::dit::MemoryAccess;
use parking_lot::Mutex;
use vigil_common::{Address, Error, MemoryRange, Protection, Result};

struct Region {
    base: u64,
    data: Vec<u8>,
    protection: Protection,
}

pub(crate) struct BufferMemory {
    regions: Mutex<Vec<Region>>,
    protect_log: Mutex<Vec<Protection>>,
}

impl BufferMemory {
    /// One `rw-` region at `base`.
    pub fn new(base: u64, data: Vec<u8>) -> Self {
        Self::empty().with_region(base, data, "rw-")
    }

    pub fn empty() -> Self {
        Self {
            regions: Mutex::new(Vec::new()),
            protect_log: Mutex::new(Vec::new()),
        }
    }

    /// Every protection mask applied through `protect`, in order.
    pub fn protect_history(&self) -> Vec<Protection> {
        self.protect_log.lock().clone()
    }

    pub fn with_region(self, base: u64, data: Vec<u8>, protection: &str) -> Self {
        self.regions.lock().push(Region {
            base,
            data,
            protection: Protection::parse(protection).unwrap(),
        });
        self
    }

    pub fn poke(&self, addr: u64, bytes: &[u8]) {
        let mut regions = self.regions.lock();
        let region = regions
            .iter_mut()
            .find(|r| addr >= r.base && addr < r.base + r.data.len() as u64)
            .expect("poke outside mapped regions");
        let offset = (addr - region.base) as usize;
        region.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    pub fn protection_at(&self, addr: u64) -> Option<Protection> {
        self.regions
            .lock()
            .iter()
            .find(|r| addr >= r.base && addr < r.base + r.data.len() as u64)
            .map(|r| r.protection)
    }
}

impl MemoryAccess for BufferMemory {
    fn read(&self, addr: Address, len: usize) -> Result<Vec<u8>> {
        let regions = self.regions.lock();
        let region = regions
            .iter()
            .find(|r| {
                r.protection.read
                    && addr.as_u64() >= r.base
                    && addr.as_u64() + len as u64 <= r.base + r.data.len() as u64
            })
            .ok_or_else(|| Error::MemoryAccess {
                address: addr.as_u64(),
                message: "unmapped or unreadable".to_string(),
            })?;
        let offset = (addr.as_u64() - region.base) as usize;
        Ok(region.data[offset..offset + len].to_vec())
    }

    fn write(&self, addr: Address, data: &[u8]) -> Result<()> {
        let mut regions = self.regions.lock();
        let region = regions
            .iter_mut()
            .find(|r| {
                addr.as_u64() >= r.base
                    && addr.as_u64() + data.len() as u64 <= r.base + r.data.len() as u64
            })
            .ok_or_else(|| Error::MemoryAccess {
                address: addr.as_u64(),
                message: "unmapped".to_string(),
            })?;
        if !region.protection.write {
            return Err(Error::MemoryAccess {
                address: addr.as_u64(),
                message: "write protected".to_string(),
            });
        }
        let offset = (addr.as_u64() - region.base) as usize;
        region.data[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn ranges(&self, min: Option<Protection>) -> Vec<MemoryRange> {
        self.regions
            .lock()
            .iter()
            .filter(|r| min.map(|m| r.protection.satisfies(m)).unwrap_or(true))
            .map(|r| MemoryRange {
                base: Address::new(r.base),
                size: r.data.len() as u64,
                protection: r.protection,
                file: None,
            })
            .collect()
    }

    fn range_containing(&self, addr: Address) -> Option<MemoryRange> {
        self.regions
            .lock()
            .iter()
            .find(|r| addr.as_u64() >= r.base && addr.as_u64() < r.base + r.data.len() as u64)
            .map(|r| MemoryRange {
                base: Address::new(r.base),
                size: r.data.len() as u64,
                protection: r.protection,
                file: None,
            })
    }

    fn protect(&self, addr: Address, _size: u64, protection: Protection) -> Result<()> {
        let mut regions = self.regions.lock();
        let region = regions
            .iter_mut()
            .find(|r| addr.as_u64() >= r.base && addr.as_u64() < r.base + r.data.len() as u64)
            .ok_or(Error::RangeNotFound(addr.as_u64()))?;
        region.protection = protection;
        self.protect_log.lock().push(protection);
        Ok(())
    }
}
