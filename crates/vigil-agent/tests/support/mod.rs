//! In-process test double for the DIT capability surface.
//!
//! `FakeDit` models a tiny target process: scriptable memory regions,
//! modules with exports and symbols, a scripted instruction decoder, an
//! interceptor whose hooks tests can fire synthetically, and a transport
//! that collects every emitted event.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use vigil_common::{
    Address, AgentEvent, Arch, CpuContext, DebugSymbol, DecodedInstruction, Error, ExportInfo,
    ExportKind, ImportInfo, MemoryRange, ModuleInfo, Protection, Result, ThreadInfo, ThreadState,
};
use vigil_core::dit::{
    Dit, InstructionDecoder, Interceptor, Invocation, InvocationListener, Listener, MemoryAccess,
    ProcessView, RuntimeInspector, SymbolSource, ThreadAccess, Transport,
};

struct FakeRegion {
    base: u64,
    data: Vec<u8>,
    protection: Protection,
    file: Option<String>,
}

struct AttachedHook {
    target: Address,
    listener: Arc<dyn InvocationListener>,
    alive: Arc<AtomicBool>,
}

struct FakeListener {
    alive: Arc<AtomicBool>,
}

impl Listener for FakeListener {
    fn detach(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

pub struct FakeBridge {
    pub classes: Vec<String>,
    pub methods: HashMap<String, Vec<String>>,
}

impl RuntimeInspector for FakeBridge {
    fn classes(&self) -> Vec<String> {
        self.classes.clone()
    }

    fn methods(&self, class: &str) -> Vec<String> {
        self.methods.get(class).cloned().unwrap_or_default()
    }
}

pub struct FakeDit {
    arch: Arch,
    regions: Mutex<Vec<FakeRegion>>,
    modules: Vec<ModuleInfo>,
    exports: HashMap<String, Vec<ExportInfo>>,
    imports: HashMap<String, Vec<ImportInfo>>,
    module_symbols: HashMap<String, Vec<DebugSymbol>>,
    named_symbols: Vec<DebugSymbol>,
    instructions: HashMap<u64, DecodedInstruction>,
    threads: Vec<ThreadInfo>,
    backtrace_addrs: Vec<Address>,
    attached: Mutex<Vec<AttachedHook>>,
    java: Option<FakeBridge>,
}

impl FakeDit {
    pub fn new() -> Self {
        Self::with_arch(Arch::X64)
    }

    pub fn with_arch(arch: Arch) -> Self {
        Self {
            arch,
            regions: Mutex::new(Vec::new()),
            modules: Vec::new(),
            exports: HashMap::new(),
            imports: HashMap::new(),
            module_symbols: HashMap::new(),
            named_symbols: Vec::new(),
            instructions: HashMap::new(),
            threads: Vec::new(),
            backtrace_addrs: Vec::new(),
            attached: Mutex::new(Vec::new()),
            java: None,
        }
    }

    pub fn region(self, base: u64, protection: &str, data: Vec<u8>) -> Self {
        self.regions.lock().push(FakeRegion {
            base,
            data,
            protection: Protection::parse(protection).unwrap(),
            file: None,
        });
        self
    }

    pub fn module(mut self, name: &str, base: u64, size: u64) -> Self {
        self.modules.push(ModuleInfo {
            name: name.to_string(),
            base: Address::new(base),
            size,
            path: format!("/lib/{}", name),
        });
        self.exports.entry(name.to_string()).or_default();
        self.imports.entry(name.to_string()).or_default();
        self.module_symbols.entry(name.to_string()).or_default();
        self
    }

    pub fn export(mut self, module: &str, name: &str, addr: u64, kind: ExportKind) -> Self {
        self.exports.entry(module.to_string()).or_default().push(ExportInfo {
            name: name.to_string(),
            address: Address::new(addr),
            kind,
        });
        self
    }

    pub fn import(mut self, module: &str, name: &str, from: &str, addr: u64) -> Self {
        self.imports.entry(module.to_string()).or_default().push(ImportInfo {
            name: name.to_string(),
            module: from.to_string(),
            address: Some(Address::new(addr)),
            slot: None,
        });
        self
    }

    pub fn symbol(mut self, module: &str, name: &str, addr: u64) -> Self {
        let record = DebugSymbol {
            name: Some(name.to_string()),
            address: Address::new(addr),
            module_name: Some(module.to_string()),
            file_name: None,
            line_number: None,
        };
        self.named_symbols.push(record.clone());
        self.module_symbols
            .entry(module.to_string())
            .or_default()
            .push(record);
        self
    }

    pub fn instruction(mut self, insn: DecodedInstruction) -> Self {
        self.instructions.insert(insn.address.as_u64(), insn);
        self
    }

    pub fn thread(mut self, id: u64, state: ThreadState, context: Option<CpuContext>) -> Self {
        self.threads.push(ThreadInfo { id, state, context });
        self
    }

    pub fn backtrace_of(mut self, addrs: &[u64]) -> Self {
        self.backtrace_addrs = addrs.iter().copied().map(Address::new).collect();
        self
    }

    pub fn java(mut self, bridge: FakeBridge) -> Self {
        self.java = Some(bridge);
        self
    }

    /// Raw poke bypassing protection, for arranging test state.
    pub fn poke(&self, addr: u64, bytes: &[u8]) {
        let mut regions = self.regions.lock();
        let region = regions
            .iter_mut()
            .find(|r| addr >= r.base && addr < r.base + r.data.len() as u64)
            .expect("poke outside mapped regions");
        let offset = (addr - region.base) as usize;
        region.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    pub fn peek(&self, addr: u64, len: usize) -> Vec<u8> {
        let regions = self.regions.lock();
        let region = regions
            .iter()
            .find(|r| addr >= r.base && addr + len as u64 <= r.base + r.data.len() as u64)
            .expect("peek outside mapped regions");
        let offset = (addr - region.base) as usize;
        region.data[offset..offset + len].to_vec()
    }

    pub fn live_hooks_at(&self, target: u64) -> usize {
        self.attached
            .lock()
            .iter()
            .filter(|hook| hook.target.as_u64() == target && hook.alive.load(Ordering::SeqCst))
            .count()
    }

    /// Simulate the target calling through `target`: every live listener's
    /// entry and exit callbacks fire once. Returns the argument slots and
    /// return value after any rewrites.
    pub fn fire_call(
        &self,
        target: u64,
        args: &[u64],
        retval: u64,
        thread_id: u64,
        depth: u32,
    ) -> (Vec<u64>, u64) {
        let listeners: Vec<Arc<dyn InvocationListener>> = self
            .attached
            .lock()
            .iter()
            .filter(|hook| hook.target.as_u64() == target && hook.alive.load(Ordering::SeqCst))
            .map(|hook| Arc::clone(&hook.listener))
            .collect();

        let mut invocation = FakeInvocation {
            args: args.iter().copied().map(Address::new).collect(),
            retval: Address::new(retval),
            thread_id,
            depth,
        };

        for listener in &listeners {
            let scratch = listener.on_enter(&mut invocation);
            listener.on_leave(&mut invocation, scratch);
        }

        (
            invocation.args.iter().map(|a| a.as_u64()).collect(),
            invocation.retval.as_u64(),
        )
    }
}

struct FakeInvocation {
    args: Vec<Address>,
    retval: Address,
    thread_id: u64,
    depth: u32,
}

impl Invocation for FakeInvocation {
    fn arg(&self, index: usize) -> Result<Address> {
        self.args
            .get(index)
            .copied()
            .ok_or_else(|| Error::Internal(format!("No argument slot {}", index)))
    }

    fn set_arg(&mut self, index: usize, value: Address) -> Result<()> {
        match self.args.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(Error::Internal(format!("No argument slot {}", index))),
        }
    }

    fn retval(&self) -> Result<Address> {
        Ok(self.retval)
    }

    fn set_retval(&mut self, value: Address) -> Result<()> {
        self.retval = value;
        Ok(())
    }

    fn thread_id(&self) -> u64 {
        self.thread_id
    }

    fn depth(&self) -> u32 {
        self.depth
    }

    fn cpu_context(&self) -> Option<CpuContext> {
        None
    }
}

impl ProcessView for FakeDit {
    fn pid(&self) -> u32 {
        4242
    }

    fn os(&self) -> String {
        "linux".to_string()
    }

    fn arch(&self) -> Arch {
        self.arch
    }

    fn pointer_size(&self) -> usize {
        match self.arch {
            Arch::Ia32 | Arch::Arm => 4,
            _ => 8,
        }
    }

    fn page_size(&self) -> usize {
        4096
    }
}

impl MemoryAccess for FakeDit {
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
                file: r.file.clone(),
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
                file: r.file.clone(),
            })
    }

    fn protect(&self, addr: Address, _size: u64, protection: Protection) -> Result<()> {
        let mut regions = self.regions.lock();
        let region = regions
            .iter_mut()
            .find(|r| addr.as_u64() >= r.base && addr.as_u64() < r.base + r.data.len() as u64)
            .ok_or(Error::RangeNotFound(addr.as_u64()))?;
        region.protection = protection;
        Ok(())
    }
}

impl SymbolSource for FakeDit {
    fn modules(&self) -> Vec<ModuleInfo> {
        self.modules.clone()
    }

    fn exports(&self, module: &str) -> Result<Vec<ExportInfo>> {
        self.exports
            .get(module)
            .cloned()
            .ok_or_else(|| Error::ModuleNotFound(module.to_string()))
    }

    fn imports(&self, module: &str) -> Result<Vec<ImportInfo>> {
        self.imports
            .get(module)
            .cloned()
            .ok_or_else(|| Error::ModuleNotFound(module.to_string()))
    }

    fn symbols(&self, module: &str) -> Result<Vec<DebugSymbol>> {
        self.module_symbols
            .get(module)
            .cloned()
            .ok_or_else(|| Error::ModuleNotFound(module.to_string()))
    }

    fn resolve_export(&self, module: &str, name: &str) -> Option<Address> {
        self.exports
            .get(module)?
            .iter()
            .find(|export| export.name == name)
            .map(|export| export.address)
    }

    fn find_by_name(&self, name: &str) -> Option<DebugSymbol> {
        self.named_symbols
            .iter()
            .find(|symbol| symbol.name.as_deref() == Some(name))
            .cloned()
    }

    fn find_by_address(&self, addr: Address) -> DebugSymbol {
        let best = self
            .named_symbols
            .iter()
            .filter(|symbol| symbol.address <= addr)
            .max_by_key(|symbol| symbol.address);
        match best {
            Some(symbol) if addr.as_u64() - symbol.address.as_u64() < 0x1000 => symbol.clone(),
            _ => DebugSymbol {
                name: None,
                address: addr,
                module_name: self
                    .modules
                    .iter()
                    .find(|module| module.contains(addr))
                    .map(|module| module.name.clone()),
                file_name: None,
                line_number: None,
            },
        }
    }
}

impl InstructionDecoder for FakeDit {
    fn decode(&self, addr: Address) -> Result<DecodedInstruction> {
        self.instructions
            .get(&addr.as_u64())
            .cloned()
            .ok_or(Error::DecodeFailed(addr.as_u64()))
    }
}

impl Interceptor for FakeDit {
    fn attach(
        &self,
        target: Address,
        listener: Arc<dyn InvocationListener>,
    ) -> Result<Box<dyn Listener>> {
        let alive = Arc::new(AtomicBool::new(true));
        self.attached.lock().push(AttachedHook {
            target,
            listener,
            alive: Arc::clone(&alive),
        });
        Ok(Box::new(FakeListener { alive }))
    }
}

impl ThreadAccess for FakeDit {
    fn threads(&self) -> Vec<ThreadInfo> {
        self.threads.clone()
    }

    fn backtrace(&self, _context: Option<&CpuContext>) -> Vec<Address> {
        self.backtrace_addrs.clone()
    }
}

impl Dit for FakeDit {
    fn java_bridge(&self) -> Option<&dyn RuntimeInspector> {
        self.java.as_ref().map(|bridge| bridge as &dyn RuntimeInspector)
    }
}

/// Transport that collects every event as JSON.
#[derive(Default)]
pub struct CollectingTransport {
    events: Mutex<Vec<Value>>,
}

impl CollectingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<Value> {
        std::mem::take(&mut self.events.lock())
    }
}

impl Transport for CollectingTransport {
    fn send(&self, event: AgentEvent) {
        self.events
            .lock()
            .push(serde_json::to_value(event).expect("event serializes"));
    }
}
