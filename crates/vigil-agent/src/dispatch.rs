//! Name → handler dispatch and argument coercion.

use crate::Agent;
use serde_json::{json, Value};
use tracing::{debug, warn};
use vigil_common::{
    Address, Comparison, Error, FilterExpr, HookConfig, HookId, ProcessInfo, Protection,
    RangeSpec, Result, ValueType,
};
use vigil_core::dit::{MemoryAccess, RuntimeInspector};
use vigil_core::hooks::{DisableOutcome, EnableOutcome};
use vigil_core::pattern::Pattern;
use vigil_core::{disasm, memory, patch, symbols, threads};

/// Default instruction count for `disassemble`.
const DISASM_COUNT: usize = disasm::DEFAULT_DISASM_COUNT;
/// Default page size for scan result paging.
const SCAN_PAGE: usize = 100;
/// Default depth for `read_stack`.
const STACK_DEPTH: usize = 32;

// ---------------------------------------------------------------------------
// Argument coercion
// ---------------------------------------------------------------------------

fn arg<'a>(args: &'a [Value], index: usize) -> Result<&'a Value> {
    args.get(index)
        .ok_or_else(|| Error::Internal(format!("Missing argument {}", index)))
}

/// Addresses arrive as decimal or hex strings, or as plain numbers.
fn arg_address(args: &[Value], index: usize) -> Result<Address> {
    match arg(args, index)? {
        Value::String(text) => Address::parse(text),
        Value::Number(n) => n
            .as_u64()
            .map(Address::new)
            .ok_or_else(|| Error::InvalidAddress(n.to_string())),
        other => Err(Error::InvalidAddress(other.to_string())),
    }
}

fn arg_str<'a>(args: &'a [Value], index: usize) -> Result<&'a str> {
    arg(args, index)?
        .as_str()
        .ok_or_else(|| Error::Internal(format!("Argument {} must be a string", index)))
}

fn opt_usize(args: &[Value], index: usize) -> Option<usize> {
    match args.get(index)? {
        Value::Number(n) => n.as_u64().map(|v| v as usize),
        Value::String(text) => text.parse::<usize>().ok(),
        _ => None,
    }
}

fn opt_str<'a>(args: &'a [Value], index: usize) -> Option<&'a str> {
    args.get(index)?.as_str()
}

fn arg_bytes(args: &[Value], index: usize) -> Result<Vec<u8>> {
    let items = arg(args, index)?
        .as_array()
        .ok_or_else(|| Error::Internal(format!("Argument {} must be a byte array", index)))?;
    items
        .iter()
        .map(|item| {
            item.as_u64()
                .filter(|&v| v <= u8::MAX as u64)
                .map(|v| v as u8)
                .ok_or_else(|| Error::Internal(format!("Invalid byte value: {}", item)))
        })
        .collect()
}

fn arg_value_type(args: &[Value], index: usize) -> Result<ValueType> {
    ValueType::parse(arg_str(args, index)?)
}

/// Optional trailing filter expression.
fn opt_filter(args: &[Value], index: usize) -> Result<FilterExpr> {
    match args.get(index) {
        None | Some(Value::Null) => Ok(FilterExpr::default()),
        Some(Value::Array(segments)) => FilterExpr::parse(segments),
        Some(other) => Err(Error::Internal(format!("Invalid filter: {}", other))),
    }
}

/// Optional range spec: a protection mask string, a `{base, size}` region,
/// or nothing (all readable ranges).
fn opt_range_spec(args: &[Value], index: usize) -> Result<RangeSpec> {
    match args.get(index) {
        None | Some(Value::Null) => Ok(RangeSpec::default()),
        Some(Value::String(mask)) => Ok(RangeSpec::Protection(Protection::parse(mask)?)),
        Some(Value::Object(fields)) => {
            let base = match fields.get("base") {
                Some(Value::String(text)) => Address::parse(text)?,
                Some(Value::Number(n)) => Address::new(
                    n.as_u64()
                        .ok_or_else(|| Error::InvalidAddress(n.to_string()))?,
                ),
                _ => return Err(Error::Scan("Range spec needs a base".to_string())),
            };
            let size = match fields.get("size") {
                Some(Value::Number(n)) => n
                    .as_u64()
                    .ok_or_else(|| Error::Scan("Invalid range size".to_string()))?,
                Some(Value::String(text)) => text
                    .parse::<u64>()
                    .map_err(|_| Error::Scan("Invalid range size".to_string()))?,
                _ => return Err(Error::Scan("Range spec needs a size".to_string())),
            };
            Ok(RangeSpec::Region { base, size })
        }
        Some(other) => Err(Error::Scan(format!("Invalid range spec: {}", other))),
    }
}

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Queryable faults become `null`.
fn quiet(result: Result<Value>) -> Value {
    result.unwrap_or(Value::Null)
}

/// Enumeration faults become an empty array.
fn listed(result: Result<Value>) -> Value {
    match result {
        Ok(value) => value,
        Err(e) => {
            debug!(target: "vigil_agent::dispatch", error = %e, "Enumeration faulted");
            json!([])
        }
    }
}

/// Mutation faults become a status envelope.
fn enveloped(result: Result<Value>) -> Value {
    match result {
        Ok(value) => value,
        Err(e) => json!({ "success": false, "error": e.to_string() }),
    }
}

fn to_values<T: serde::Serialize>(items: Vec<T>) -> Result<Vec<Value>> {
    items
        .into_iter()
        .map(|item| serde_json::to_value(item).map_err(Error::from))
        .collect()
}

fn filtered<T: serde::Serialize>(items: Vec<T>, filter: &FilterExpr) -> Result<Value> {
    Ok(Value::Array(filter.apply(to_values(items)?)))
}

impl Agent {
    /// Dispatch one host call. Never panics and never surfaces an error as
    /// anything but a value.
    pub fn dispatch(&self, method: &str, args: &[Value]) -> Value {
        match method {
            // Environment
            "get_env" => self.get_env(),
            "get_process_info" => quiet(self.get_process_info()),

            // Typed readers
            "reader_byte" => quiet(self.read_value(args, ValueType::I8)),
            "reader_ubyte" => quiet(self.read_value(args, ValueType::U8)),
            "reader_short" => quiet(self.read_value(args, ValueType::I16)),
            "reader_ushort" => quiet(self.read_value(args, ValueType::U16)),
            "reader_int" => quiet(self.read_value(args, ValueType::I32)),
            "reader_uint" => quiet(self.read_value(args, ValueType::U32)),
            "reader_long" => quiet(self.read_value(args, ValueType::I64)),
            "reader_ulong" => quiet(self.read_value(args, ValueType::U64)),
            "reader_float" => quiet(self.read_value(args, ValueType::F32)),
            "reader_double" => quiet(self.read_value(args, ValueType::F64)),
            "reader_string" => quiet(self.read_value(args, ValueType::String)),
            "reader_bytes" => quiet(self.read_value(args, ValueType::Bytes)),
            "reader_pointer" => quiet(self.read_pointer(args)),

            // Typed writers
            "writer_byte" => quiet(self.write_value(args, ValueType::I8)),
            "writer_ubyte" => quiet(self.write_value(args, ValueType::U8)),
            "writer_short" => quiet(self.write_value(args, ValueType::I16)),
            "writer_ushort" => quiet(self.write_value(args, ValueType::U16)),
            "writer_int" => quiet(self.write_value(args, ValueType::I32)),
            "writer_uint" => quiet(self.write_value(args, ValueType::U32)),
            "writer_long" => quiet(self.write_value(args, ValueType::I64)),
            "writer_ulong" => quiet(self.write_value(args, ValueType::U64)),
            "writer_float" => quiet(self.write_value(args, ValueType::F32)),
            "writer_double" => quiet(self.write_value(args, ValueType::F64)),
            "writer_string" => quiet(self.write_string(args)),
            "writer_bytes" => quiet(self.write_bytes(args)),
            "writer_pointer" => quiet(self.write_value(args, ValueType::Pointer)),

            // Memory protection
            "check_read_protection" => quiet(self.check_protection(args, false)),
            "check_write_protection" => quiet(self.check_protection(args, true)),
            "get_memory_protection" => quiet(self.get_memory_protection(args)),
            "set_memory_protection" => enveloped(self.set_memory_protection(args)),

            // Disassembly
            "instruction" => quiet(self.instruction(args)),
            "disassemble" => listed(self.disassemble(args)),
            "disassemble_function" => listed(self.disassemble_function(args)),

            // Enumeration
            "list_modules" => listed(self.list_modules(args)),
            "list_ranges" => listed(self.list_ranges(args)),
            "list_ranges_by_module" => listed(self.list_ranges_by_module(args)),
            "list_exports" => listed(self.list_exports(args)),
            "list_imports" => listed(self.list_imports(args)),
            "list_symbols" => listed(self.list_symbols(args)),
            "list_functions" => listed(self.list_functions(args)),
            "list_variables" => listed(self.list_variables(args)),
            "find_symbol" => quiet(self.find_symbol(args)),
            "find_symbol_by_address" => quiet(self.find_symbol_by_address(args)),
            "resolve_export" => quiet(self.resolve_export(args)),

            // Threads
            "list_threads" => listed(self.list_threads(args)),
            "get_thread_context" => quiet(self.get_thread_context(args)),
            "read_stack" => listed(self.read_stack(args)),
            "backtrace" => listed(self.backtrace(args)),

            // Hooks
            "hook_attach" => enveloped(self.hook_attach(args)),
            "hook_detach" => enveloped(self.hook_detach(args)),
            "hook_list" => listed(self.hook_list()),
            "hook_enable" => enveloped(self.hook_enable(args)),
            "hook_disable" => enveloped(self.hook_disable(args)),
            "hook_clear_all" => enveloped(self.hook_clear_all()),

            // Scanner
            "scan_pattern" => enveloped(self.scan_pattern(args)),
            "scan_value" => enveloped(self.scan_value(args)),
            "scan_string" => enveloped(self.scan_string(args)),
            "scan_next" => enveloped(self.scan_next(args)),
            "scan_changed" => enveloped(self.scan_retain(args, true)),
            "scan_unchanged" => enveloped(self.scan_retain(args, false)),
            "scan_snapshot" => enveloped(self.scan_snapshot(args)),
            "get_scan_results" => listed(self.get_scan_results(args)),
            "get_scan_result_values" => listed(self.get_scan_result_values(args)),
            "clear_scan" => enveloped(self.clear_scan()),

            // Patching
            "patch_bytes" => enveloped(self.patch_bytes(args)),
            "nop_instructions" => enveloped(self.nop_instructions(args)),
            "restore_bytes" => enveloped(self.restore_bytes(args)),

            // Managed-runtime bridges
            "list_java_classes" => listed(self.bridge_classes(self.dit.java_bridge(), args)),
            "list_java_methods" => listed(self.bridge_methods(self.dit.java_bridge(), args)),
            "list_objc_classes" => listed(self.bridge_classes(self.dit.objc_bridge(), args)),
            "list_objc_methods" => listed(self.bridge_methods(self.dit.objc_bridge(), args)),

            other => json!({
                "success": false,
                "error": format!("Unknown method: {}", other),
            }),
        }
    }

    fn mem(&self) -> &dyn MemoryAccess {
        self.dit.as_ref()
    }

    // -----------------------------------------------------------------------
    // Environment
    // -----------------------------------------------------------------------

    fn get_env(&self) -> Value {
        json!([self.dit.os(), self.dit.arch().as_str()])
    }

    fn get_process_info(&self) -> Result<Value> {
        let info = ProcessInfo {
            pid: self.dit.pid(),
            os: self.dit.os(),
            arch: self.dit.arch(),
            pointer_size: self.dit.pointer_size(),
            page_size: self.dit.page_size(),
        };
        Ok(serde_json::to_value(info)?)
    }

    // -----------------------------------------------------------------------
    // Memory I/O
    // -----------------------------------------------------------------------

    fn read_value(&self, args: &[Value], ty: ValueType) -> Result<Value> {
        let addr = arg_address(args, 0)?;
        let len = opt_usize(args, 1);
        if ty == ValueType::Bytes && len.is_none() {
            return Err(Error::Internal("reader_bytes needs a length".to_string()));
        }
        let value = memory::read_typed(self.mem(), addr, ty, len, self.dit.pointer_size())?;
        Ok(match value {
            vigil_common::ScalarValue::Signed(v) => json!(v),
            vigil_common::ScalarValue::Unsigned(v) => json!(v),
            vigil_common::ScalarValue::Float(v) => json!(v),
            vigil_common::ScalarValue::Text(v) => json!(v),
            vigil_common::ScalarValue::Bytes(v) => json!(v),
        })
    }

    /// Pointer-sized read, reported as an address string.
    fn read_pointer(&self, args: &[Value]) -> Result<Value> {
        let addr = arg_address(args, 0)?;
        let pointer_size = self.dit.pointer_size();
        let value =
            memory::read_typed(self.mem(), addr, ValueType::Pointer, None, pointer_size)?;
        match value {
            vigil_common::ScalarValue::Unsigned(raw) => {
                Ok(json!(Address::new(raw).to_string()))
            }
            _ => Err(Error::Internal("Pointer read produced a non-integer".to_string())),
        }
    }

    fn write_value(&self, args: &[Value], ty: ValueType) -> Result<Value> {
        let addr = arg_address(args, 0)?;
        let text = match arg(args, 1)? {
            Value::String(text) => text.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(flag) => (*flag as u8).to_string(),
            other => {
                return Err(Error::Internal(format!("Invalid write value: {}", other)));
            }
        };
        memory::write_typed(self.mem(), addr, ty, &text, self.dit.pointer_size())?;
        Ok(json!(true))
    }

    /// C-string write: UTF-8 bytes plus the terminating NUL.
    fn write_string(&self, args: &[Value]) -> Result<Value> {
        let addr = arg_address(args, 0)?;
        let text = arg_str(args, 1)?;
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        self.mem().write(addr, &bytes)?;
        Ok(json!(true))
    }

    fn write_bytes(&self, args: &[Value]) -> Result<Value> {
        let addr = arg_address(args, 0)?;
        let bytes = arg_bytes(args, 1)?;
        self.mem().write(addr, &bytes)?;
        Ok(json!(true))
    }

    fn check_protection(&self, args: &[Value], write: bool) -> Result<Value> {
        let addr = arg_address(args, 0)?;
        let ok = if write {
            memory::can_write(self.mem(), addr)
        } else {
            memory::can_read(self.mem(), addr)
        };
        Ok(json!(ok))
    }

    fn get_memory_protection(&self, args: &[Value]) -> Result<Value> {
        let addr = arg_address(args, 0)?;
        Ok(match memory::protection_of(self.mem(), addr) {
            Some(protection) => json!(protection.to_string()),
            None => Value::Null,
        })
    }

    fn set_memory_protection(&self, args: &[Value]) -> Result<Value> {
        let addr = arg_address(args, 0)?;
        let size = opt_usize(args, 1)
            .ok_or_else(|| Error::Internal("Missing size".to_string()))? as u64;
        let protection = Protection::parse(arg_str(args, 2)?)?;
        self.mem().protect(addr, size, protection)?;
        Ok(json!({ "success": true, "protection": protection.to_string() }))
    }

    // -----------------------------------------------------------------------
    // Disassembly
    // -----------------------------------------------------------------------

    fn instruction(&self, args: &[Value]) -> Result<Value> {
        let addr = arg_address(args, 0)?;
        Ok(
            match disasm::instruction_at(self.dit.as_ref(), self.mem(), addr) {
                Some(instruction) => serde_json::to_value(instruction)?,
                None => Value::Null,
            },
        )
    }

    fn disassemble(&self, args: &[Value]) -> Result<Value> {
        let addr = arg_address(args, 0)?;
        let count = opt_usize(args, 1).unwrap_or(DISASM_COUNT);
        let listing = disasm::disassemble(self.dit.as_ref(), self.mem(), addr, count);
        Ok(Value::Array(to_values(listing)?))
    }

    fn disassemble_function(&self, args: &[Value]) -> Result<Value> {
        let addr = arg_address(args, 0)?;
        let max = opt_usize(args, 1).unwrap_or(disasm::MAX_FUNCTION_INSTRUCTIONS);
        let listing = disasm::disassemble_function(
            self.dit.as_ref(),
            self.mem(),
            self.dit.arch(),
            addr,
            max,
        );
        Ok(Value::Array(to_values(listing)?))
    }

    // -----------------------------------------------------------------------
    // Enumeration
    // -----------------------------------------------------------------------

    fn list_modules(&self, args: &[Value]) -> Result<Value> {
        let filter = opt_filter(args, 0)?;
        filtered(self.dit.modules(), &filter)
    }

    fn list_ranges(&self, args: &[Value]) -> Result<Value> {
        let (min, filter_index) = match opt_str(args, 0) {
            Some(mask) => (Some(Protection::parse(mask)?), 1),
            None => (Some(Protection::read_only()), 0),
        };
        let filter = opt_filter(args, filter_index)?;
        filtered(self.mem().ranges(min), &filter)
    }

    fn list_ranges_by_module(&self, args: &[Value]) -> Result<Value> {
        let addr = arg_address(args, 0)?;
        let filter = opt_filter(args, 1)?;
        filtered(
            symbols::ranges_by_module(self.mem(), self.dit.as_ref(), addr),
            &filter,
        )
    }

    /// The module argument is optional; absent, the main (first) module.
    fn module_arg(&self, args: &[Value], index: usize) -> Result<(String, usize)> {
        match args.get(index) {
            Some(Value::String(name)) => Ok((name.clone(), index + 1)),
            _ => self
                .dit
                .modules()
                .first()
                .map(|module| (module.name.clone(), index))
                .ok_or_else(|| Error::ModuleNotFound("<main>".to_string())),
        }
    }

    fn list_exports(&self, args: &[Value]) -> Result<Value> {
        let (module, filter_index) = self.module_arg(args, 0)?;
        let filter = opt_filter(args, filter_index)?;
        filtered(self.dit.exports(&module)?, &filter)
    }

    fn list_imports(&self, args: &[Value]) -> Result<Value> {
        let (module, filter_index) = self.module_arg(args, 0)?;
        let filter = opt_filter(args, filter_index)?;
        filtered(self.dit.imports(&module)?, &filter)
    }

    fn list_symbols(&self, args: &[Value]) -> Result<Value> {
        let (module, filter_index) = self.module_arg(args, 0)?;
        let filter = opt_filter(args, filter_index)?;
        filtered(self.dit.symbols(&module)?, &filter)
    }

    fn list_functions(&self, args: &[Value]) -> Result<Value> {
        let (module, filter_index) = self.module_arg(args, 0)?;
        let filter = opt_filter(args, filter_index)?;
        filtered(symbols::functions(self.dit.as_ref(), &module)?, &filter)
    }

    fn list_variables(&self, args: &[Value]) -> Result<Value> {
        let (module, filter_index) = self.module_arg(args, 0)?;
        let filter = opt_filter(args, filter_index)?;
        filtered(symbols::variables(self.dit.as_ref(), &module)?, &filter)
    }

    fn find_symbol(&self, args: &[Value]) -> Result<Value> {
        let name = arg_str(args, 0)?;
        Ok(match self.dit.find_by_name(name) {
            Some(symbol) => serde_json::to_value(symbol)?,
            None => Value::Null,
        })
    }

    fn find_symbol_by_address(&self, args: &[Value]) -> Result<Value> {
        let addr = arg_address(args, 0)?;
        Ok(serde_json::to_value(self.dit.find_by_address(addr))?)
    }

    fn resolve_export(&self, args: &[Value]) -> Result<Value> {
        let module = arg_str(args, 0)?;
        let name = arg_str(args, 1)?;
        Ok(match self.dit.resolve_export(module, name) {
            Some(addr) => json!(addr.to_string()),
            None => Value::Null,
        })
    }

    // -----------------------------------------------------------------------
    // Threads
    // -----------------------------------------------------------------------

    fn list_threads(&self, args: &[Value]) -> Result<Value> {
        let filter = opt_filter(args, 0)?;
        filtered(self.dit.threads(), &filter)
    }

    fn get_thread_context(&self, args: &[Value]) -> Result<Value> {
        let id = opt_usize(args, 0)
            .ok_or_else(|| Error::Internal("Missing thread id".to_string()))?
            as u64;
        let context = self
            .dit
            .threads()
            .into_iter()
            .find(|thread| thread.id == id)
            .and_then(|thread| thread.context);
        Ok(match context {
            Some(context) => serde_json::to_value(context)?,
            None => Value::Null,
        })
    }

    fn read_stack(&self, args: &[Value]) -> Result<Value> {
        let sp = arg_address(args, 0)?;
        let depth = opt_usize(args, 1).unwrap_or(STACK_DEPTH);
        let slots = threads::read_stack(
            self.mem(),
            self.dit.as_ref(),
            self.dit.as_ref(),
            sp,
            depth,
        );
        Ok(Value::Array(to_values(slots)?))
    }

    /// A raw context pointer cannot be reconstituted into a cpu-context on
    /// this side of the wire, so a supplied argument is rejected.
    fn backtrace(&self, args: &[Value]) -> Result<Value> {
        if args.first().map(|v| !v.is_null()).unwrap_or(false) {
            warn!(target: "vigil_agent::dispatch",
                "backtrace: host-supplied context pointers are not supported");
            return Ok(json!([]));
        }
        let frames = threads::backtrace_frames(self.dit.as_ref(), self.dit.as_ref(), None);
        Ok(Value::Array(to_values(frames)?))
    }

    // -----------------------------------------------------------------------
    // Hooks
    // -----------------------------------------------------------------------

    fn hook_attach(&self, args: &[Value]) -> Result<Value> {
        let addr = arg_address(args, 0)?;
        let config = match args.get(1) {
            None | Some(Value::Null) => HookConfig::default(),
            Some(value) => serde_json::from_value(value.clone())?,
        };
        let outcome = self
            .hooks
            .lock()
            .attach(&self.dit, &self.transport, addr, config)?;
        Ok(json!({
            "success": true,
            "id": outcome.id.to_string(),
            "address": outcome.address.to_string(),
        }))
    }

    fn hook_detach(&self, args: &[Value]) -> Result<Value> {
        let id = HookId::parse(arg_str(args, 0)?)?;
        self.hooks.lock().detach(id)?;
        Ok(json!({ "success": true, "id": id.to_string() }))
    }

    fn hook_list(&self) -> Result<Value> {
        Ok(Value::Array(to_values(self.hooks.lock().list())?))
    }

    fn hook_enable(&self, args: &[Value]) -> Result<Value> {
        let id = HookId::parse(arg_str(args, 0)?)?;
        match self.hooks.lock().enable(&self.dit, &self.transport, id)? {
            EnableOutcome::AlreadyEnabled => Ok(json!({
                "success": true,
                "id": id.to_string(),
                "message": "Already enabled",
            })),
            EnableOutcome::Recreated { new_id } => Ok(json!({
                "success": true,
                "id": id.to_string(),
                "newId": new_id.to_string(),
            })),
        }
    }

    fn hook_disable(&self, args: &[Value]) -> Result<Value> {
        let id = HookId::parse(arg_str(args, 0)?)?;
        match self.hooks.lock().disable(id)? {
            DisableOutcome::Disabled => {
                Ok(json!({ "success": true, "id": id.to_string() }))
            }
            DisableOutcome::AlreadyDisabled => Ok(json!({
                "success": true,
                "id": id.to_string(),
                "message": "Already disabled",
            })),
        }
    }

    fn hook_clear_all(&self) -> Result<Value> {
        let count = self.hooks.lock().clear_all();
        Ok(json!({ "success": true, "count": count }))
    }

    // -----------------------------------------------------------------------
    // Scanner
    // -----------------------------------------------------------------------

    fn scan_pattern(&self, args: &[Value]) -> Result<Value> {
        let text = arg_str(args, 0)?;
        let pattern = Pattern::parse(text)?;
        let spec = opt_range_spec(args, 1)?;
        let summary = self
            .scan
            .lock()
            .scan_pattern(self.mem(), &pattern, text, &spec);
        Ok(serde_json::to_value(summary)?)
    }

    fn scan_value(&self, args: &[Value]) -> Result<Value> {
        let ty = arg_value_type(args, 0)?;
        let text = arg_str(args, 1)?;
        let spec = opt_range_spec(args, 2)?;
        let summary = self.scan.lock().scan_value(
            self.mem(),
            ty,
            text,
            &spec,
            self.dit.pointer_size(),
        )?;
        Ok(serde_json::to_value(summary)?)
    }

    fn scan_string(&self, args: &[Value]) -> Result<Value> {
        let text = arg_str(args, 0)?;
        let spec = opt_range_spec(args, 1)?;
        let summary = self.scan.lock().scan_value(
            self.mem(),
            ValueType::String,
            text,
            &spec,
            self.dit.pointer_size(),
        )?;
        Ok(serde_json::to_value(summary)?)
    }

    fn scan_next(&self, args: &[Value]) -> Result<Value> {
        let ty = arg_value_type(args, 0)?;
        let text = arg_str(args, 1)?;
        let comparison = match opt_str(args, 2) {
            Some(word) => Comparison::parse(word)?,
            None => Comparison::Eq,
        };
        let summary = self.scan.lock().refine_next(
            self.mem(),
            ty,
            text,
            comparison,
            self.dit.pointer_size(),
        )?;
        Ok(serde_json::to_value(summary)?)
    }

    fn scan_retain(&self, args: &[Value], keep_changed: bool) -> Result<Value> {
        let ty = arg_value_type(args, 0)?;
        let summary = self.scan.lock().retain_by_snapshot(
            self.mem(),
            ty,
            self.dit.pointer_size(),
            keep_changed,
        );
        Ok(serde_json::to_value(summary)?)
    }

    fn scan_snapshot(&self, args: &[Value]) -> Result<Value> {
        let ty = arg_value_type(args, 0)?;
        let count = self
            .scan
            .lock()
            .take_snapshot(self.mem(), ty, self.dit.pointer_size());
        Ok(json!({ "success": true, "count": count }))
    }

    fn get_scan_results(&self, args: &[Value]) -> Result<Value> {
        let offset = opt_usize(args, 0).unwrap_or(0);
        let limit = opt_usize(args, 1).unwrap_or(SCAN_PAGE);
        Ok(Value::Array(to_values(self.scan.lock().page(offset, limit))?))
    }

    fn get_scan_result_values(&self, args: &[Value]) -> Result<Value> {
        let ty = arg_value_type(args, 0)?;
        let offset = opt_usize(args, 1).unwrap_or(0);
        let limit = opt_usize(args, 2).unwrap_or(SCAN_PAGE);
        let entries = self.scan.lock().page_values(
            self.mem(),
            ty,
            offset,
            limit,
            self.dit.pointer_size(),
        );
        Ok(Value::Array(to_values(entries)?))
    }

    fn clear_scan(&self) -> Result<Value> {
        self.scan.lock().clear();
        Ok(json!({ "success": true }))
    }

    // -----------------------------------------------------------------------
    // Patching
    // -----------------------------------------------------------------------

    fn patch_outcome(&self, outcome: patch::PatchOutcome) -> Result<Value> {
        let mut value = serde_json::to_value(outcome)?;
        value["success"] = json!(true);
        Ok(value)
    }

    fn patch_bytes(&self, args: &[Value]) -> Result<Value> {
        let addr = arg_address(args, 0)?;
        let bytes = arg_bytes(args, 1)?;
        self.patch_outcome(patch::patch_bytes(self.mem(), addr, &bytes)?)
    }

    fn nop_instructions(&self, args: &[Value]) -> Result<Value> {
        let addr = arg_address(args, 0)?;
        let count = opt_usize(args, 1).unwrap_or(1);
        self.patch_outcome(patch::nop_instructions(
            self.dit.as_ref(),
            self.mem(),
            self.dit.arch(),
            addr,
            count,
        )?)
    }

    fn restore_bytes(&self, args: &[Value]) -> Result<Value> {
        let addr = arg_address(args, 0)?;
        let original = arg_bytes(args, 1)?;
        self.patch_outcome(patch::restore_bytes(self.mem(), addr, &original)?)
    }

    // -----------------------------------------------------------------------
    // Managed-runtime bridges
    // -----------------------------------------------------------------------

    fn bridge_classes(
        &self,
        bridge: Option<&dyn RuntimeInspector>,
        args: &[Value],
    ) -> Result<Value> {
        let Some(bridge) = bridge else {
            return Ok(json!([]));
        };
        let filter = opt_filter(args, 0)?;
        let records: Vec<Value> = bridge
            .classes()
            .into_iter()
            .map(|name| json!({ "name": name }))
            .collect();
        Ok(Value::Array(filter.apply(records)))
    }

    fn bridge_methods(
        &self,
        bridge: Option<&dyn RuntimeInspector>,
        args: &[Value],
    ) -> Result<Value> {
        let Some(bridge) = bridge else {
            return Ok(json!([]));
        };
        let class = arg_str(args, 0)?;
        let filter = opt_filter(args, 1)?;
        let records: Vec<Value> = bridge
            .methods(class)
            .into_iter()
            .map(|name| json!({ "name": name, "class": class }))
            .collect();
        Ok(Value::Array(filter.apply(records)))
    }
}
