//! Symbol and range enumeration helpers.

use crate::dit::{MemoryAccess, SymbolSource};
use vigil_common::{Address, ExportInfo, ExportKind, MemoryRange, Result};

/// Exports of `module` that are functions.
pub fn functions(sym: &dyn SymbolSource, module: &str) -> Result<Vec<ExportInfo>> {
    Ok(sym
        .exports(module)?
        .into_iter()
        .filter(|export| export.kind == ExportKind::Function)
        .collect())
}

/// Exports of `module` that are variables.
pub fn variables(sym: &dyn SymbolSource, module: &str) -> Result<Vec<ExportInfo>> {
    Ok(sym
        .exports(module)?
        .into_iter()
        .filter(|export| export.kind == ExportKind::Variable)
        .collect())
}

/// Address-space ranges lying within the module that contains `addr`
/// (base-inclusive, end-exclusive). Empty when no module contains it.
pub fn ranges_by_module(
    mem: &dyn MemoryAccess,
    sym: &dyn SymbolSource,
    addr: Address,
) -> Vec<MemoryRange> {
    let Some(module) = sym.modules().into_iter().find(|m| m.contains(addr)) else {
        return Vec::new();
    };
    mem.ranges(None)
        .into_iter()
        .filter(|range| module.contains(range.base))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::BufferMemory;
    use vigil_common::{DebugSymbol, Error, ImportInfo, ModuleInfo};

    struct FixtureSymbols {
        modules: Vec<ModuleInfo>,
        exports: Vec<ExportInfo>,
    }

    impl SymbolSource for FixtureSymbols {
        fn modules(&self) -> Vec<ModuleInfo> {
            self.modules.clone()
        }

        fn exports(&self, module: &str) -> Result<Vec<ExportInfo>> {
            if self.modules.iter().any(|m| m.name == module) {
                Ok(self.exports.clone())
            } else {
                Err(Error::ModuleNotFound(module.to_string()))
            }
        }

        fn imports(&self, _module: &str) -> Result<Vec<ImportInfo>> {
            Ok(Vec::new())
        }

        fn symbols(&self, _module: &str) -> Result<Vec<DebugSymbol>> {
            Ok(Vec::new())
        }

        fn resolve_export(&self, _module: &str, name: &str) -> Option<Address> {
            self.exports
                .iter()
                .find(|e| e.name == name)
                .map(|e| e.address)
        }

        fn find_by_name(&self, _name: &str) -> Option<DebugSymbol> {
            None
        }

        fn find_by_address(&self, addr: Address) -> DebugSymbol {
            DebugSymbol {
                name: None,
                address: addr,
                module_name: None,
                file_name: None,
                line_number: None,
            }
        }
    }

    fn fixture() -> FixtureSymbols {
        FixtureSymbols {
            modules: vec![ModuleInfo {
                name: "libfoo.so".to_string(),
                base: Address::new(0x1000),
                size: 0x2000,
                path: "/lib/libfoo.so".to_string(),
            }],
            exports: vec![
                ExportInfo {
                    name: "foo_init".to_string(),
                    address: Address::new(0x1100),
                    kind: ExportKind::Function,
                },
                ExportInfo {
                    name: "foo_version".to_string(),
                    address: Address::new(0x2800),
                    kind: ExportKind::Variable,
                },
            ],
        }
    }

    #[test]
    fn test_function_and_variable_projections() {
        let sym = fixture();
        let funcs = functions(&sym, "libfoo.so").unwrap();
        assert_eq!(funcs.len(), 1);
        assert_eq!(funcs[0].name, "foo_init");

        let vars = variables(&sym, "libfoo.so").unwrap();
        assert_eq!(vars.len(), 1);
        assert_eq!(vars[0].name, "foo_version");
    }

    #[test]
    fn test_projection_unknown_module() {
        let sym = fixture();
        assert!(functions(&sym, "nope.so").is_err());
    }

    #[test]
    fn test_ranges_by_module_intersection() {
        let sym = fixture();
        let mem = BufferMemory::empty()
            .with_region(0x1000, vec![0; 0x1000], "r-x")
            .with_region(0x2000, vec![0; 0x1000], "rw-")
            .with_region(0x8000, vec![0; 0x1000], "rw-");

        let ranges = ranges_by_module(&mem, &sym, Address::new(0x1234));
        assert_eq!(ranges.len(), 2);
        assert!(ranges.iter().all(|r| r.base.as_u64() < 0x3000));
    }

    #[test]
    fn test_ranges_by_module_outside_any_module() {
        let sym = fixture();
        let mem = BufferMemory::new(0x8000, vec![0; 16]);
        assert!(ranges_by_module(&mem, &sym, Address::new(0x8000)).is_empty());
    }
}
