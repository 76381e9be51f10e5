//! Per-module pass driver.
//!
//! Runs the declaration pass, type resolver, checker and validator over
//! each compilation unit, in the reverse topological order produced by the
//! module graph builder, so imports always resolve before their importers.
//!
//! Error accounting distinguishes structural failures (declaration and type
//! resolution) from local ones: a structurally broken module makes every
//! importer report `import-broken`, while a module with only local errors
//! stays usable as an import target. Cancellation is observed between
//! modules and between top-level statements; a cancelled module is dropped
//! as a whole.

use crate::resolve::universe::Universe;
use crate::resolve::{check, decls, types, validation};
use indexmap::IndexMap;
use oberst_ast::ast::{NamedRef, RawUnit};
use oberst_ast::error::Diagnostics;
use oberst_ast::foundation::ModPath;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Cooperative cancellation flag.
///
/// The host sets it from any thread; the front end checks it between
/// modules and between top-level statements.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create a fresh, unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Process ordered compilation units into resolved modules.
///
/// The returned list keeps the input order (imports before importers).
pub fn process(
    units: Vec<RawUnit>,
    uni: &Universe,
    diags: &mut Diagnostics,
    cancel: &CancelFlag,
) -> Vec<NamedRef> {
    let mut modules: IndexMap<ModPath, NamedRef> = IndexMap::new();

    for unit in units {
        if cancel.is_cancelled() {
            debug!("compilation cancelled between modules");
            break;
        }
        let path = unit.path.clone();
        let errors_before = diags.error_count();

        let module = decls::declare_module(unit, uni, &modules, diags);
        types::resolve_module_types(&module, uni, diags);

        if diags.error_count() > errors_before {
            module.mark_errors();
            if let Some(data) = module.as_module() {
                data.mark_broken();
            }
        }

        check::check_module(&module, uni, diags, cancel);
        if cancel.is_cancelled() {
            // The in-progress module is discarded as a whole.
            debug!(module = %path, "compilation cancelled, dropping module");
            break;
        }
        validation::validate_module(&module, diags);

        if diags.error_count() > errors_before {
            module.mark_errors();
        }
        if let Some(data) = module.as_module() {
            data.set_validated();
        }
        debug!(module = %path, has_errors = module.has_errors(), "module processed");
        modules.insert(path, module);
    }

    modules.into_values().collect()
}
