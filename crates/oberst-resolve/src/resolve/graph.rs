//! Module graph builder.
//!
//! Loads the requested compilation units, follows their import clauses
//! recursively, rejects cycles, and yields the units in reverse topological
//! order so that downstream passes always process imports before importers.
//!
//! A cycle through an import that carries generic actuals is a generic
//! instantiation cycle and reported as such; a plain cycle is a module
//! cycle. Units that fail to load are reported once and skipped; importers
//! notice the missing module during the declaration pass.

use crate::resolve::pipeline::CancelFlag;
use oberst_ast::ast::RawUnit;
use oberst_ast::error::{Diagnostic, Diagnostics, ErrorKind};
use oberst_ast::foundation::{Loc, ModPath};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Source of compilation units, supplied by the host.
///
/// The builder calls `provide` at most once per distinct module path;
/// preloaded definition units are returned like any other unit.
pub trait UnitProvider {
    /// Fetch and parse the unit at `path`.
    fn provide(&mut self, path: &ModPath) -> Result<RawUnit, Vec<Diagnostic>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadState {
    Loading,
    Done,
    Failed,
}

struct GraphBuilder<'a> {
    provider: &'a mut dyn UnitProvider,
    diags: &'a mut Diagnostics,
    states: HashMap<ModPath, LoadState>,
    /// Active DFS path; the flag records whether the import edge that
    /// entered the module carried generic actuals.
    stack: Vec<(ModPath, bool)>,
    order: Vec<RawUnit>,
    reported_missing: HashSet<ModPath>,
}

/// Load `roots` and their import closure, in reverse topological order.
pub fn build_graph(
    roots: &[ModPath],
    provider: &mut dyn UnitProvider,
    diags: &mut Diagnostics,
    cancel: &CancelFlag,
) -> Vec<RawUnit> {
    let mut builder = GraphBuilder {
        provider,
        diags,
        states: HashMap::new(),
        stack: Vec::new(),
        order: Vec::new(),
        reported_missing: HashSet::new(),
    };
    for root in roots {
        if cancel.is_cancelled() {
            break;
        }
        builder.visit(root, false, Loc::none());
    }
    builder.order
}

impl GraphBuilder<'_> {
    fn visit(&mut self, path: &ModPath, edge_has_actuals: bool, edge_loc: Loc) {
        match self.states.get(path) {
            Some(LoadState::Done) | Some(LoadState::Failed) => return,
            Some(LoadState::Loading) => {
                self.report_cycle(path, edge_has_actuals, edge_loc);
                return;
            }
            None => {}
        }

        let unit = match self.provider.provide(path) {
            Ok(unit) => unit,
            Err(load_diags) => {
                if self.reported_missing.insert(path.clone()) {
                    for diag in load_diags {
                        self.diags.push(diag);
                    }
                }
                self.states.insert(path.clone(), LoadState::Failed);
                return;
            }
        };
        debug!(module = %path, imports = unit.imports.len(), "loaded unit");

        self.states.insert(path.clone(), LoadState::Loading);
        self.stack.push((path.clone(), edge_has_actuals));

        let imports: Vec<(ModPath, bool, Loc)> = unit
            .imports
            .iter()
            .map(|imp| (imp.path.clone(), !imp.actuals.is_empty(), imp.loc))
            .collect();
        for (target, has_actuals, loc) in imports {
            self.visit(&target, has_actuals, loc);
        }

        self.stack.pop();
        self.states.insert(path.clone(), LoadState::Done);
        self.order.push(unit);
    }

    /// Report the cycle closing at `path`.
    fn report_cycle(&mut self, path: &ModPath, closing_has_actuals: bool, edge_loc: Loc) {
        let start = self
            .stack
            .iter()
            .position(|(p, _)| p == path)
            .unwrap_or(0);
        let members: Vec<&ModPath> = self.stack[start..].iter().map(|(p, _)| p).collect();

        // Any generic edge on the cycle makes it an instantiation cycle.
        let generic = closing_has_actuals
            || self.stack[start + 1..].iter().any(|(_, actuals)| *actuals);
        let kind = if generic {
            ErrorKind::GenericCycle
        } else {
            ErrorKind::ModuleCycle
        };

        let chain = members
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(" -> ");
        self.diags.error(
            kind,
            edge_loc,
            format!("import cycle: {} -> {}", chain, path),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oberst_ast::ast::{RawImport, RawUnit};

    struct MapProvider {
        units: HashMap<ModPath, Vec<(ModPath, bool)>>,
    }

    impl MapProvider {
        fn new(edges: &[(&str, &[(&str, bool)])]) -> Self {
            let mut units = HashMap::new();
            for (name, imports) in edges {
                units.insert(
                    ModPath::parse(name),
                    imports
                        .iter()
                        .map(|(target, generic)| (ModPath::parse(target), *generic))
                        .collect(),
                );
            }
            Self { units }
        }
    }

    impl UnitProvider for MapProvider {
        fn provide(&mut self, path: &ModPath) -> Result<RawUnit, Vec<Diagnostic>> {
            let imports = self.units.remove(path).ok_or_else(|| {
                vec![Diagnostic::error(
                    ErrorKind::ModuleNotFound,
                    Loc::none(),
                    format!("module '{}' is not registered", path),
                )]
            })?;
            Ok(RawUnit {
                path: path.clone(),
                file: 0,
                loc: Loc::none(),
                is_def: false,
                meta_params: vec![],
                imports: imports
                    .into_iter()
                    .map(|(target, generic)| RawImport {
                        alias: None,
                        alias_loc: None,
                        path: target,
                        actuals: if generic {
                            vec![oberst_ast::ast::BaseType::intern(
                                oberst_ast::ast::BaseKind::Integer,
                            )]
                        } else {
                            vec![]
                        },
                        loc: Loc::new(0, 1, 1),
                    })
                    .collect(),
                decls: vec![],
                body: vec![],
            })
        }
    }

    fn paths(order: &[RawUnit]) -> Vec<String> {
        order.iter().map(|u| u.path.to_string()).collect()
    }

    #[test]
    fn test_imports_come_before_importers() {
        let mut provider = MapProvider::new(&[
            ("A", &[("B", false), ("C", false)]),
            ("B", &[("C", false)]),
            ("C", &[]),
        ]);
        let mut diags = Diagnostics::new();
        let order = build_graph(
            &[ModPath::parse("A")],
            &mut provider,
            &mut diags,
            &CancelFlag::new(),
        );

        assert!(diags.is_empty());
        assert_eq!(paths(&order), vec!["C", "B", "A"]);
    }

    #[test]
    fn test_module_cycle_is_reported() {
        let mut provider =
            MapProvider::new(&[("A", &[("B", false)]), ("B", &[("A", false)])]);
        let mut diags = Diagnostics::new();
        build_graph(
            &[ModPath::parse("A")],
            &mut provider,
            &mut diags,
            &CancelFlag::new(),
        );

        let sorted = diags.sorted();
        assert_eq!(sorted.len(), 1);
        assert_eq!(sorted[0].kind, ErrorKind::ModuleCycle);
    }

    #[test]
    fn test_generic_edge_classifies_cycle() {
        let mut provider = MapProvider::new(&[("A", &[("B", false)]), ("B", &[("A", true)])]);
        let mut diags = Diagnostics::new();
        build_graph(
            &[ModPath::parse("A")],
            &mut provider,
            &mut diags,
            &CancelFlag::new(),
        );

        let sorted = diags.sorted();
        assert_eq!(sorted.len(), 1);
        assert_eq!(sorted[0].kind, ErrorKind::GenericCycle);
    }

    #[test]
    fn test_missing_module_reported_once() {
        let mut provider = MapProvider::new(&[
            ("A", &[("Gone", false)]),
            ("B", &[("Gone", false)]),
        ]);
        let mut diags = Diagnostics::new();
        let order = build_graph(
            &[ModPath::parse("A"), ModPath::parse("B")],
            &mut provider,
            &mut diags,
            &CancelFlag::new(),
        );

        // Both A and B still load; the missing import is reported once.
        assert_eq!(paths(&order), vec!["A", "B"]);
        let missing: Vec<_> = diags
            .iter()
            .filter(|d| d.kind == ErrorKind::ModuleNotFound)
            .collect();
        assert_eq!(missing.len(), 1);
    }

    #[test]
    fn test_diamond_loads_each_unit_once() {
        let mut provider = MapProvider::new(&[
            ("Top", &[("L", false), ("R", false)]),
            ("L", &[("Base", false)]),
            ("R", &[("Base", false)]),
            ("Base", &[]),
        ]);
        let mut diags = Diagnostics::new();
        let order = build_graph(
            &[ModPath::parse("Top")],
            &mut provider,
            &mut diags,
            &CancelFlag::new(),
        );

        assert!(diags.is_empty());
        assert_eq!(paths(&order), vec!["Base", "L", "R", "Top"]);
    }
}
