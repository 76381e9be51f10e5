//! The host-facing compilation API.
//!
//! A [`Project`] owns the source registry, the preloaded definition units,
//! the universe scope, and the diagnostics of one front end. The host
//! registers sources with [`Project::add_file`], optionally admits standard
//! library definitions with [`Project::add_preload`], and compiles with
//! [`Project::parse_files`]; afterwards [`Project::modules`] is the resolved
//! module graph in reverse topological import order.
//!
//! The front end owns no file system and persists nothing: sources arrive
//! as bytes, diagnostics leave through a sink.

use indexmap::IndexMap;
use oberst_ast::ast::{NamedRef, RawUnit};
use oberst_ast::error::{Diagnostic, DiagnosticSink, Diagnostics, ErrorKind};
use oberst_ast::foundation::{FileId, Loc, ModPath, SourceMap};
use oberst_resolve::graph::{build_graph, UnitProvider};
use oberst_resolve::pipeline::{process, CancelFlag};
use oberst_resolve::universe::Universe;
use thiserror::Error;
use tracing::debug;

/// The concrete parser, supplied by the host.
///
/// Produces the unresolved AST of one compilation unit: identifier
/// references carry their lexical name with no binding, type expressions
/// stay qualified placeholders. Parse failures surface as ordinary
/// diagnostics.
pub trait UnitParser {
    /// Parse one source text into a raw unit.
    fn parse(
        &mut self,
        file: FileId,
        path: &ModPath,
        source: &str,
    ) -> Result<RawUnit, Vec<Diagnostic>>;
}

/// Errors of the registration API.
#[derive(Debug, Error)]
pub enum ProjectError {
    /// The module path is already registered
    #[error("duplicate source path '{0}'")]
    DuplicatePath(ModPath),
    /// A preload definition failed to parse
    #[error("preload '{0}' failed to parse")]
    PreloadParse(ModPath),
}

/// One front-end instance: source registry, preloads, and compile results.
pub struct Project {
    parser: Box<dyn UnitParser>,
    sources: IndexMap<ModPath, FileId>,
    source_map: SourceMap,
    preloads: IndexMap<ModPath, RawUnit>,
    universe: Universe,
    modules: Vec<NamedRef>,
    diags: Diagnostics,
    cancel: CancelFlag,
}

impl Project {
    /// Create a project around a host-supplied parser.
    pub fn new(parser: Box<dyn UnitParser>) -> Self {
        Self {
            parser,
            sources: IndexMap::new(),
            source_map: SourceMap::new(),
            preloads: IndexMap::new(),
            universe: Universe::new(),
            modules: Vec::new(),
            diags: Diagnostics::new(),
            cancel: CancelFlag::new(),
        }
    }

    /// A handle the host may use to abort a running compilation.
    ///
    /// The flag is checked between modules and between top-level
    /// statements; the module in progress at cancellation is dropped as a
    /// whole.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Register module source text under a logical path.
    pub fn add_file(
        &mut self,
        path: ModPath,
        source: impl Into<String>,
    ) -> Result<(), ProjectError> {
        if self.sources.contains_key(&path) || self.preloads.contains_key(&path) {
            return Err(ProjectError::DuplicatePath(path));
        }
        let file = self.source_map.add_file(path.to_string(), source.into());
        self.sources.insert(path, file);
        Ok(())
    }

    /// Admit a standard library module in definition form.
    ///
    /// The definition source is parsed immediately; the module graph
    /// builder later admits the predigested unit without touching the
    /// parser again. Preloaded modules carry declarations only.
    pub fn add_preload(
        &mut self,
        name: impl Into<ModPath>,
        source: impl Into<String>,
    ) -> Result<(), ProjectError> {
        let path = name.into();
        if self.sources.contains_key(&path) || self.preloads.contains_key(&path) {
            return Err(ProjectError::DuplicatePath(path));
        }
        let file = self.source_map.add_file(path.to_string(), source.into());
        let source_text = self
            .source_map
            .file(file)
            .map(|f| f.source.clone())
            .unwrap_or_default();
        match self.parser.parse(file, &path, &source_text) {
            Ok(mut unit) => {
                unit.is_def = true;
                self.preloads.insert(path, unit);
                Ok(())
            }
            Err(parse_diags) => {
                for diag in parse_diags {
                    self.diags.push(diag);
                }
                Err(ProjectError::PreloadParse(path))
            }
        }
    }

    /// Compile the given modules and their import closure.
    ///
    /// Returns true when the run produced no error diagnostics. The
    /// resolved modules are available through [`Project::modules`] either
    /// way; modules that failed carry their error mark.
    pub fn parse_files(&mut self, roots: &[ModPath]) -> bool {
        debug!(roots = roots.len(), "compiling");
        self.modules.clear();
        let errors_before = self.diags.error_count();

        let mut provider = RegistryProvider {
            parser: &mut self.parser,
            sources: &self.sources,
            source_map: &self.source_map,
            preloads: &mut self.preloads,
        };
        let units = build_graph(roots, &mut provider, &mut self.diags, &self.cancel);
        self.modules = process(units, &self.universe, &mut self.diags, &self.cancel);

        self.diags.error_count() == errors_before
    }

    /// The resolved modules of the last compilation, imports first.
    pub fn modules(&self) -> &[NamedRef] {
        &self.modules
    }

    /// Find a resolved module by path.
    pub fn module(&self, path: &ModPath) -> Option<&NamedRef> {
        self.modules
            .iter()
            .find(|m| m.as_module().map(|d| &d.full_path == path).unwrap_or(false))
    }

    /// All diagnostics so far, in reporting order (file, row, column,
    /// insertion).
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diags.sorted()
    }

    /// Whether any error diagnostic was recorded.
    pub fn has_errors(&self) -> bool {
        self.diags.has_errors()
    }

    /// Drain all diagnostics into a host-provided sink, in reporting order.
    pub fn emit_diagnostics(&mut self, sink: &mut dyn DiagnosticSink) {
        self.diags.drain_into(sink);
    }

    /// The registered sources, for diagnostic rendering.
    pub fn source_map(&self) -> &SourceMap {
        &self.source_map
    }

    /// Drop all sources, preloads, modules and diagnostics.
    pub fn clear(&mut self) {
        self.sources.clear();
        self.source_map.clear();
        self.preloads.clear();
        self.modules.clear();
        self.diags.clear();
        self.cancel = CancelFlag::new();
    }
}

/// Feeds the module graph builder from the registry and the preloads.
struct RegistryProvider<'a> {
    parser: &'a mut Box<dyn UnitParser>,
    sources: &'a IndexMap<ModPath, FileId>,
    source_map: &'a SourceMap,
    preloads: &'a mut IndexMap<ModPath, RawUnit>,
}

impl UnitProvider for RegistryProvider<'_> {
    fn provide(&mut self, path: &ModPath) -> Result<RawUnit, Vec<Diagnostic>> {
        // Preloads were parsed at registration; admit them directly.
        if let Some(unit) = self.preloads.shift_remove(path) {
            return Ok(unit);
        }
        let Some(file) = self.sources.get(path).copied() else {
            return Err(vec![Diagnostic::error(
                ErrorKind::ModuleNotFound,
                Loc::none(),
                format!("module '{}' is not registered", path),
            )]);
        };
        let source = self
            .source_map
            .file(file)
            .map(|f| f.source.clone())
            .unwrap_or_default();
        self.parser.parse(file, path, &source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingParser;

    impl UnitParser for FailingParser {
        fn parse(
            &mut self,
            file: FileId,
            _path: &ModPath,
            _source: &str,
        ) -> Result<RawUnit, Vec<Diagnostic>> {
            Err(vec![Diagnostic::error(
                ErrorKind::Parse,
                Loc::new(file, 1, 1),
                "unexpected token".to_string(),
            )])
        }
    }

    #[test]
    fn test_duplicate_path_is_rejected() {
        let mut project = Project::new(Box::new(FailingParser));
        project
            .add_file(ModPath::parse("M"), "MODULE M; END M.")
            .unwrap();
        let err = project
            .add_file(ModPath::parse("M"), "MODULE M; END M.")
            .unwrap_err();
        assert!(matches!(err, ProjectError::DuplicatePath(_)));
    }

    #[test]
    fn test_preload_parse_failure_reports() {
        let mut project = Project::new(Box::new(FailingParser));
        let err = project.add_preload("In", "DEFINITION In; END In.").unwrap_err();
        assert!(matches!(err, ProjectError::PreloadParse(_)));
        assert!(project.has_errors());
        assert_eq!(project.diagnostics()[0].kind, ErrorKind::Parse);
    }

    #[test]
    fn test_parse_files_surfaces_parse_errors() {
        let mut project = Project::new(Box::new(FailingParser));
        project
            .add_file(ModPath::parse("M"), "MODULE M; END M.")
            .unwrap();
        let ok = project.parse_files(&[ModPath::parse("M")]);
        assert!(!ok);
        assert!(project.modules().is_empty());
        assert_eq!(project.diagnostics()[0].kind, ErrorKind::Parse);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut project = Project::new(Box::new(FailingParser));
        project
            .add_file(ModPath::parse("M"), "MODULE M; END M.")
            .unwrap();
        project.parse_files(&[ModPath::parse("M")]);
        project.clear();
        assert!(project.diagnostics().is_empty());
        assert!(project.modules().is_empty());
        assert_eq!(project.source_map().file_count(), 0);
        // The path is free again after clearing.
        project
            .add_file(ModPath::parse("M"), "MODULE M; END M.")
            .unwrap();
    }
}
