//! Parser-facing compilation units.
//!
//! The concrete parser is an external collaborator. It produces a [`RawUnit`]
//! per source text: declaration stubs in source order, import clauses, and
//! the module initializer, with every identifier reference carrying only its
//! lexical name and every type expression left as a qualified placeholder.
//! The declaration pass turns a raw unit into a module entity; later passes
//! resolve and check it in place.

use crate::ast::named::NamedRef;
use crate::ast::stmt::StatSeq;
use crate::ast::types::TypeRef;
use crate::foundation::{FileId, Loc, ModPath};

/// An unresolved compilation unit as delivered by the parser.
#[derive(Debug)]
pub struct RawUnit {
    /// Full dotted path of the module
    pub path: ModPath,
    /// Source file the unit was parsed from
    pub file: FileId,
    /// Position of the module header
    pub loc: Loc,
    /// Whether this is a definition module (declarations only, no bodies)
    pub is_def: bool,
    /// Generic meta parameters of a generic module
    pub meta_params: Vec<NamedRef>,
    /// Import clauses in source order
    pub imports: Vec<RawImport>,
    /// Declarations in source order: constants, types, variables, procedures
    pub decls: Vec<NamedRef>,
    /// Module initializer
    pub body: StatSeq,
}

/// An import clause as written in source.
#[derive(Debug)]
pub struct RawImport {
    /// Local name: the alias if present, the last path segment otherwise
    pub alias: Option<String>,
    /// Position of the alias, if one was written
    pub alias_loc: Option<Loc>,
    /// Dotted path of the imported module
    pub path: ModPath,
    /// Generic actual types for instantiating imports
    pub actuals: Vec<TypeRef>,
    /// Position of the clause
    pub loc: Loc,
}

impl RawImport {
    /// The name the import is known by inside the importing module.
    pub fn local_name(&self) -> &str {
        self.alias.as_deref().unwrap_or_else(|| self.path.name())
    }
}
