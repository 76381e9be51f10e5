// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! AST types for the Oberst front end
//!
//! Oberst is a statically typed, modular, block-structured language in the
//! Oberon family. This crate contains the code model the front end produces:
//! foundation types (source locations, module paths), diagnostics, and the
//! node taxonomy for types, named entities, statements and expressions,
//! together with tree walking and pretty printing.
//!
//! The model is a directed graph. Parent-to-child links own their children
//! (`Rc`), child-to-parent and cross links are weak back-pointers (`Weak`),
//! so the graph stays acyclic in the ownership dimension even though it is
//! cyclic in the reference dimension.

pub mod ast;
pub mod error;
pub mod foundation;

// Re-export commonly used types
pub use error::{Diagnostic, DiagnosticFormatter, DiagnosticSink, Diagnostics, ErrorKind, Severity};
pub use foundation::{FileId, Loc, ModPath, SourceFile, SourceMap};

pub use ast::*;
