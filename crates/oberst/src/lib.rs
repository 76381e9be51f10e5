// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! # Oberst compiler front end
//!
//! Turns program source text organized into named modules into a fully
//! resolved, type-checked code model that back ends can traverse without
//! redoing name resolution or type inference.
//!
//! This crate is a facade that re-exports functionality from:
//! - `oberst-ast` - foundation types, diagnostics, and the code model
//! - `oberst-resolve` - module graph, resolution, checking, validation
//!
//! ## Architecture
//!
//! ```text
//! oberst-ast      - AST + foundation types
//!     |
//! oberst-resolve  - declaration pass, type resolver, checker, validator
//!     |
//! oberst (facade) - re-exports + the Project host API
//! ```
//!
//! The concrete lexer and parser are external collaborators: the host
//! supplies a [`UnitParser`] that turns source bytes into unresolved
//! [`RawUnit`](oberst_ast::ast::RawUnit)s, and the front end does the rest.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use oberst::{ModPath, Project};
//!
//! let mut project = Project::new(Box::new(MyParser::new()));
//! project.add_file(ModPath::parse("Main"), source)?;
//! let ok = project.parse_files(&[ModPath::parse("Main")]);
//! for diag in project.diagnostics() {
//!     eprintln!("{}", diag);
//! }
//! ```

// Re-export AST and foundation types
pub use oberst_ast::{self as ast, *};

// Re-export resolution
pub use oberst_resolve as resolve;
pub use oberst_resolve::{CancelFlag, Universe};

pub mod project;

pub use project::{Project, ProjectError, UnitParser};

/// Front-end version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
