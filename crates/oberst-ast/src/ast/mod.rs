//! The code model: types, named entities, expressions and statements.

pub mod expr;
pub mod named;
pub mod pretty;
pub mod raw;
pub mod stmt;
pub mod types;
pub mod walk;

pub use expr::*;
pub use named::*;
pub use raw::*;
pub use stmt::*;
pub use types::*;
pub use walk::{walk_expr, walk_stmts};
