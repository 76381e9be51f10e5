//! Foundation types shared across the front end.

pub mod loc;
pub mod path;

pub use loc::{FileId, Loc, SourceFile, SourceMap};
pub use path::ModPath;
