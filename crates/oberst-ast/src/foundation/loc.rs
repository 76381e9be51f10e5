//! Source location tracking for error reporting.
//!
//! Every node in the code model carries a [`Loc`]: the source file it came
//! from plus a 1-based row and column. The [`SourceMap`] keeps the text of
//! all registered files so diagnostics can render the offending line.
//!
//! # Design
//!
//! - `Loc` - compact (file, row, column) position
//! - `SourceMap` - manages all source files and provides lookup operations
//! - `SourceFile` - single source file with line indexing

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index into [`SourceMap::files`]. Position 0 is the first registered file.
pub type FileId = u16;

/// Compact source position.
///
/// Row and column are 1-based; row 0 means "position unknown" (used for
/// synthesized nodes such as interned base types).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Loc {
    /// File the position belongs to
    pub file: FileId,
    /// 1-based source row, 0 if unknown
    pub row: u32,
    /// 1-based source column, 0 if unknown
    pub col: u32,
}

impl Loc {
    /// Create a new position.
    pub fn new(file: FileId, row: u32, col: u32) -> Self {
        Self { file, row, col }
    }

    /// Position for synthesized nodes that have no source text.
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether this position points at real source text.
    pub fn is_valid(&self) -> bool {
        self.row > 0
    }
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.col)
    }
}

/// Collection of all source files in a compilation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceMap {
    files: Vec<SourceFile>,
}

/// A single source file with line indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    /// Logical path of this file (the module path as registered)
    pub path: String,
    /// Original source text
    pub source: String,
    /// Byte offsets of each line start; `line_starts[0]` is always 0 and the
    /// last entry is an EOF sentinel
    line_starts: Vec<u32>,
}

impl SourceMap {
    /// Create an empty source map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source file and return its id.
    pub fn add_file(&mut self, path: impl Into<String>, source: impl Into<String>) -> FileId {
        let file_id = self.files.len();
        assert!(file_id < u16::MAX as usize, "too many source files");
        self.files.push(SourceFile::new(path.into(), source.into()));
        file_id as FileId
    }

    /// Get a file by id, if registered.
    pub fn file(&self, id: FileId) -> Option<&SourceFile> {
        self.files.get(id as usize)
    }

    /// Get the logical path of a file; "<unknown>" for unregistered ids.
    pub fn file_path(&self, id: FileId) -> &str {
        self.file(id).map_or("<unknown>", |f| f.path.as_str())
    }

    /// Number of registered files.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Drop all registered files.
    pub fn clear(&mut self) {
        self.files.clear();
    }
}

impl SourceFile {
    /// Create a new source file with precomputed line starts.
    pub fn new(path: String, source: String) -> Self {
        let line_starts = compute_line_starts(&source);
        Self {
            path,
            source,
            line_starts,
        }
    }

    /// Get the text of a specific line (1-based), without the trailing
    /// newline. Returns `None` when the line number is out of bounds.
    pub fn line_text(&self, line: u32) -> Option<&str> {
        if line == 0 || line as usize >= self.line_starts.len() {
            return None;
        }
        let start = self.line_starts[(line - 1) as usize] as usize;
        let end = self.line_starts[line as usize] as usize;
        Some(self.source[start..end].trim_end_matches(['\n', '\r']))
    }

    /// Number of lines in this file.
    pub fn line_count(&self) -> usize {
        self.line_starts.len() - 1
    }
}

/// Compute byte offsets of line starts in source text.
///
/// The returned vector always carries at least the initial 0 plus an EOF
/// sentinel, so `line_starts.len() - 1` is the line count.
fn compute_line_starts(source: &str) -> Vec<u32> {
    let mut line_starts = vec![0];
    for (idx, ch) in source.char_indices() {
        if ch == '\n' {
            line_starts.push((idx + 1) as u32);
        }
    }
    if line_starts.last() != Some(&(source.len() as u32)) {
        line_starts.push(source.len() as u32);
    }
    line_starts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loc_display() {
        let loc = Loc::new(0, 12, 4);
        assert_eq!(loc.to_string(), "12:4");
        assert!(loc.is_valid());
        assert!(!Loc::none().is_valid());
    }

    #[test]
    fn test_compute_line_starts() {
        assert_eq!(compute_line_starts("a\nbb\nccc"), vec![0, 2, 5, 8]);
        assert_eq!(compute_line_starts("a\n"), vec![0, 2]);
        assert_eq!(compute_line_starts(""), vec![0]);
    }

    #[test]
    fn test_source_file_lines() {
        let file = SourceFile::new("M".into(), "MODULE M;\nEND M.\n".into());
        assert_eq!(file.line_count(), 2);
        assert_eq!(file.line_text(1), Some("MODULE M;"));
        assert_eq!(file.line_text(2), Some("END M."));
        assert_eq!(file.line_text(3), None);
        assert_eq!(file.line_text(0), None);
    }

    #[test]
    fn test_source_map() {
        let mut map = SourceMap::new();
        let id = map.add_file("Lib.Util", "MODULE Util; END Util.");
        assert_eq!(map.file_count(), 1);
        assert_eq!(map.file_path(id), "Lib.Util");
        assert_eq!(map.file_path(7), "<unknown>");
        map.clear();
        assert_eq!(map.file_count(), 0);
    }
}
