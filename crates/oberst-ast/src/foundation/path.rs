//! Module path representation.
//!
//! Modules are addressed by dotted paths such as `Lib.Util` or `Math`.
//! The front end uses [`ModPath`] as the key of the source registry, the
//! target of import clauses, and the identity of compiled modules.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A dotted, hierarchical module path.
///
/// Paths are immutable and support efficient comparison and hashing, so
/// they can serve as map keys in the source registry and the module graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModPath {
    segments: Vec<String>,
}

impl ModPath {
    /// Create a path from segments.
    pub fn new(segments: Vec<String>) -> Self {
        Self { segments }
    }

    /// Parse a path from a dot-separated string.
    pub fn parse(s: &str) -> Self {
        Self {
            segments: s.split('.').map(String::from).collect(),
        }
    }

    /// The path segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the path has no segments.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The last segment: the plain module name.
    pub fn name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }
}

impl fmt::Display for ModPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl From<&str> for ModPath {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<String> for ModPath {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let path = ModPath::parse("Lib.Util");
        assert_eq!(path.segments(), &["Lib", "Util"]);
        assert_eq!(path.len(), 2);
        assert_eq!(path.to_string(), "Lib.Util");
    }

    #[test]
    fn test_name_is_last_segment() {
        assert_eq!(ModPath::parse("Lib.Util").name(), "Util");
        assert_eq!(ModPath::parse("Math").name(), "Math");
    }
}
