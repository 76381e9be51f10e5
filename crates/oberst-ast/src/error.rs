//! Diagnostics for the front end.
//!
//! Every problem the front end detects becomes a [`Diagnostic`]: a stable
//! kind code, a severity, a source position, a printable message, and
//! optional notes. Diagnostics are collected by a [`Diagnostics`] list (or
//! any host-provided [`DiagnosticSink`]) and reported in deterministic
//! order: source file, then row, then column, then insertion order.
//!
//! # Design
//!
//! - `Diagnostic` - single finding with location and message
//! - `ErrorKind` - stable kind codes, one per detectable condition
//! - `Severity` - error or warning
//! - `DiagnosticFormatter` - renders diagnostics with source snippets

use crate::foundation::{Loc, SourceMap};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single finding with source location and message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Category of this finding
    pub kind: ErrorKind,
    /// Severity level
    pub severity: Severity,
    /// Primary source position
    pub loc: Loc,
    /// Human-readable message
    pub message: String,
    /// Additional notes or hints
    pub notes: Vec<String>,
}

/// Category of a diagnostic, with a stable string code per kind.
///
/// # Invariant
///
/// The discriminant values must match the `ERROR_KIND_CODES` array indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ErrorKind {
    // Parse stage (surfaced from the external parser)
    /// Syntax error reported by the concrete parser
    Parse = 0,

    // Source registry and module graph
    /// A source path was registered twice
    DuplicatePath = 1,
    /// An imported module is neither registered nor preloaded
    ModuleNotFound = 2,
    /// The import graph contains a cycle
    ModuleCycle = 3,
    /// A generic module instantiation recurses into itself
    GenericCycle = 4,
    /// An imported module failed to compile
    ImportBroken = 5,

    // Declarations and name resolution
    /// Two entities with the same name in one scope
    DuplicateName = 6,
    /// An identifier does not resolve to any entity
    UnresolvedIdent = 7,
    /// A qualified entity is not exported by its module
    NotExported = 8,
    /// Write access to an entity exported read-only
    ReadonlyViolation = 9,

    // Type resolution
    /// A type refers to itself outside a pointer or composite position
    IllegalSelfRef = 10,
    /// Pointer target is neither a record nor an array
    PointerBaseIllegal = 11,
    /// Record base does not resolve to a record
    RecordBaseIllegal = 12,
    /// Array length is not a constant integer >= 1
    ArrayLengthError = 13,
    /// Record extension chain exceeds the supported depth
    ExtensionTooDeep = 14,

    // Expression and statement checking
    /// Operand or expression type does not fit the context
    TypeMismatch = 15,
    /// Right side is not assignable to the left side
    AssignIncompatible = 16,
    /// Wrong number of call arguments or indices
    ArityMismatch = 17,
    /// An actual argument does not fit its formal parameter
    ParamIncompatible = 18,
    /// Call target is not of procedure type
    NotCallable = 19,
    /// Index base is not an array
    NotIndexable = 20,
    /// Type guard target is not an extension of the static type
    InvalidGuard = 21,
    /// A range occurs outside a set constructor or case labels
    RangeMisuse = 22,
    /// Case labels overlap or repeat
    CaseLabelOverlap = 23,
    /// EXIT occurs outside a LOOP statement
    ExitOutsideLoop = 24,
    /// FOR step constant is zero
    ForStepZero = 25,
    /// A constant expression is required
    ConstExpected = 26,
    /// Assignment target is not an lvalue
    NotLvalue = 27,

    // Validation
    /// A value-returning procedure may fall off the end
    MissingReturn = 28,
    /// Method override signature differs from the overridden method
    OverrideSignatureMismatch = 29,
    /// Method override narrows the overridden method's visibility
    OverrideVisibilityNarrow = 30,
    /// An import is never used
    UnusedImport = 31,

    // Generic
    /// Internal front-end error
    Internal = 32,
}

/// Stable string codes for error kinds.
///
/// Index matches the `ErrorKind` discriminant.
const ERROR_KIND_CODES: &[&str] = &[
    "parse-error",                 // 0: Parse
    "duplicate-path",              // 1: DuplicatePath
    "module-not-found",            // 2: ModuleNotFound
    "module-cycle",                // 3: ModuleCycle
    "generic-cycle",               // 4: GenericCycle
    "import-broken",               // 5: ImportBroken
    "duplicate-name",              // 6: DuplicateName
    "unresolved-ident",            // 7: UnresolvedIdent
    "not-exported",                // 8: NotExported
    "readonly-violation",          // 9: ReadonlyViolation
    "illegal-self-ref",            // 10: IllegalSelfRef
    "pointer-base-illegal",        // 11: PointerBaseIllegal
    "record-base-illegal",         // 12: RecordBaseIllegal
    "array-length-error",          // 13: ArrayLengthError
    "extension-too-deep",          // 14: ExtensionTooDeep
    "type-mismatch",               // 15: TypeMismatch
    "assign-incompatible",         // 16: AssignIncompatible
    "arity-mismatch",              // 17: ArityMismatch
    "param-incompatible",          // 18: ParamIncompatible
    "not-callable",                // 19: NotCallable
    "not-indexable",               // 20: NotIndexable
    "invalid-guard",               // 21: InvalidGuard
    "range-misuse",                // 22: RangeMisuse
    "case-label-overlap",          // 23: CaseLabelOverlap
    "exit-outside-loop",           // 24: ExitOutsideLoop
    "for-step-zero",               // 25: ForStepZero
    "const-expected",              // 26: ConstExpected
    "not-lvalue",                  // 27: NotLvalue
    "missing-return",              // 28: MissingReturn
    "override-signature-mismatch", // 29: OverrideSignatureMismatch
    "override-visibility-narrow",  // 30: OverrideVisibilityNarrow
    "unused-import",               // 31: UnusedImport
    "internal",                    // 32: Internal
];

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Code is accepted but suspicious
    Warning,
    /// Compilation of the module failed
    Error,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(kind: ErrorKind, loc: Loc, message: impl Into<String>) -> Self {
        Self::with_severity(kind, Severity::Error, loc, message)
    }

    /// Create a new warning diagnostic.
    pub fn warning(kind: ErrorKind, loc: Loc, message: impl Into<String>) -> Self {
        Self::with_severity(kind, Severity::Warning, loc, message)
    }

    fn with_severity(
        kind: ErrorKind,
        severity: Severity,
        loc: Loc,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            loc,
            message: message.into(),
            notes: Vec::new(),
        }
    }

    /// Add a note or hint. Returns self for chaining.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

impl ErrorKind {
    /// The stable string code for this kind.
    pub fn code(self) -> &'static str {
        ERROR_KIND_CODES[self as usize]
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}: {}",
            self.severity,
            self.kind.code(),
            self.message
        )
    }
}

impl std::error::Error for Diagnostic {}

/// Receiver for diagnostics, implemented by the host or by [`Diagnostics`].
pub trait DiagnosticSink {
    /// Accept one diagnostic.
    fn report(&mut self, diag: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diag: Diagnostic) {
        self.push(diag);
    }
}

/// Ordered diagnostic collector.
///
/// Keeps insertion order; [`Diagnostics::sorted`] yields the deterministic
/// reporting order (file, row, column, insertion), relying on a stable sort
/// for the insertion tiebreak.
#[derive(Debug, Default)]
pub struct Diagnostics {
    list: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error.
    pub fn error(&mut self, kind: ErrorKind, loc: Loc, message: impl Into<String>) {
        self.list.push(Diagnostic::error(kind, loc, message));
    }

    /// Record a warning.
    pub fn warning(&mut self, kind: ErrorKind, loc: Loc, message: impl Into<String>) {
        self.list.push(Diagnostic::warning(kind, loc, message));
    }

    /// Record a prebuilt diagnostic.
    pub fn push(&mut self, diag: Diagnostic) {
        self.list.push(diag);
    }

    /// Number of error-severity diagnostics recorded so far.
    ///
    /// Passes compare this before and after running over a module to decide
    /// whether the module must be marked broken.
    pub fn error_count(&self) -> usize {
        self.list
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    /// Whether any error-severity diagnostic was recorded.
    pub fn has_errors(&self) -> bool {
        self.list.iter().any(|d| d.severity == Severity::Error)
    }

    /// Number of recorded diagnostics.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Whether the collector is empty.
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// The diagnostics in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.list.iter()
    }

    /// The diagnostics in reporting order: file, row, column, insertion.
    pub fn sorted(&self) -> Vec<Diagnostic> {
        let mut out = self.list.clone();
        out.sort_by_key(|d| (d.loc.file, d.loc.row, d.loc.col));
        out
    }

    /// Drain all diagnostics, in reporting order, into a sink.
    pub fn drain_into(&mut self, sink: &mut dyn DiagnosticSink) {
        for diag in self.sorted() {
            sink.report(diag);
        }
        self.list.clear();
    }

    /// Drop all recorded diagnostics.
    pub fn clear(&mut self) {
        self.list.clear();
    }
}

impl DiagnosticSink for Diagnostics {
    fn report(&mut self, diag: Diagnostic) {
        self.list.push(diag);
    }
}

/// Formats diagnostics with source code context.
///
/// Produces messages with the file path, row/column position, the source
/// line, and a caret marker under the reported column.
pub struct DiagnosticFormatter<'a> {
    sources: &'a SourceMap,
}

impl<'a> DiagnosticFormatter<'a> {
    /// Create a formatter over the given sources.
    pub fn new(sources: &'a SourceMap) -> Self {
        Self { sources }
    }

    /// Format a single diagnostic.
    pub fn format(&self, diag: &Diagnostic) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{}: {}: {}\n",
            diag.severity,
            diag.kind.code(),
            diag.message
        ));

        let path = self.sources.file_path(diag.loc.file);
        out.push_str(&format!(
            "  --> {}:{}:{}\n",
            path, diag.loc.row, diag.loc.col
        ));

        if let Some(file) = self.sources.file(diag.loc.file) {
            if let Some(line) = file.line_text(diag.loc.row) {
                out.push_str("   |\n");
                out.push_str(&format!("{:3} | {}\n", diag.loc.row, line));
                let pad = " ".repeat((diag.loc.col as usize).saturating_sub(1));
                out.push_str(&format!("   | {}^\n", pad));
            }
        }

        for note in &diag.notes {
            out.push_str(&format!("   = note: {}\n", note));
        }

        out
    }

    /// Format multiple diagnostics separated by blank lines.
    pub fn format_all(&self, diags: &[Diagnostic]) -> String {
        diags
            .iter()
            .map(|d| self.format(d))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
