//! Statement trees.
//!
//! Statements are owned by the scope body that contains them. The checker
//! attaches folded constants (FOR step) and classification (value case vs
//! type case) through interior cells; everything else is fixed by the
//! parser.

use crate::ast::expr::{ExprRef, Value};
use crate::foundation::Loc;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Shared handle to a statement node.
pub type StmtRef = Rc<Stmt>;

/// A statement sequence.
pub type StatSeq = Vec<StmtRef>;

/// Statement variants.
#[derive(Debug)]
pub enum Stmt {
    /// A call used as a statement
    Call(CallStmt),
    /// RETURN with optional value
    Return(ReturnStmt),
    /// EXIT from the enclosing LOOP
    Exit(ExitStmt),
    /// Assignment
    Assign(AssignStmt),
    /// IF, WHILE, REPEAT, WITH, or LOOP, selected by the mode tag
    IfLoop(IfLoop),
    /// FOR loop
    For(ForStmt),
    /// Value case or type case
    Case(CaseStmt),
}

impl Stmt {
    /// Source position of the statement.
    pub fn loc(&self) -> Loc {
        match self {
            Stmt::Call(s) => s.loc,
            Stmt::Return(s) => s.loc,
            Stmt::Exit(s) => s.loc,
            Stmt::Assign(s) => s.loc,
            Stmt::IfLoop(s) => s.loc,
            Stmt::For(s) => s.loc,
            Stmt::Case(s) => s.loc,
        }
    }
}

/// A call statement.
#[derive(Debug)]
pub struct CallStmt {
    /// Source position
    pub loc: Loc,
    /// The call expression; the checker verifies it is actually a call
    pub call: ExprRef,
}

/// A RETURN statement.
#[derive(Debug)]
pub struct ReturnStmt {
    /// Source position
    pub loc: Loc,
    /// Returned value, absent in proper procedures
    pub value: Option<ExprRef>,
}

/// An EXIT statement.
#[derive(Debug)]
pub struct ExitStmt {
    /// Source position
    pub loc: Loc,
}

/// An assignment.
#[derive(Debug)]
pub struct AssignStmt {
    /// Source position
    pub loc: Loc,
    /// Assignment target; must check as an lvalue
    pub lhs: ExprRef,
    /// Assigned value
    pub rhs: ExprRef,
}

/// Mode of an [`IfLoop`] statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IfLoopOp {
    /// IF / ELSIF chain with optional ELSE
    If,
    /// WHILE loop, one guard
    While,
    /// REPEAT ... UNTIL, one guard
    Repeat,
    /// WITH regional type guard chain
    With,
    /// LOOP without guard; left only through EXIT
    Loop,
}

/// IF, WHILE, REPEAT, WITH, and LOOP share one node.
///
/// `conds` and `branches` are parallel: guard i belongs to branch i. WHILE
/// and REPEAT have exactly one guard; LOOP has none and a single branch.
/// For WITH, each guard is an `IS` test and the scrutinee's static type
/// narrows to the tested type inside the matching branch.
#[derive(Debug)]
pub struct IfLoop {
    /// Source position
    pub loc: Loc,
    /// Statement mode
    pub op: IfLoopOp,
    /// Guards, one per branch (empty for LOOP)
    pub conds: Vec<ExprRef>,
    /// Guarded branches
    pub branches: Vec<StatSeq>,
    /// ELSE branch, empty if absent
    pub els: StatSeq,
}

/// A FOR loop.
#[derive(Debug)]
pub struct ForStmt {
    /// Source position
    pub loc: Loc,
    /// Control variable occurrence
    pub control: ExprRef,
    /// Start value
    pub from: ExprRef,
    /// End value
    pub to: ExprRef,
    /// Step expression; absent means +1
    pub by: Option<ExprRef>,
    /// Loop body
    pub body: StatSeq,
    by_val: RefCell<Value>,
}

impl ForStmt {
    /// Create a FOR loop.
    pub fn new(
        loc: Loc,
        control: ExprRef,
        from: ExprRef,
        to: ExprRef,
        by: Option<ExprRef>,
        body: StatSeq,
    ) -> Self {
        Self {
            loc,
            control,
            from,
            to,
            by,
            body,
            by_val: RefCell::new(Value::Invalid),
        }
    }

    /// The folded step constant, set by the checker.
    pub fn by_val(&self) -> Value {
        self.by_val.borrow().clone()
    }

    /// Record the folded step constant.
    pub fn set_by_val(&self, value: Value) {
        *self.by_val.borrow_mut() = value;
    }
}

/// One arm of a case statement.
#[derive(Debug)]
pub struct CaseArm {
    /// Labels: constants, ranges, or type names
    pub labels: Vec<ExprRef>,
    /// Arm body
    pub body: StatSeq,
}

/// A CASE statement over an ordinal/string scrutinee, or a type case over a
/// record/pointer scrutinee. The checker classifies which.
#[derive(Debug)]
pub struct CaseStmt {
    /// Source position
    pub loc: Loc,
    /// Scrutinee expression
    pub expr: ExprRef,
    /// The arms in source order
    pub arms: Vec<CaseArm>,
    /// ELSE branch, empty if absent
    pub els: StatSeq,
    type_case: Cell<bool>,
}

impl CaseStmt {
    /// Create a case statement; classification happens during checking.
    pub fn new(loc: Loc, expr: ExprRef, arms: Vec<CaseArm>, els: StatSeq) -> Self {
        Self {
            loc,
            expr,
            arms,
            els,
            type_case: Cell::new(false),
        }
    }

    /// Whether the checker classified this as a type case.
    pub fn is_type_case(&self) -> bool {
        self.type_case.get()
    }

    /// Classify this statement as a type case.
    pub fn mark_type_case(&self) {
        self.type_case.set(true);
    }
}
