//! Expression trees.
//!
//! Expressions are produced by the concrete parser with names only; the
//! checker later resolves every identifier occurrence to its entity, attaches
//! an inferred type to every node, and annotates each occurrence with a
//! [`IdentRole`].
//!
//! The inferred type link is a weak reference. Types are owned by their
//! declaring entity (or by the module helper list for synthesized types), and
//! an owning link here would close a reference-counting cycle through
//! qualified type expressions.

use crate::ast::named::{NamedRef, WeakNamed};
use crate::ast::types::{TypeRef, WeakType};
use crate::foundation::Loc;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Shared handle to an expression node.
pub type ExprRef = Rc<Expr>;

/// Number of elements in a compile-time set value.
pub const SET_BIT_LEN: u32 = 32;

/// An expression node: source position, variant, and the inferred type.
#[derive(Debug)]
pub struct Expr {
    /// Source position
    pub loc: Loc,
    /// Expression variant
    pub kind: ExprKind,
    ty: RefCell<WeakType>,
}

impl Expr {
    /// Create an expression with no inferred type yet.
    pub fn new(loc: Loc, kind: ExprKind) -> ExprRef {
        Rc::new(Self {
            loc,
            kind,
            ty: RefCell::new(Weak::new()),
        })
    }

    /// The inferred type, if the checker has run over this node.
    pub fn ty(&self) -> Option<TypeRef> {
        self.ty.borrow().upgrade()
    }

    /// Attach the inferred type.
    pub fn set_ty(&self, ty: &TypeRef) {
        *self.ty.borrow_mut() = Rc::downgrade(ty);
    }

    /// The resolved entity behind an identifier expression, if any.
    pub fn ident(&self) -> Option<NamedRef> {
        match &self.kind {
            ExprKind::IdentLeaf(leaf) => leaf.ident(),
            ExprKind::IdentSel(sel) => sel.ident(),
            _ => None,
        }
    }

    /// The name carried by an identifier expression, if any.
    pub fn ident_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::IdentLeaf(leaf) => Some(&leaf.name),
            ExprKind::IdentSel(sel) => Some(&sel.name),
            _ => None,
        }
    }
}

/// Expression variants.
#[derive(Debug)]
pub enum ExprKind {
    /// A typed literal value
    Literal(Literal),
    /// A set constructor with elements and ranges
    Set(SetExpr),
    /// An unqualified name use
    IdentLeaf(IdentLeaf),
    /// A selection `x.f`
    IdentSel(IdentSel),
    /// A unary operation
    Unary(UnExpr),
    /// A call, index, or type-guard form with an argument list
    Arg(ArgExpr),
    /// A binary operation
    Binary(BinExpr),
}

/// Compile-time value of a literal or folded constant expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Not a compile-time constant (or a folding error)
    Invalid,
    /// Integer of any width
    Int(i64),
    /// Real of any width
    Real(f64),
    /// BOOLEAN
    Bool(bool),
    /// UTF-8 string
    Str(String),
    /// Raw byte string
    Bytes(Vec<u8>),
    /// CHAR or WCHAR codepoint
    Char(u16),
    /// NIL
    Nil,
    /// SET as an element bitset; bit `i` set means element `i` is present
    Set(u32),
}

impl Value {
    /// Whether this is a usable compile-time value.
    pub fn is_valid(&self) -> bool {
        !matches!(self, Value::Invalid)
    }

    /// The integer payload, if this is an integer value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

/// A literal value.
///
/// `str_len` is the codepoint count of a string literal plus one for the
/// trailing zero; the checker records it when it types the literal as a
/// character array.
#[derive(Debug)]
pub struct Literal {
    /// The literal value
    pub value: Value,
    /// Codepoint count + 1 for string literals, 0 otherwise
    pub str_len: Cell<u32>,
}

impl Literal {
    /// Create a literal carrying the given value.
    pub fn new(value: Value) -> Self {
        Self {
            value,
            str_len: Cell::new(0),
        }
    }
}

/// A set constructor: `{a, b..c, d}`.
///
/// Parts are single elements or `Range` binary expressions.
#[derive(Debug)]
pub struct SetExpr {
    /// Elements and ranges in source order
    pub parts: Vec<ExprRef>,
}

/// Syntactic use of an identifier occurrence.
///
/// Assigned by the checker; `Decl` is used for the defining occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentRole {
    /// Not yet assigned
    None,
    /// Defining occurrence
    Decl,
    /// Assignment target
    Lhs,
    /// Passed to a VAR or IN parameter
    VarArg,
    /// Read access
    Rhs,
    /// Reference to an overridden super method
    Super,
    /// Reference from a super method to an override
    Sub,
    /// Call target
    Call,
    /// Qualified access through an import
    Import,
    /// Receiver access
    This,
    /// Bound method access
    Method,
    /// String operand occurrence
    StringOp,
}

/// An unqualified name use, resolved by the checker.
#[derive(Debug)]
pub struct IdentLeaf {
    /// Lexical name to resolve
    pub name: String,
    ident: RefCell<WeakNamed>,
    role: Cell<IdentRole>,
}

impl IdentLeaf {
    /// Create an unresolved name use.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ident: RefCell::new(Weak::new()),
            role: Cell::new(IdentRole::None),
        }
    }

    /// The resolved entity, if resolution has happened.
    pub fn ident(&self) -> Option<NamedRef> {
        self.ident.borrow().upgrade()
    }

    /// Record the resolved entity.
    pub fn resolve_to(&self, target: &NamedRef) {
        *self.ident.borrow_mut() = Rc::downgrade(target);
    }

    /// The annotated role.
    pub fn role(&self) -> IdentRole {
        self.role.get()
    }

    /// Annotate the role of this occurrence.
    pub fn set_role(&self, role: IdentRole) {
        self.role.set(role);
    }
}

/// A selection `x.f`: a unary expression carrying the selected name.
#[derive(Debug)]
pub struct IdentSel {
    /// The expression being selected from
    pub sub: ExprRef,
    /// Lexical name to resolve in the namespace of `sub`
    pub name: String,
    ident: RefCell<WeakNamed>,
    role: Cell<IdentRole>,
}

impl IdentSel {
    /// Create an unresolved selection.
    pub fn new(sub: ExprRef, name: impl Into<String>) -> Self {
        Self {
            sub,
            name: name.into(),
            ident: RefCell::new(Weak::new()),
            role: Cell::new(IdentRole::None),
        }
    }

    /// The resolved entity, if resolution has happened.
    pub fn ident(&self) -> Option<NamedRef> {
        self.ident.borrow().upgrade()
    }

    /// Record the resolved entity.
    pub fn resolve_to(&self, target: &NamedRef) {
        *self.ident.borrow_mut() = Rc::downgrade(target);
    }

    /// The annotated role.
    pub fn role(&self) -> IdentRole {
        self.role.get()
    }

    /// Annotate the role of this occurrence.
    pub fn set_role(&self, role: IdentRole) {
        self.role.set(role);
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    /// Numeric negation
    Neg,
    /// Logical negation
    Not,
    /// Pointer dereference `p^`
    Deref,
    /// Address of an lvalue
    AddrOf,
}

/// A unary operation.
#[derive(Debug)]
pub struct UnExpr {
    /// The operator
    pub op: UnOp,
    /// The operand
    pub sub: ExprRef,
}

/// Form of an [`ArgExpr`].
///
/// The parser cannot always distinguish the three, so the checker may
/// reclassify (an index into a procedure-typed value is a call, a single
/// type-name argument on a record value is a guard).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgOp {
    /// Procedure call
    Call,
    /// Array index
    Index,
    /// Type guard `v(T)`
    Cast,
}

/// A call, index, or type-guard expression.
#[derive(Debug)]
pub struct ArgExpr {
    /// Current classification
    pub op: Cell<ArgOp>,
    /// Callee, array, or guarded value
    pub sub: ExprRef,
    /// Arguments, indices, or the guard type name
    pub args: Vec<ExprRef>,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// `a..b`, only valid in set constructors and case labels
    Range,
    /// `=`
    Eq,
    /// `#`
    Neq,
    /// `<`
    Lt,
    /// `<=`
    Leq,
    /// `>`
    Gt,
    /// `>=`
    Geq,
    /// Set membership
    In,
    /// Dynamic type test
    Is,
    /// `+` (numeric addition or set union)
    Add,
    /// `-` (numeric subtraction or set difference)
    Sub,
    /// `OR`
    Or,
    /// `*` (numeric product or set intersection)
    Mul,
    /// `/` (real division or set symmetric difference)
    Fdiv,
    /// Integer division, floored
    Div,
    /// Integer modulus, floored
    Mod,
    /// `&`
    And,
}

impl BinOp {
    /// Source-level symbol of the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Range => "..",
            BinOp::Eq => "=",
            BinOp::Neq => "#",
            BinOp::Lt => "<",
            BinOp::Leq => "<=",
            BinOp::Gt => ">",
            BinOp::Geq => ">=",
            BinOp::In => "IN",
            BinOp::Is => "IS",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Or => "OR",
            BinOp::Mul => "*",
            BinOp::Fdiv => "/",
            BinOp::Div => "DIV",
            BinOp::Mod => "MOD",
            BinOp::And => "&",
        }
    }

    /// Whether this operator yields BOOLEAN from comparable operands.
    pub fn is_relation(self) -> bool {
        matches!(
            self,
            BinOp::Eq
                | BinOp::Neq
                | BinOp::Lt
                | BinOp::Leq
                | BinOp::Gt
                | BinOp::Geq
                | BinOp::In
                | BinOp::Is
        )
    }
}

/// A binary operation.
#[derive(Debug)]
pub struct BinExpr {
    /// The operator
    pub op: BinOp,
    /// Left operand
    pub lhs: ExprRef,
    /// Right operand
    pub rhs: ExprRef,
}
