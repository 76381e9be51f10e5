//! The type graph.
//!
//! Types form a directed graph that is cyclic in the reference dimension
//! (records reference pointers that reference records, bases link to
//! sub-records) but acyclic in the ownership dimension:
//!
//! - A declaring entity owns its type (`Rc`), composite types own their
//!   components (pointer target, array element, record fields, formals).
//! - Resolution links point the other way and are weak: a qualified type
//!   reference resolves to a type owned elsewhere, a record knows its base
//!   record and sub-records without owning them, an anonymous record knows
//!   the pointer it is bound to.
//!
//! Primitive base types are interned singletons per kind, shared across all
//! modules of a front end. They are immutable, so sharing is safe; the front
//! end is single threaded, so the intern table is thread local.

use crate::ast::expr::ExprRef;
use crate::ast::named::{NamedRef, WeakNamed};
use crate::foundation::Loc;
use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

/// Shared handle to a type node.
pub type TypeRef = Rc<Type>;

/// Non-owning handle to a type node.
pub type WeakType = Weak<Type>;

/// A type node: the variant plus a back-link to the declaring entity.
///
/// The back-link is set for types introduced by a type declaration and left
/// empty for anonymous types; the pretty printer uses it to render declared
/// types by name.
#[derive(Debug)]
pub struct Type {
    ident: RefCell<WeakNamed>,
    visited: Cell<bool>,
    /// The type variant
    pub kind: TypeKind,
}

/// Type variants.
///
/// `Generic` and `ModuleRef` are pseudo-types: the former stands for a
/// generic meta parameter used as a type, the latter is the type of an
/// import name in qualified access. Neither denotes a value representation.
#[derive(Debug)]
pub enum TypeKind {
    /// Primitive type
    Base(BaseType),
    /// Indirection to a record or array
    Pointer(Pointer),
    /// Fixed-length or open array
    Array(Array),
    /// Product type with fields, methods, and optional base record
    Record(Record),
    /// Procedure signature
    Proc(ProcType),
    /// A named type reference, resolved by the type resolver
    Quali(QualiType),
    /// Ordered named constants
    Enum(Enumeration),
    /// A generic meta parameter used as a type
    Generic(GenericType),
    /// The pseudo-type of an import name
    ModuleRef(ModuleRefType),
}

impl Type {
    /// Wrap a variant into a shared type node.
    pub fn new(kind: TypeKind) -> TypeRef {
        Rc::new(Self {
            ident: RefCell::new(Weak::new()),
            visited: Cell::new(false),
            kind,
        })
    }

    /// Whether the type resolver has completed this node.
    ///
    /// The marker lives on the node so that a record resolved in its home
    /// module is never re-resolved when an importer reaches it.
    pub fn is_visited(&self) -> bool {
        self.visited.get()
    }

    /// Mark this node as fully resolved.
    pub fn mark_visited(&self) {
        self.visited.set(true);
    }

    /// The declaring entity, if this type was introduced by a declaration.
    pub fn ident(&self) -> Option<NamedRef> {
        self.ident.borrow().upgrade()
    }

    /// Link this type to its declaring entity.
    pub fn set_ident(&self, ident: &NamedRef) {
        *self.ident.borrow_mut() = Rc::downgrade(ident);
    }

    /// Source position of the type expression, if any.
    pub fn loc(&self) -> Loc {
        match &self.kind {
            TypeKind::Base(_) | TypeKind::Generic(_) | TypeKind::ModuleRef(_) => Loc::none(),
            TypeKind::Pointer(p) => p.loc,
            TypeKind::Array(a) => a.loc,
            TypeKind::Record(r) => r.loc,
            TypeKind::Proc(p) => p.loc,
            TypeKind::Quali(q) => q.loc,
            TypeKind::Enum(e) => e.loc,
        }
    }

    /// Short name of the variant, for messages.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            TypeKind::Base(b) => b.kind.name(),
            TypeKind::Pointer(_) => "pointer",
            TypeKind::Array(_) => "array",
            TypeKind::Record(_) => "record",
            TypeKind::Proc(_) => "procedure type",
            TypeKind::Quali(_) => "named type reference",
            TypeKind::Enum(_) => "enumeration",
            TypeKind::Generic(_) => "generic parameter",
            TypeKind::ModuleRef(_) => "module",
        }
    }

    /// Records and arrays are structured; everything else is not.
    pub fn is_structured(&self) -> bool {
        matches!(self.kind, TypeKind::Record(_) | TypeKind::Array(_))
    }

    /// The base-type variant, if this is a primitive.
    pub fn as_base(&self) -> Option<&BaseType> {
        match &self.kind {
            TypeKind::Base(b) => Some(b),
            _ => None,
        }
    }

    /// The base kind, if this is a primitive.
    pub fn base_kind(&self) -> Option<BaseKind> {
        self.as_base().map(|b| b.kind)
    }

    /// The pointer variant, if any.
    pub fn as_pointer(&self) -> Option<&Pointer> {
        match &self.kind {
            TypeKind::Pointer(p) => Some(p),
            _ => None,
        }
    }

    /// The array variant, if any.
    pub fn as_array(&self) -> Option<&Array> {
        match &self.kind {
            TypeKind::Array(a) => Some(a),
            _ => None,
        }
    }

    /// The record variant, if any.
    pub fn as_record(&self) -> Option<&Record> {
        match &self.kind {
            TypeKind::Record(r) => Some(r),
            _ => None,
        }
    }

    /// The procedure-type variant, if any.
    pub fn as_proc(&self) -> Option<&ProcType> {
        match &self.kind {
            TypeKind::Proc(p) => Some(p),
            _ => None,
        }
    }

    /// The qualified-reference variant, if any.
    pub fn as_quali(&self) -> Option<&QualiType> {
        match &self.kind {
            TypeKind::Quali(q) => Some(q),
            _ => None,
        }
    }

    /// The enumeration variant, if any.
    pub fn as_enum(&self) -> Option<&Enumeration> {
        match &self.kind {
            TypeKind::Enum(e) => Some(e),
            _ => None,
        }
    }

    /// Short printable form of the type.
    ///
    /// Declared types render as their name; anonymous composites render
    /// structurally one level deep.
    pub fn pretty(&self) -> String {
        if let Some(ident) = self.ident() {
            return ident.name.clone();
        }
        match &self.kind {
            TypeKind::Base(b) => b.kind.name().to_string(),
            TypeKind::Pointer(p) => format!("POINTER TO {}", p.to.pretty()),
            TypeKind::Array(a) => {
                if a.is_open() {
                    format!("ARRAY OF {}", a.elem.pretty())
                } else {
                    format!("ARRAY {} OF {}", a.len(), a.elem.pretty())
                }
            }
            TypeKind::Record(_) => "RECORD".to_string(),
            TypeKind::Proc(_) => "PROCEDURE".to_string(),
            TypeKind::Quali(q) => q.text(),
            TypeKind::Enum(_) => "enumeration".to_string(),
            TypeKind::Generic(g) => g
                .param()
                .map(|p| p.name.clone())
                .unwrap_or_else(|| "?".to_string()),
            TypeKind::ModuleRef(_) => "MODULE".to_string(),
        }
    }
}

/// Kinds of primitive types.
///
/// `Undef` is the sentinel attached to expressions whose checking failed; it
/// is compatible with nothing and suppresses follow-up diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseKind {
    /// Sentinel for failed checking
    Undef,
    /// Compatible with every type; the static type of NIL-like holes
    Any,
    /// The type of the NIL literal
    Nil,
    /// Immutable UTF-8 byte string
    Str,
    /// Immutable 16-bit codepoint string
    WStr,
    /// BOOLEAN
    Bool,
    /// 8-bit character
    Char,
    /// 16-bit character
    WChar,
    /// Unsigned 8-bit integer
    Byte,
    /// Signed 8-bit integer
    ShortInt,
    /// Signed 32-bit integer
    Integer,
    /// Signed 64-bit integer
    LongInt,
    /// 32-bit floating point
    Real,
    /// 64-bit floating point
    LongReal,
    /// Bitset over 0..31
    Set,
}

impl BaseKind {
    /// Source-level name of the kind.
    pub fn name(self) -> &'static str {
        match self {
            BaseKind::Undef => "UNDEFINED",
            BaseKind::Any => "ANY",
            BaseKind::Nil => "NIL",
            BaseKind::Str => "STRING",
            BaseKind::WStr => "WSTRING",
            BaseKind::Bool => "BOOLEAN",
            BaseKind::Char => "CHAR",
            BaseKind::WChar => "WCHAR",
            BaseKind::Byte => "BYTE",
            BaseKind::ShortInt => "SHORTINT",
            BaseKind::Integer => "INTEGER",
            BaseKind::LongInt => "LONGINT",
            BaseKind::Real => "REAL",
            BaseKind::LongReal => "LONGREAL",
            BaseKind::Set => "SET",
        }
    }

    /// Whether the kind is an integer type.
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            BaseKind::Byte | BaseKind::ShortInt | BaseKind::Integer | BaseKind::LongInt
        )
    }

    /// Whether the kind is a floating-point type.
    pub fn is_real(self) -> bool {
        matches!(self, BaseKind::Real | BaseKind::LongReal)
    }

    /// Whether the kind is numeric.
    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_real()
    }

    /// Whether the kind is a character type.
    pub fn is_char(self) -> bool {
        matches!(self, BaseKind::Char | BaseKind::WChar)
    }

    /// Whether the kind is a string type.
    pub fn is_string(self) -> bool {
        matches!(self, BaseKind::Str | BaseKind::WStr)
    }

    /// Promotion rank of numeric kinds: BYTE < SHORTINT < INTEGER < LONGINT
    /// < REAL < LONGREAL. Non-numeric kinds rank 0.
    pub fn rank(self) -> u8 {
        match self {
            BaseKind::Byte => 1,
            BaseKind::ShortInt => 2,
            BaseKind::Integer => 3,
            BaseKind::LongInt => 4,
            BaseKind::Real => 5,
            BaseKind::LongReal => 6,
            _ => 0,
        }
    }

    /// Value range of integer and character kinds.
    pub fn int_bounds(self) -> Option<(i64, i64)> {
        match self {
            BaseKind::Byte => Some((0, u8::MAX as i64)),
            BaseKind::ShortInt => Some((i8::MIN as i64, i8::MAX as i64)),
            BaseKind::Integer => Some((i32::MIN as i64, i32::MAX as i64)),
            BaseKind::LongInt => Some((i64::MIN, i64::MAX)),
            BaseKind::Char => Some((0, u8::MAX as i64)),
            BaseKind::WChar => Some((0, u16::MAX as i64)),
            _ => None,
        }
    }
}

/// A primitive type.
#[derive(Debug)]
pub struct BaseType {
    /// Which primitive
    pub kind: BaseKind,
}

thread_local! {
    static BASE_TYPES: RefCell<HashMap<BaseKind, TypeRef>> = RefCell::new(HashMap::new());
}

impl BaseType {
    /// The interned singleton for a primitive kind.
    pub fn intern(kind: BaseKind) -> TypeRef {
        BASE_TYPES.with(|cache| {
            cache
                .borrow_mut()
                .entry(kind)
                .or_insert_with(|| Type::new(TypeKind::Base(BaseType { kind })))
                .clone()
        })
    }
}

/// An indirection to a record or array. May be NIL at run time.
#[derive(Debug)]
pub struct Pointer {
    /// Source position
    pub loc: Loc,
    /// Target type; after resolution this dereferences to a record or array
    pub to: TypeRef,
}

/// A fixed-length or open array.
#[derive(Debug)]
pub struct Array {
    /// Source position
    pub loc: Loc,
    /// Length expression of fixed-length arrays; `None` for open arrays
    pub len_expr: Option<ExprRef>,
    /// Element type
    pub elem: TypeRef,
    len: Cell<u32>,
}

impl Array {
    /// Create an array type; pass `None` for an open array.
    pub fn new(loc: Loc, len_expr: Option<ExprRef>, elem: TypeRef) -> Self {
        Self {
            loc,
            len_expr,
            elem,
            len: Cell::new(0),
        }
    }

    /// Length of a fixed array after resolution; 0 for open arrays.
    pub fn len(&self) -> u32 {
        self.len.get()
    }

    /// Record the folded length of a fixed array.
    pub fn set_len(&self, len: u32) {
        self.len.set(len);
    }

    /// Whether this array has no length at all.
    ///
    /// Synthesized arrays (string literal types) carry a length without a
    /// length expression, so both have to be absent.
    pub fn is_open(&self) -> bool {
        self.len_expr.is_none() && self.len.get() == 0
    }
}

/// A record type: named fields, bound methods, and an optional base.
#[derive(Debug)]
pub struct Record {
    /// Source position
    pub loc: Loc,
    /// Base type reference as written, if any; resolves to a record or a
    /// pointer to a record
    pub base: Option<TypeRef>,
    base_rec: RefCell<WeakType>,
    sub_recs: RefCell<Vec<WeakType>>,
    binding: RefCell<WeakType>,
    fields: RefCell<Vec<NamedRef>>,
    methods: RefCell<Vec<NamedRef>>,
    names: RefCell<IndexMap<String, NamedRef>>,
}

impl Record {
    /// Create a record with the given declared fields.
    ///
    /// The per-record namespace stays empty until the declaration pass adds
    /// fields and bound methods with duplicate detection.
    pub fn new(loc: Loc, base: Option<TypeRef>, fields: Vec<NamedRef>) -> Self {
        Self {
            loc,
            base,
            base_rec: RefCell::new(Weak::new()),
            sub_recs: RefCell::new(Vec::new()),
            binding: RefCell::new(Weak::new()),
            fields: RefCell::new(fields),
            methods: RefCell::new(Vec::new()),
            names: RefCell::new(IndexMap::new()),
        }
    }

    /// Declared fields in source order.
    pub fn fields(&self) -> Vec<NamedRef> {
        self.fields.borrow().clone()
    }

    /// Append a field (used by generic instantiation).
    pub fn push_field(&self, field: NamedRef) {
        self.fields.borrow_mut().push(field);
    }

    /// Bound methods in binding order.
    pub fn methods(&self) -> Vec<NamedRef> {
        self.methods.borrow().clone()
    }

    /// Append a bound method.
    pub fn push_method(&self, method: NamedRef) {
        self.methods.borrow_mut().push(method);
    }

    /// The resolved base record, if any.
    pub fn base_rec(&self) -> Option<TypeRef> {
        self.base_rec.borrow().upgrade()
    }

    /// Link the resolved base record.
    pub fn set_base_rec(&self, base: &TypeRef) {
        *self.base_rec.borrow_mut() = Rc::downgrade(base);
    }

    /// The records directly extending this one.
    pub fn sub_recs(&self) -> Vec<TypeRef> {
        self.sub_recs
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Register a direct extension of this record.
    pub fn push_sub_rec(&self, sub: &TypeRef) {
        self.sub_recs.borrow_mut().push(Rc::downgrade(sub));
    }

    /// The pointer this anonymous record is bound to, if any.
    pub fn binding(&self) -> Option<TypeRef> {
        self.binding.borrow().upgrade()
    }

    /// Bind this anonymous record to the pointer declared around it.
    ///
    /// Only the first binding sticks; returns false if a binding already
    /// exists so the caller can report the extra pointer.
    pub fn bind_pointer(&self, pointer: &TypeRef) -> bool {
        if self.binding.borrow().upgrade().is_some() {
            return false;
        }
        *self.binding.borrow_mut() = Rc::downgrade(pointer);
        true
    }

    /// Insert an entity into the record namespace.
    ///
    /// Fails with the existing entity if the name is already taken in this
    /// record (inherited members are checked by the caller, which knows
    /// about overrides and field specialization).
    pub fn insert(&self, entity: NamedRef) -> Result<(), NamedRef> {
        let mut names = self.names.borrow_mut();
        if let Some(existing) = names.get(&entity.name) {
            return Err(existing.clone());
        }
        names.insert(entity.name.clone(), entity);
        Ok(())
    }

    /// Look up a member by name.
    ///
    /// With `recursive`, the base chain is searched after this record's own
    /// namespace.
    pub fn find(&self, name: &str, recursive: bool) -> Option<NamedRef> {
        if let Some(found) = self.names.borrow().get(name) {
            return Some(found.clone());
        }
        if recursive {
            if let Some(base) = self.base_rec() {
                if let Some(base_rec) = base.as_record() {
                    return base_rec.find(name, true);
                }
            }
        }
        None
    }
}

/// A procedure signature: ordered formals plus an optional return type.
#[derive(Debug)]
pub struct ProcType {
    /// Source position
    pub loc: Loc,
    /// Formal parameters in declaration order
    pub formals: Vec<NamedRef>,
    /// Return type; `None` for proper procedures
    pub ret: Option<TypeRef>,
}

impl ProcType {
    /// Look up a formal parameter by name.
    pub fn find_formal(&self, name: &str) -> Option<NamedRef> {
        self.formals.iter().find(|f| f.name == name).cloned()
    }
}

/// A named type reference, possibly with generic actuals.
///
/// Until the type resolver runs, only the qualified name expression is
/// meaningful. Afterwards `resolved` points at the referenced type, or
/// `self_ref` is set when the reference names the very declaration it occurs
/// in (legal only behind a pointer or inside composite positions).
#[derive(Debug)]
pub struct QualiType {
    /// Source position
    pub loc: Loc,
    /// The qualifying name: an ident leaf or a selection through an import
    pub quali: ExprRef,
    /// Generic actual types, if the reference instantiates a template
    pub actuals: Vec<TypeRef>,
    resolved: RefCell<WeakType>,
    self_ref: Cell<bool>,
}

impl QualiType {
    /// Create an unresolved reference.
    pub fn new(loc: Loc, quali: ExprRef, actuals: Vec<TypeRef>) -> Self {
        Self {
            loc,
            quali,
            actuals,
            resolved: RefCell::new(Weak::new()),
            self_ref: Cell::new(false),
        }
    }

    /// The referenced type, if resolution has happened.
    pub fn resolved(&self) -> Option<TypeRef> {
        self.resolved.borrow().upgrade()
    }

    /// Link the referenced type.
    pub fn resolve_to(&self, target: &TypeRef) {
        *self.resolved.borrow_mut() = Rc::downgrade(target);
    }

    /// Whether this reference names its own declaration.
    pub fn is_self_ref(&self) -> bool {
        self.self_ref.get()
    }

    /// Mark this reference as a self-reference.
    pub fn mark_self_ref(&self) {
        self.self_ref.set(true);
    }

    /// The dotted source text of the reference.
    pub fn text(&self) -> String {
        quali_text(&self.quali)
    }
}

/// An enumeration: ordered named constants.
#[derive(Debug)]
pub struct Enumeration {
    /// Source position
    pub loc: Loc,
    /// The constants, in declaration order, valued 0..n
    pub items: Vec<NamedRef>,
}

/// Pseudo-type standing for a generic meta parameter used as a type.
#[derive(Debug)]
pub struct GenericType {
    param: WeakNamed,
}

impl GenericType {
    /// Create the pseudo-type for a meta parameter entity.
    pub fn new(param: &NamedRef) -> Self {
        Self {
            param: Rc::downgrade(param),
        }
    }

    /// The meta parameter entity.
    pub fn param(&self) -> Option<NamedRef> {
        self.param.upgrade()
    }
}

/// Pseudo-type of an import name in qualified access.
#[derive(Debug)]
pub struct ModuleRefType {
    module: WeakNamed,
}

impl ModuleRefType {
    /// Create the pseudo-type for a module entity.
    pub fn new(module: &NamedRef) -> Self {
        Self {
            module: Rc::downgrade(module),
        }
    }

    /// The referenced module entity.
    pub fn module(&self) -> Option<NamedRef> {
        self.module.upgrade()
    }
}

/// Render the dotted text of a qualifying name expression.
pub fn quali_text(quali: &ExprRef) -> String {
    use crate::ast::expr::ExprKind;
    match &quali.kind {
        ExprKind::IdentLeaf(leaf) => leaf.name.clone(),
        ExprKind::IdentSel(sel) => format!("{}.{}", quali_text(&sel.sub), sel.name),
        _ => "?".to_string(),
    }
}

/// Follow qualified references to the underlying type.
///
/// An unresolved reference dereferences to itself, so callers can detect
/// resolution failures by matching on the result.
pub fn derefed(ty: &TypeRef) -> TypeRef {
    let mut current = ty.clone();
    let mut hops = 0;
    while let TypeKind::Quali(q) = &current.kind {
        match q.resolved() {
            Some(next) => current = next,
            None => break,
        }
        // A resolution chain longer than any legal declaration chain means
        // the resolver left a cycle behind.
        hops += 1;
        if hops > 64 {
            break;
        }
    }
    current
}

/// The record behind a type: the type itself, or the target of a pointer.
pub fn record_of(ty: &TypeRef) -> Option<TypeRef> {
    let ty = derefed(ty);
    match &ty.kind {
        TypeKind::Record(_) => Some(ty),
        TypeKind::Pointer(p) => {
            let target = derefed(&p.to);
            match &target.kind {
                TypeKind::Record(_) => Some(target),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Whether a type is the checker's failure sentinel.
pub fn is_error(ty: &TypeRef) -> bool {
    matches!(derefed(ty).base_kind(), Some(BaseKind::Undef))
}

/// Structural type equality after dereferencing.
///
/// Base types compare by kind, pointers by target, arrays by openness,
/// length and element, procedure types by signature. Records and
/// enumerations have name identity and compare by node.
pub fn equal_types(a: &TypeRef, b: &TypeRef) -> bool {
    let a = derefed(a);
    let b = derefed(b);
    if Rc::ptr_eq(&a, &b) {
        return true;
    }
    match (&a.kind, &b.kind) {
        (TypeKind::Base(x), TypeKind::Base(y)) => x.kind == y.kind,
        (TypeKind::Pointer(x), TypeKind::Pointer(y)) => equal_types(&x.to, &y.to),
        (TypeKind::Array(x), TypeKind::Array(y)) => {
            x.is_open() == y.is_open() && x.len() == y.len() && equal_types(&x.elem, &y.elem)
        }
        (TypeKind::Proc(x), TypeKind::Proc(y)) => equal_proc_types(x, y),
        (TypeKind::Generic(x), TypeKind::Generic(y)) => match (x.param(), y.param()) {
            (Some(p), Some(q)) => Rc::ptr_eq(&p, &q),
            _ => false,
        },
        _ => false,
    }
}

/// Signature equality of two procedure types.
///
/// Formals must agree pairwise in passing mode and type; names do not
/// matter. Return types must both be absent or equal.
pub fn equal_proc_types(a: &ProcType, b: &ProcType) -> bool {
    if a.formals.len() != b.formals.len() {
        return false;
    }
    for (fa, fb) in a.formals.iter().zip(&b.formals) {
        let (va, vb) = (fa.param_modes(), fb.param_modes());
        if va != vb {
            return false;
        }
        match (fa.ty(), fb.ty()) {
            (Some(ta), Some(tb)) if equal_types(&ta, &tb) => {}
            _ => return false,
        }
    }
    match (&a.ret, &b.ret) {
        (None, None) => true,
        (Some(ra), Some(rb)) => equal_types(ra, rb),
        _ => false,
    }
}

/// Whether `sub` extends `sup` (reflexively).
///
/// Both sides may be records or pointers to records; pointer assignability
/// and type guards reduce to the extension relation of the target records.
pub fn extends(sub: &TypeRef, sup: &TypeRef) -> bool {
    let (sub, sup) = match (record_of(sub), record_of(sup)) {
        (Some(s), Some(p)) => (s, p),
        _ => return false,
    };
    let mut current = Some(sub);
    while let Some(rec) = current {
        if Rc::ptr_eq(&rec, &sup) {
            return true;
        }
        current = rec.as_record().and_then(|r| r.base_rec());
    }
    false
}

/// Number of base links from a record to the root of its extension chain.
pub fn extension_depth(rec: &TypeRef) -> usize {
    let mut depth = 0;
    let mut current = rec.as_record().and_then(|r| r.base_rec());
    while let Some(base) = current {
        depth += 1;
        if depth > 64 {
            break;
        }
        current = base.as_record().and_then(|r| r.base_rec());
    }
    depth
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::expr::{Expr, ExprKind, IdentLeaf};

    fn quali(name: &str) -> TypeRef {
        let leaf = Expr::new(Loc::none(), ExprKind::IdentLeaf(IdentLeaf::new(name)));
        Type::new(TypeKind::Quali(QualiType::new(Loc::none(), leaf, vec![])))
    }

    #[test]
    fn test_base_types_are_interned() {
        let a = BaseType::intern(BaseKind::Integer);
        let b = BaseType::intern(BaseKind::Integer);
        assert!(Rc::ptr_eq(&a, &b));
        let c = BaseType::intern(BaseKind::Real);
        assert!(!Rc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_numeric_ranks() {
        assert!(BaseKind::Byte.rank() < BaseKind::ShortInt.rank());
        assert!(BaseKind::ShortInt.rank() < BaseKind::Integer.rank());
        assert!(BaseKind::Integer.rank() < BaseKind::LongInt.rank());
        assert!(BaseKind::LongInt.rank() < BaseKind::Real.rank());
        assert!(BaseKind::Real.rank() < BaseKind::LongReal.rank());
        assert_eq!(BaseKind::Bool.rank(), 0);
    }

    #[test]
    fn test_derefed_follows_quali_chain() {
        let int = BaseType::intern(BaseKind::Integer);
        let q = quali("T");
        q.as_quali().unwrap().resolve_to(&int);
        assert!(Rc::ptr_eq(&derefed(&q), &int));

        // An unresolved reference dereferences to itself.
        let unresolved = quali("U");
        assert!(Rc::ptr_eq(&derefed(&unresolved), &unresolved));
    }

    #[test]
    fn test_equal_types_structural() {
        let int = BaseType::intern(BaseKind::Integer);
        let open_a = Type::new(TypeKind::Array(Array::new(Loc::none(), None, int.clone())));
        let open_b = Type::new(TypeKind::Array(Array::new(Loc::none(), None, int.clone())));
        assert!(equal_types(&open_a, &open_b));

        let ptr_a = Type::new(TypeKind::Pointer(Pointer {
            loc: Loc::none(),
            to: open_a.clone(),
        }));
        let ptr_b = Type::new(TypeKind::Pointer(Pointer {
            loc: Loc::none(),
            to: open_b,
        }));
        assert!(equal_types(&ptr_a, &ptr_b));
        assert!(!equal_types(&ptr_a, &int));
    }

    #[test]
    fn test_extends_walks_base_chain() {
        let root = Type::new(TypeKind::Record(Record::new(Loc::none(), None, vec![])));
        let mid = Type::new(TypeKind::Record(Record::new(Loc::none(), None, vec![])));
        let leaf = Type::new(TypeKind::Record(Record::new(Loc::none(), None, vec![])));
        mid.as_record().unwrap().set_base_rec(&root);
        leaf.as_record().unwrap().set_base_rec(&mid);

        assert!(extends(&leaf, &root));
        assert!(extends(&leaf, &mid));
        assert!(extends(&leaf, &leaf));
        assert!(!extends(&root, &leaf));
        assert_eq!(extension_depth(&leaf), 2);
        assert_eq!(extension_depth(&root), 0);
    }

    #[test]
    fn test_anonymous_record_binds_first_pointer_only() {
        let rec = Type::new(TypeKind::Record(Record::new(Loc::none(), None, vec![])));
        let p1 = Type::new(TypeKind::Pointer(Pointer {
            loc: Loc::none(),
            to: rec.clone(),
        }));
        let p2 = Type::new(TypeKind::Pointer(Pointer {
            loc: Loc::none(),
            to: rec.clone(),
        }));

        let r = rec.as_record().unwrap();
        assert!(r.bind_pointer(&p1));
        assert!(!r.bind_pointer(&p2));
        assert!(Rc::ptr_eq(&r.binding().unwrap(), &p1));
    }
}
