//! Named entities and scopes.
//!
//! Everything that can be referred to by name is a [`Named`]: constants,
//! type declarations, variables, parameters, fields, procedures, imports,
//! builtins, generic parameters, and modules. Each entity belongs to exactly
//! one enclosing scope; the scope owns the entity, the entity carries a weak
//! back-pointer to its scope.
//!
//! Modules, procedures, and type declarations are themselves scopes: they
//! carry a [`ScopeData`] with an insertion-ordered, name-keyed entity table.
//! Records have their own namespace (fields and methods) on the record type
//! instead.

use crate::ast::expr::{ExprRef, Value};
use crate::ast::stmt::StmtRef;
use crate::ast::types::{TypeRef, WeakType};
use crate::foundation::{FileId, Loc, ModPath};
use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

/// Shared handle to a named entity.
pub type NamedRef = Rc<Named>;

/// Non-owning handle to a named entity.
pub type WeakNamed = Weak<Named>;

/// Export visibility of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Visibility {
    /// Visibility does not apply to this entity kind
    NotApplicable,
    /// Not exported
    Private,
    /// Exported for reading and writing
    ReadWrite,
    /// Exported for reading only
    ReadOnly,
}

impl Visibility {
    /// The export mark as written in source: `*` or `-`.
    pub fn symbol(self) -> &'static str {
        match self {
            Visibility::ReadWrite => "*",
            Visibility::ReadOnly => "-",
            _ => "",
        }
    }

    /// Whether the entity is visible outside its module at all.
    pub fn is_public(self) -> bool {
        matches!(self, Visibility::ReadWrite | Visibility::ReadOnly)
    }
}

/// A named entity.
///
/// The skeleton (name, position, variant) is fixed at construction; the
/// declared type, owning scope, visibility and error flag are attached by
/// the declaration and resolution passes through interior cells.
#[derive(Debug)]
pub struct Named {
    /// Declared name
    pub name: String,
    /// Source position of the declaration
    pub loc: Loc,
    /// Entity variant
    pub kind: NamedKind,
    ty: RefCell<Option<TypeRef>>,
    scope: RefCell<WeakNamed>,
    visibility: Cell<Visibility>,
    has_errors: Cell<bool>,
}

/// Entity variants.
#[derive(Debug)]
pub enum NamedKind {
    /// Module-level variable
    Variable,
    /// Procedure-local variable
    LocalVar,
    /// Procedure parameter
    Param(Param),
    /// Record field
    Field(FieldData),
    /// Constant with a compile-time value
    Const(ConstData),
    /// Type declaration; a scope because it may carry generic parameters
    TypeDecl(TypeDecl),
    /// Procedure; a scope with a body
    Procedure(Procedure),
    /// Import clause
    Import(Import),
    /// Compiler-intrinsic procedure
    BuiltIn(BuiltIn),
    /// Generic meta parameter
    GenericParam,
    /// Top-level module
    Module(Module),
}

impl Named {
    /// Create an entity.
    pub fn new(name: impl Into<String>, loc: Loc, kind: NamedKind) -> NamedRef {
        Rc::new(Self {
            name: name.into(),
            loc,
            kind,
            ty: RefCell::new(None),
            scope: RefCell::new(Weak::new()),
            visibility: Cell::new(Visibility::NotApplicable),
            has_errors: Cell::new(false),
        })
    }

    /// Create an entity with a declared type.
    pub fn with_ty(name: impl Into<String>, loc: Loc, kind: NamedKind, ty: TypeRef) -> NamedRef {
        let named = Self::new(name, loc, kind);
        named.set_ty(&ty);
        named
    }

    /// Create a type declaration and link the type back to it.
    pub fn type_decl(
        name: impl Into<String>,
        loc: Loc,
        ty: TypeRef,
        meta_params: Vec<NamedRef>,
    ) -> NamedRef {
        let named = Self::with_ty(
            name,
            loc,
            NamedKind::TypeDecl(TypeDecl::new(meta_params)),
            ty.clone(),
        );
        ty.set_ident(&named);
        named
    }

    /// The declared (or resolved) type.
    pub fn ty(&self) -> Option<TypeRef> {
        self.ty.borrow().clone()
    }

    /// Attach the declared type.
    pub fn set_ty(&self, ty: &TypeRef) {
        *self.ty.borrow_mut() = Some(ty.clone());
    }

    /// The enclosing scope entity, if the declaration pass has run.
    pub fn scope(&self) -> Option<NamedRef> {
        self.scope.borrow().upgrade()
    }

    /// Record the enclosing scope entity.
    pub fn set_scope(&self, scope: &NamedRef) {
        *self.scope.borrow_mut() = Rc::downgrade(scope);
    }

    /// Export visibility.
    pub fn visibility(&self) -> Visibility {
        self.visibility.get()
    }

    /// Set export visibility.
    pub fn set_visibility(&self, visibility: Visibility) {
        self.visibility.set(visibility);
    }

    /// Whether the entity is exported.
    pub fn is_public(&self) -> bool {
        self.visibility.get().is_public()
    }

    /// Whether checking this entity produced errors.
    pub fn has_errors(&self) -> bool {
        self.has_errors.get()
    }

    /// Mark this entity as broken.
    pub fn mark_errors(&self) {
        self.has_errors.set(true);
    }

    /// The module this entity ultimately belongs to.
    pub fn module(&self) -> Option<NamedRef> {
        let mut current = self.scope();
        while let Some(entity) = current {
            if matches!(entity.kind, NamedKind::Module(_)) {
                return Some(entity);
            }
            current = entity.scope();
        }
        None
    }

    /// The scope table, for entities that are scopes.
    pub fn scope_data(&self) -> Option<&ScopeData> {
        match &self.kind {
            NamedKind::Module(m) => Some(&m.scope),
            NamedKind::Procedure(p) => Some(&p.scope),
            NamedKind::TypeDecl(t) => Some(&t.scope),
            _ => None,
        }
    }

    /// Parameter passing modes `(var, const, receiver)`; all false for
    /// entities that are not parameters.
    pub fn param_modes(&self) -> (bool, bool, bool) {
        match &self.kind {
            NamedKind::Param(p) => (p.var, p.const_, p.receiver),
            _ => (false, false, false),
        }
    }

    /// Whether this is a parameter passed by (const) reference.
    pub fn is_var_param(&self) -> bool {
        match &self.kind {
            NamedKind::Param(p) => p.var || p.const_,
            _ => false,
        }
    }

    /// The module payload, if this entity is a module.
    pub fn as_module(&self) -> Option<&Module> {
        match &self.kind {
            NamedKind::Module(m) => Some(m),
            _ => None,
        }
    }

    /// The procedure payload, if this entity is a procedure.
    pub fn as_procedure(&self) -> Option<&Procedure> {
        match &self.kind {
            NamedKind::Procedure(p) => Some(p),
            _ => None,
        }
    }

    /// The import payload, if this entity is an import.
    pub fn as_import(&self) -> Option<&Import> {
        match &self.kind {
            NamedKind::Import(i) => Some(i),
            _ => None,
        }
    }

    /// The constant payload, if this entity is a constant.
    pub fn as_const(&self) -> Option<&ConstData> {
        match &self.kind {
            NamedKind::Const(c) => Some(c),
            _ => None,
        }
    }

    /// The field payload, if this entity is a record field.
    pub fn as_field(&self) -> Option<&FieldData> {
        match &self.kind {
            NamedKind::Field(f) => Some(f),
            _ => None,
        }
    }

    /// The parameter payload, if this entity is a parameter.
    pub fn as_param(&self) -> Option<&Param> {
        match &self.kind {
            NamedKind::Param(p) => Some(p),
            _ => None,
        }
    }

    /// The builtin payload, if this entity is an intrinsic.
    pub fn as_builtin(&self) -> Option<&BuiltIn> {
        match &self.kind {
            NamedKind::BuiltIn(b) => Some(b),
            _ => None,
        }
    }

    /// The type-declaration payload, if this entity declares a type.
    pub fn as_type_decl(&self) -> Option<&TypeDecl> {
        match &self.kind {
            NamedKind::TypeDecl(t) => Some(t),
            _ => None,
        }
    }

    /// Short name of the entity kind, for messages.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            NamedKind::Variable => "variable",
            NamedKind::LocalVar => "local variable",
            NamedKind::Param(_) => "parameter",
            NamedKind::Field(_) => "field",
            NamedKind::Const(_) => "constant",
            NamedKind::TypeDecl(_) => "type",
            NamedKind::Procedure(_) => "procedure",
            NamedKind::Import(_) => "import",
            NamedKind::BuiltIn(_) => "builtin procedure",
            NamedKind::GenericParam => "generic parameter",
            NamedKind::Module(_) => "module",
        }
    }
}

/// A procedure parameter.
#[derive(Debug)]
pub struct Param {
    /// Passed by reference (`VAR`)
    pub var: bool,
    /// Passed by constant reference (`IN`)
    pub const_: bool,
    /// Method receiver
    pub receiver: bool,
}

/// A record field.
#[derive(Debug, Default)]
pub struct FieldData {
    specialized: Cell<bool>,
}

impl FieldData {
    /// Whether this field re-declares an inherited field at a more specific
    /// type.
    pub fn is_specialized(&self) -> bool {
        self.specialized.get()
    }

    /// Mark this field as a legal specialization of an inherited field.
    pub fn mark_specialized(&self) {
        self.specialized.set(true);
    }
}

/// A constant declaration.
#[derive(Debug)]
pub struct ConstData {
    /// The declared value expression; `None` for synthesized constants
    pub expr: Option<ExprRef>,
    val: RefCell<Value>,
}

impl ConstData {
    /// Create a constant from its declared expression.
    pub fn new(expr: Option<ExprRef>) -> Self {
        Self {
            expr,
            val: RefCell::new(Value::Invalid),
        }
    }

    /// Create a constant with a known value (enumeration items, builtins).
    pub fn with_value(value: Value) -> Self {
        Self {
            expr: None,
            val: RefCell::new(value),
        }
    }

    /// The folded compile-time value.
    pub fn val(&self) -> Value {
        self.val.borrow().clone()
    }

    /// Record the folded compile-time value.
    pub fn set_val(&self, value: Value) {
        *self.val.borrow_mut() = value;
    }
}

/// A type declaration. A scope because it may carry generic parameters.
#[derive(Debug)]
pub struct TypeDecl {
    /// Generic meta parameters, empty for plain declarations
    pub meta_params: Vec<NamedRef>,
    /// Scope holding the meta parameters
    pub scope: ScopeData,
    insts: RefCell<HashMap<Vec<usize>, TypeRef>>,
}

impl TypeDecl {
    /// Create the payload of a type declaration.
    pub fn new(meta_params: Vec<NamedRef>) -> Self {
        Self {
            meta_params,
            scope: ScopeData::new(Vec::new()),
            insts: RefCell::new(HashMap::new()),
        }
    }

    /// A memoized instantiation for an actuals key, if one exists.
    ///
    /// The key is the identity tuple of the dereferenced actual types, so
    /// identical instantiations share identity across modules.
    pub fn instance(&self, key: &[usize]) -> Option<TypeRef> {
        self.insts.borrow().get(key).cloned()
    }

    /// Memoize an instantiation.
    pub fn record_instance(&self, key: Vec<usize>, instance: TypeRef) {
        self.insts.borrow_mut().insert(key, instance);
    }
}

/// A procedure declaration.
///
/// `params` and `decls` are the parser's source-order lists; the declaration
/// pass introduces them into `scope`. A procedure with a receiver parameter
/// is bound as a method of the receiver's record; override links are
/// maintained on the procedure.
#[derive(Debug)]
pub struct Procedure {
    /// Scope with the procedure body
    pub scope: ScopeData,
    /// Formal parameters in source order
    pub params: Vec<NamedRef>,
    /// Local declarations in source order: constants, types, variables,
    /// nested procedures
    pub decls: Vec<NamedRef>,
    /// Receiver parameter, present for methods
    pub receiver: Option<NamedRef>,
    receiver_rec: RefCell<WeakType>,
    super_: RefCell<WeakNamed>,
    subs: RefCell<Vec<WeakNamed>>,
}

impl Procedure {
    /// Create a procedure from parser output.
    pub fn new(
        params: Vec<NamedRef>,
        decls: Vec<NamedRef>,
        receiver: Option<NamedRef>,
        body: Vec<StmtRef>,
    ) -> Self {
        Self {
            scope: ScopeData::new(body),
            params,
            decls,
            receiver,
            receiver_rec: RefCell::new(Weak::new()),
            super_: RefCell::new(Weak::new()),
            subs: RefCell::new(Vec::new()),
        }
    }

    /// The record this procedure is bound to, for methods.
    pub fn receiver_rec(&self) -> Option<TypeRef> {
        self.receiver_rec.borrow().upgrade()
    }

    /// Bind this procedure to its receiver record.
    pub fn set_receiver_rec(&self, rec: &TypeRef) {
        *self.receiver_rec.borrow_mut() = Rc::downgrade(rec);
    }

    /// The overridden method on the base chain, if any.
    pub fn super_method(&self) -> Option<NamedRef> {
        self.super_.borrow().upgrade()
    }

    /// Link the overridden method.
    pub fn set_super_method(&self, super_: &NamedRef) {
        *self.super_.borrow_mut() = Rc::downgrade(super_);
    }

    /// The overrides of this method in sub-records.
    pub fn subs(&self) -> Vec<NamedRef> {
        self.subs.borrow().iter().filter_map(Weak::upgrade).collect()
    }

    /// Register an override of this method.
    pub fn push_sub(&self, sub: &NamedRef) {
        self.subs.borrow_mut().push(Rc::downgrade(sub));
    }
}

/// An import clause: optional alias, dotted module path, optional generic
/// actuals. The target module is linked by the declaration pass.
#[derive(Debug)]
pub struct Import {
    /// Path of the imported module
    pub path: ModPath,
    /// Position of the alias, if one was written
    pub alias_loc: Option<Loc>,
    /// Generic actual types for instantiating imports
    pub actuals: Vec<TypeRef>,
    module: RefCell<Option<NamedRef>>,
    used: Cell<bool>,
}

impl Import {
    /// Create an import clause.
    pub fn new(path: ModPath, alias_loc: Option<Loc>, actuals: Vec<TypeRef>) -> Self {
        Self {
            path,
            alias_loc,
            actuals,
            module: RefCell::new(None),
            used: Cell::new(false),
        }
    }

    /// The resolved target module.
    pub fn module(&self) -> Option<NamedRef> {
        self.module.borrow().clone()
    }

    /// Link the resolved target module.
    pub fn set_module(&self, module: &NamedRef) {
        *self.module.borrow_mut() = Some(module.clone());
    }

    /// Whether any qualified access goes through this import.
    pub fn is_used(&self) -> bool {
        self.used.get()
    }

    /// Mark this import as used.
    pub fn mark_used(&self) {
        self.used.set(true);
    }
}

/// Intrinsic procedures of the language core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltInKind {
    Abs,
    Odd,
    Len,
    Lsl,
    Asr,
    Ror,
    Floor,
    Flt,
    Ord,
    Chr,
    Inc,
    Dec,
    Incl,
    Excl,
    New,
    Assert,
    Max,
    Min,
    Cap,
    Long,
    Short,
    Halt,
    Copy,
    Ash,
    Size,
    Entier,
    StrLen,
    WChr,
}

impl BuiltInKind {
    /// All intrinsics, in declaration order of the universe scope.
    pub const ALL: &'static [BuiltInKind] = &[
        BuiltInKind::Abs,
        BuiltInKind::Odd,
        BuiltInKind::Len,
        BuiltInKind::Lsl,
        BuiltInKind::Asr,
        BuiltInKind::Ror,
        BuiltInKind::Floor,
        BuiltInKind::Flt,
        BuiltInKind::Ord,
        BuiltInKind::Chr,
        BuiltInKind::Inc,
        BuiltInKind::Dec,
        BuiltInKind::Incl,
        BuiltInKind::Excl,
        BuiltInKind::New,
        BuiltInKind::Assert,
        BuiltInKind::Max,
        BuiltInKind::Min,
        BuiltInKind::Cap,
        BuiltInKind::Long,
        BuiltInKind::Short,
        BuiltInKind::Halt,
        BuiltInKind::Copy,
        BuiltInKind::Ash,
        BuiltInKind::Size,
        BuiltInKind::Entier,
        BuiltInKind::StrLen,
        BuiltInKind::WChr,
    ];

    /// Source-level name of the intrinsic.
    pub fn name(self) -> &'static str {
        match self {
            BuiltInKind::Abs => "ABS",
            BuiltInKind::Odd => "ODD",
            BuiltInKind::Len => "LEN",
            BuiltInKind::Lsl => "LSL",
            BuiltInKind::Asr => "ASR",
            BuiltInKind::Ror => "ROR",
            BuiltInKind::Floor => "FLOOR",
            BuiltInKind::Flt => "FLT",
            BuiltInKind::Ord => "ORD",
            BuiltInKind::Chr => "CHR",
            BuiltInKind::Inc => "INC",
            BuiltInKind::Dec => "DEC",
            BuiltInKind::Incl => "INCL",
            BuiltInKind::Excl => "EXCL",
            BuiltInKind::New => "NEW",
            BuiltInKind::Assert => "ASSERT",
            BuiltInKind::Max => "MAX",
            BuiltInKind::Min => "MIN",
            BuiltInKind::Cap => "CAP",
            BuiltInKind::Long => "LONG",
            BuiltInKind::Short => "SHORT",
            BuiltInKind::Halt => "HALT",
            BuiltInKind::Copy => "COPY",
            BuiltInKind::Ash => "ASH",
            BuiltInKind::Size => "SIZE",
            BuiltInKind::Entier => "ENTIER",
            BuiltInKind::StrLen => "STRLEN",
            BuiltInKind::WChr => "WCHR",
        }
    }
}

/// A compiler-intrinsic procedure.
#[derive(Debug)]
pub struct BuiltIn {
    /// Which intrinsic
    pub func: BuiltInKind,
}

/// A top-level module.
#[derive(Debug)]
pub struct Module {
    /// Scope with the module initializer as body
    pub scope: ScopeData,
    /// Full dotted path of the module
    pub full_path: ModPath,
    /// Source file the module was parsed from
    pub file: FileId,
    /// Whether this is a definition (preload) module without bodies
    pub is_def: bool,
    /// Generic meta parameters of a generic module
    pub meta_params: Vec<NamedRef>,
    is_validated: Cell<bool>,
    broken: Cell<bool>,
    imports: RefCell<Vec<NamedRef>>,
    decls: RefCell<Vec<NamedRef>>,
    helpers: RefCell<Vec<TypeRef>>,
}

impl Module {
    /// Create a module shell with its initializer body.
    pub fn new(
        full_path: ModPath,
        file: FileId,
        is_def: bool,
        meta_params: Vec<NamedRef>,
        body: Vec<StmtRef>,
    ) -> Self {
        Self {
            scope: ScopeData::new(body),
            full_path,
            file,
            is_def,
            meta_params,
            is_validated: Cell::new(false),
            broken: Cell::new(false),
            imports: RefCell::new(Vec::new()),
            decls: RefCell::new(Vec::new()),
            helpers: RefCell::new(Vec::new()),
        }
    }

    /// All module-level declarations in source order.
    ///
    /// Unlike the scope name table, this list includes receiver procedures,
    /// which live in their record's namespace rather than the module's.
    pub fn decls(&self) -> Vec<NamedRef> {
        self.decls.borrow().clone()
    }

    /// Record a module-level declaration.
    pub fn push_decl(&self, decl: NamedRef) {
        self.decls.borrow_mut().push(decl);
    }

    /// Whether a structural error made this module's exports unusable.
    ///
    /// Local checking errors leave the module usable by importers; graph,
    /// declaration and type-resolution errors do not.
    pub fn is_broken(&self) -> bool {
        self.broken.get()
    }

    /// Mark this module structurally broken.
    pub fn mark_broken(&self) {
        self.broken.set(true);
    }

    /// The import entities of this module, in clause order.
    pub fn imports(&self) -> Vec<NamedRef> {
        self.imports.borrow().clone()
    }

    /// Register an import entity.
    pub fn push_import(&self, import: NamedRef) {
        self.imports.borrow_mut().push(import);
    }

    /// Whether the full pipeline ran over this module.
    pub fn is_validated(&self) -> bool {
        self.is_validated.get()
    }

    /// Mark the module as fully processed.
    pub fn set_validated(&self) {
        self.is_validated.set(true);
    }

    /// Keep a synthesized type (address-of pointer, generic instantiation)
    /// alive for the lifetime of this module.
    pub fn register_helper(&self, ty: TypeRef) {
        self.helpers.borrow_mut().push(ty);
    }

    /// The synthesized helper types of this module.
    pub fn helpers(&self) -> Vec<TypeRef> {
        self.helpers.borrow().clone()
    }
}

/// Insertion-ordered, name-keyed entity table of a scope.
#[derive(Debug)]
pub struct ScopeData {
    names: RefCell<IndexMap<String, NamedRef>>,
    /// Statement body of the scope (procedure body, module initializer)
    pub body: Vec<StmtRef>,
}

impl ScopeData {
    /// Create a scope with the given body.
    pub fn new(body: Vec<StmtRef>) -> Self {
        Self {
            names: RefCell::new(IndexMap::new()),
            body,
        }
    }

    /// Add an entity to this scope.
    ///
    /// Fails with the already-present entity if the name is taken at this
    /// scope level.
    pub fn add(&self, entity: NamedRef) -> Result<(), NamedRef> {
        let mut names = self.names.borrow_mut();
        if let Some(existing) = names.get(&entity.name) {
            return Err(existing.clone());
        }
        names.insert(entity.name.clone(), entity);
        Ok(())
    }

    /// Look up a name in this scope only.
    pub fn find(&self, name: &str) -> Option<NamedRef> {
        self.names.borrow().get(name).cloned()
    }

    /// The entities of this scope in insertion order.
    pub fn entries(&self) -> Vec<NamedRef> {
        self.names.borrow().values().cloned().collect()
    }

    /// Number of entities in this scope.
    pub fn len(&self) -> usize {
        self.names.borrow().len()
    }

    /// Whether the scope has no entities.
    pub fn is_empty(&self) -> bool {
        self.names.borrow().is_empty()
    }
}

/// Look up a name along the scope chain.
///
/// Searches the starting scope first; with `recursive`, continues through
/// the enclosing scopes up to and including the module.
pub fn find_in_scope(start: &NamedRef, name: &str, recursive: bool) -> Option<NamedRef> {
    let mut current = Some(start.clone());
    while let Some(entity) = current {
        if let Some(data) = entity.scope_data() {
            if let Some(found) = data.find(name) {
                return Some(found);
            }
        }
        if !recursive {
            return None;
        }
        current = entity.scope();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(name: &str) -> NamedRef {
        Named::new(
            name,
            Loc::none(),
            NamedKind::Module(Module::new(ModPath::parse(name), 0, false, vec![], vec![])),
        )
    }

    fn proc(name: &str) -> NamedRef {
        Named::new(
            name,
            Loc::none(),
            NamedKind::Procedure(Procedure::new(vec![], vec![], None, vec![])),
        )
    }

    #[test]
    fn test_scope_add_rejects_duplicates() {
        let m = module("M");
        let scope = m.scope_data().unwrap();
        let a = Named::new("x", Loc::none(), NamedKind::Variable);
        let b = Named::new("x", Loc::none(), NamedKind::Variable);

        assert!(scope.add(a.clone()).is_ok());
        let existing = scope.add(b).unwrap_err();
        assert!(Rc::ptr_eq(&existing, &a));
        assert_eq!(scope.len(), 1);
    }

    #[test]
    fn test_scope_preserves_insertion_order() {
        let m = module("M");
        let scope = m.scope_data().unwrap();
        for name in ["c", "a", "b"] {
            scope.add(Named::new(name, Loc::none(), NamedKind::Variable)).unwrap();
        }
        let order: Vec<_> = scope.entries().iter().map(|n| n.name.clone()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_find_in_scope_walks_chain() {
        let m = module("M");
        let p = proc("P");
        p.set_scope(&m);
        m.scope_data().unwrap().add(p.clone()).unwrap();

        let x = Named::new("x", Loc::none(), NamedKind::Variable);
        m.scope_data().unwrap().add(x.clone()).unwrap();

        // Not local to the procedure, found through the module.
        let found = find_in_scope(&p, "x", true).unwrap();
        assert!(Rc::ptr_eq(&found, &x));
        assert!(find_in_scope(&p, "x", false).is_none());
        assert!(find_in_scope(&p, "y", true).is_none());
    }

    #[test]
    fn test_module_backlink() {
        let m = module("M");
        let p = proc("P");
        p.set_scope(&m);
        let local = Named::new("v", Loc::none(), NamedKind::LocalVar);
        local.set_scope(&p);

        let owner = local.module().unwrap();
        assert!(Rc::ptr_eq(&owner, &m));
    }

    #[test]
    fn test_visibility_symbols() {
        assert_eq!(Visibility::ReadWrite.symbol(), "*");
        assert_eq!(Visibility::ReadOnly.symbol(), "-");
        assert_eq!(Visibility::Private.symbol(), "");
        assert!(Visibility::ReadOnly.is_public());
        assert!(!Visibility::Private.is_public());
    }

    #[test]
    fn test_builtin_names() {
        assert_eq!(BuiltInKind::StrLen.name(), "STRLEN");
        assert_eq!(BuiltInKind::ALL.len(), 28);
    }
}
