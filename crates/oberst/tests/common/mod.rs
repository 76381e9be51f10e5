//! Builders for raw compilation units.
//!
//! The concrete parser is an external collaborator, so the tests construct
//! the unresolved units it would produce: names unresolved, type
//! expressions as qualified placeholders, no inferred types anywhere.

use oberst::ast::*;
use oberst::foundation::{FileId, Loc, ModPath};
use oberst::project::UnitParser;
use oberst::Diagnostic;
use std::collections::HashMap;
use std::rc::Rc;

pub fn loc(row: u32, col: u32) -> Loc {
    Loc::new(0, row, col)
}

// ---------------------------------------------------------------------------
// expressions

pub fn int(i: i64) -> ExprRef {
    Expr::new(loc(1, 1), ExprKind::Literal(Literal::new(Value::Int(i))))
}

pub fn real(r: f64) -> ExprRef {
    Expr::new(loc(1, 1), ExprKind::Literal(Literal::new(Value::Real(r))))
}

pub fn boolean(b: bool) -> ExprRef {
    Expr::new(loc(1, 1), ExprKind::Literal(Literal::new(Value::Bool(b))))
}

pub fn str_lit(s: &str) -> ExprRef {
    Expr::new(
        loc(1, 1),
        ExprKind::Literal(Literal::new(Value::Str(s.to_string()))),
    )
}

pub fn nil() -> ExprRef {
    Expr::new(loc(1, 1), ExprKind::Literal(Literal::new(Value::Nil)))
}

pub fn leaf(name: &str) -> ExprRef {
    Expr::new(loc(1, 1), ExprKind::IdentLeaf(IdentLeaf::new(name)))
}

pub fn leaf_at(name: &str, at: Loc) -> ExprRef {
    Expr::new(at, ExprKind::IdentLeaf(IdentLeaf::new(name)))
}

pub fn sel(sub: ExprRef, name: &str) -> ExprRef {
    let at = sub.loc;
    Expr::new(at, ExprKind::IdentSel(IdentSel::new(sub, name)))
}

pub fn bin(op: BinOp, lhs: ExprRef, rhs: ExprRef) -> ExprRef {
    Expr::new(loc(1, 1), ExprKind::Binary(BinExpr { op, lhs, rhs }))
}

pub fn un(op: UnOp, sub: ExprRef) -> ExprRef {
    Expr::new(loc(1, 1), ExprKind::Unary(UnExpr { op, sub }))
}

pub fn call(sub: ExprRef, args: Vec<ExprRef>) -> ExprRef {
    Expr::new(
        loc(1, 1),
        ExprKind::Arg(ArgExpr {
            op: std::cell::Cell::new(ArgOp::Call),
            sub,
            args,
        }),
    )
}

pub fn set_expr(parts: Vec<ExprRef>) -> ExprRef {
    Expr::new(loc(1, 1), ExprKind::Set(SetExpr { parts }))
}

// ---------------------------------------------------------------------------
// types

pub fn quali(name: &str) -> TypeRef {
    Type::new(TypeKind::Quali(QualiType::new(loc(1, 1), leaf(name), vec![])))
}

pub fn quali_with(name: &str, actuals: Vec<TypeRef>) -> TypeRef {
    Type::new(TypeKind::Quali(QualiType::new(
        loc(1, 1),
        leaf(name),
        actuals,
    )))
}

pub fn quali_in(module: &str, name: &str) -> TypeRef {
    Type::new(TypeKind::Quali(QualiType::new(
        loc(1, 1),
        sel(leaf(module), name),
        vec![],
    )))
}

pub fn ptr_to(to: TypeRef) -> TypeRef {
    Type::new(TypeKind::Pointer(Pointer { loc: loc(1, 1), to }))
}

pub fn arr(len: i64, elem: TypeRef) -> TypeRef {
    Type::new(TypeKind::Array(Array::new(loc(1, 1), Some(int(len)), elem)))
}

pub fn open_arr(elem: TypeRef) -> TypeRef {
    Type::new(TypeKind::Array(Array::new(loc(1, 1), None, elem)))
}

pub fn record(base: Option<TypeRef>, fields: Vec<NamedRef>) -> TypeRef {
    Type::new(TypeKind::Record(Record::new(loc(1, 1), base, fields)))
}

pub fn proc_ty(formals: Vec<NamedRef>, ret: Option<TypeRef>) -> TypeRef {
    Type::new(TypeKind::Proc(ProcType {
        loc: loc(1, 1),
        formals,
        ret,
    }))
}

// ---------------------------------------------------------------------------
// entities

pub fn variable(name: &str, ty: TypeRef) -> NamedRef {
    Named::with_ty(name, loc(1, 1), NamedKind::Variable, ty)
}

pub fn local(name: &str, ty: TypeRef) -> NamedRef {
    Named::with_ty(name, loc(1, 1), NamedKind::LocalVar, ty)
}

pub fn field(name: &str, ty: TypeRef) -> NamedRef {
    let f = Named::with_ty(name, loc(1, 1), NamedKind::Field(Default::default()), ty);
    f.set_visibility(Visibility::ReadWrite);
    f
}

pub fn value_param(name: &str, ty: TypeRef) -> NamedRef {
    Named::with_ty(
        name,
        loc(1, 1),
        NamedKind::Param(Param {
            var: false,
            const_: false,
            receiver: false,
        }),
        ty,
    )
}

pub fn var_param(name: &str, ty: TypeRef) -> NamedRef {
    Named::with_ty(
        name,
        loc(1, 1),
        NamedKind::Param(Param {
            var: true,
            const_: false,
            receiver: false,
        }),
        ty,
    )
}

pub fn receiver_param(name: &str, ty: TypeRef) -> NamedRef {
    Named::with_ty(
        name,
        loc(1, 1),
        NamedKind::Param(Param {
            var: true,
            const_: false,
            receiver: true,
        }),
        ty,
    )
}

pub fn const_decl(name: &str, expr: ExprRef) -> NamedRef {
    Named::new(name, loc(1, 1), NamedKind::Const(ConstData::new(Some(expr))))
}

pub fn type_decl(name: &str, ty: TypeRef) -> NamedRef {
    Named::type_decl(name, loc(1, 1), ty, vec![])
}

pub fn generic_type_decl(name: &str, params: &[&str], make: impl FnOnce(&[NamedRef]) -> TypeRef) -> NamedRef {
    let meta: Vec<NamedRef> = params
        .iter()
        .map(|p| Named::new(*p, loc(1, 1), NamedKind::GenericParam))
        .collect();
    let ty = make(&meta);
    Named::type_decl(name, loc(1, 1), ty, meta)
}

pub fn exported(entity: NamedRef) -> NamedRef {
    entity.set_visibility(Visibility::ReadWrite);
    entity
}

pub fn readonly(entity: NamedRef) -> NamedRef {
    entity.set_visibility(Visibility::ReadOnly);
    entity
}

/// A procedure declaration; the receiver, when given, is excluded from the
/// signature formals the way the parser excludes it.
pub fn procedure(
    name: &str,
    receiver: Option<NamedRef>,
    params: Vec<NamedRef>,
    ret: Option<TypeRef>,
    locals: Vec<NamedRef>,
    body: Vec<StmtRef>,
) -> NamedRef {
    let signature = proc_ty(params.clone(), ret);
    Named::with_ty(
        name,
        loc(1, 1),
        NamedKind::Procedure(Procedure::new(params, locals, receiver, body)),
        signature,
    )
}

// ---------------------------------------------------------------------------
// statements

pub fn assign(lhs: ExprRef, rhs: ExprRef) -> StmtRef {
    let at = lhs.loc;
    Rc::new(Stmt::Assign(AssignStmt { loc: at, lhs, rhs }))
}

pub fn call_stmt(call_expr: ExprRef) -> StmtRef {
    let at = call_expr.loc;
    Rc::new(Stmt::Call(CallStmt {
        loc: at,
        call: call_expr,
    }))
}

pub fn ret_stmt(value: Option<ExprRef>) -> StmtRef {
    Rc::new(Stmt::Return(ReturnStmt {
        loc: loc(1, 1),
        value,
    }))
}

pub fn exit_stmt() -> StmtRef {
    Rc::new(Stmt::Exit(ExitStmt { loc: loc(1, 1) }))
}

pub fn loop_stmt(body: Vec<StmtRef>) -> StmtRef {
    Rc::new(Stmt::IfLoop(IfLoop {
        loc: loc(1, 1),
        op: IfLoopOp::Loop,
        conds: vec![],
        branches: vec![body],
        els: vec![],
    }))
}

pub fn if_stmt(cond: ExprRef, then: Vec<StmtRef>, els: Vec<StmtRef>) -> StmtRef {
    Rc::new(Stmt::IfLoop(IfLoop {
        loc: loc(1, 1),
        op: IfLoopOp::If,
        conds: vec![cond],
        branches: vec![then],
        els,
    }))
}

pub fn for_stmt(control: &str, from: ExprRef, to: ExprRef, by: Option<ExprRef>, body: Vec<StmtRef>) -> StmtRef {
    Rc::new(Stmt::For(ForStmt::new(
        loc(1, 1),
        leaf(control),
        from,
        to,
        by,
        body,
    )))
}

pub fn case_stmt(
    expr: ExprRef,
    arms: Vec<(Vec<ExprRef>, Vec<StmtRef>)>,
    els: Vec<StmtRef>,
) -> StmtRef {
    Rc::new(Stmt::Case(CaseStmt::new(
        loc(1, 1),
        expr,
        arms.into_iter()
            .map(|(labels, body)| CaseArm { labels, body })
            .collect(),
        els,
    )))
}

// ---------------------------------------------------------------------------
// units and the parser stub

pub struct UnitBuilder {
    path: ModPath,
    imports: Vec<RawImport>,
    decls: Vec<NamedRef>,
    body: Vec<StmtRef>,
}

impl UnitBuilder {
    pub fn new(path: &str) -> Self {
        Self {
            path: ModPath::parse(path),
            imports: Vec::new(),
            decls: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn import(mut self, path: &str) -> Self {
        self.imports.push(RawImport {
            alias: None,
            alias_loc: None,
            path: ModPath::parse(path),
            actuals: vec![],
            loc: loc(2, 1),
        });
        self
    }

    pub fn decl(mut self, entity: NamedRef) -> Self {
        self.decls.push(entity);
        self
    }

    pub fn stmt(mut self, stmt: StmtRef) -> Self {
        self.body.push(stmt);
        self
    }

    pub fn build(self) -> RawUnit {
        RawUnit {
            path: self.path,
            file: 0,
            loc: loc(1, 1),
            is_def: false,
            meta_params: vec![],
            imports: self.imports,
            decls: self.decls,
            body: self.body,
        }
    }
}

/// Stands in for the external concrete parser: maps module paths to unit
/// builders and rebuilds a fresh raw unit on every call.
pub struct MapParser {
    units: HashMap<ModPath, Box<dyn Fn() -> RawUnit>>,
}

impl MapParser {
    pub fn new() -> Self {
        Self {
            units: HashMap::new(),
        }
    }

    pub fn with(mut self, path: &str, build: impl Fn() -> RawUnit + 'static) -> Self {
        self.units.insert(ModPath::parse(path), Box::new(build));
        self
    }
}

impl UnitParser for MapParser {
    fn parse(
        &mut self,
        file: FileId,
        path: &ModPath,
        _source: &str,
    ) -> Result<RawUnit, Vec<Diagnostic>> {
        let build = self.units.get(path).unwrap_or_else(|| {
            panic!("no unit builder registered for '{}'", path);
        });
        let mut unit = build();
        unit.file = file;
        Ok(unit)
    }
}
