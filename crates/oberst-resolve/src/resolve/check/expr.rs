//! Expression typing.

use super::compat::{is_lvalue, is_stringish, param_compatible, promoted_type, write_blocked};
use super::Checker;
use crate::resolve::eval;
use oberst_ast::ast::{
    derefed, equal_types, extends, find_in_scope, is_error, record_of, ArgExpr, ArgOp, Array,
    BaseKind, BinExpr, BinOp, BuiltInKind, ExprKind, ExprRef, IdentRole, ModuleRefType, NamedKind,
    NamedRef, Pointer, Type, TypeKind, TypeRef, UnExpr, UnOp, Value,
};
use oberst_ast::error::ErrorKind;
use oberst_ast::foundation::Loc;

impl Checker<'_> {
    /// Type an expression, attaching the result to the node.
    ///
    /// Never fails: a local error reports a diagnostic and yields the
    /// sentinel type, which suppresses follow-up diagnostics upstream.
    pub(crate) fn check_expr(&mut self, expr: &ExprRef) -> TypeRef {
        if let Some(existing) = expr.ty() {
            return existing;
        }
        let ty = match &expr.kind {
            ExprKind::Literal(_) => self.check_literal(expr),
            ExprKind::Set(_) => self.check_set(expr),
            ExprKind::IdentLeaf(_) => self.check_leaf(expr),
            ExprKind::IdentSel(_) => self.check_selection(expr),
            ExprKind::Unary(_) => self.check_unary(expr),
            ExprKind::Arg(_) => self.check_arg(expr),
            ExprKind::Binary(_) => self.check_binary(expr),
        };
        expr.set_ty(&ty);
        ty
    }

    fn check_literal(&mut self, expr: &ExprRef) -> TypeRef {
        let ExprKind::Literal(lit) = &expr.kind else {
            return self.uni.error_type();
        };
        match &lit.value {
            Value::Int(i) => {
                if i32::try_from(*i).is_ok() {
                    self.uni.base(BaseKind::Integer)
                } else {
                    self.uni.base(BaseKind::LongInt)
                }
            }
            Value::Real(_) => self.uni.base(BaseKind::Real),
            Value::Bool(_) => self.uni.bool_type(),
            Value::Char(c) if *c > u8::MAX as u16 => self.uni.base(BaseKind::WChar),
            Value::Char(_) => self.uni.base(BaseKind::Char),
            Value::Nil => self.uni.base(BaseKind::Nil),
            Value::Set(_) => self.uni.base(BaseKind::Set),
            Value::Str(s) => {
                // The literal's type is a character array holding every
                // codepoint plus the trailing zero.
                let wide = s.chars().any(|c| c as u32 > u8::MAX as u32);
                let elem = if wide {
                    BaseKind::WChar
                } else {
                    BaseKind::Char
                };
                let len = s.chars().count() as u32 + 1;
                lit.str_len.set(len);
                self.string_array(expr.loc, elem, len)
            }
            Value::Bytes(b) => {
                let len = b.len() as u32 + 1;
                lit.str_len.set(len);
                self.string_array(expr.loc, BaseKind::Byte, len)
            }
            Value::Invalid => self.uni.error_type(),
        }
    }

    fn string_array(&mut self, loc: Loc, elem: BaseKind, len: u32) -> TypeRef {
        let arr = Array::new(loc, None, self.uni.base(elem));
        arr.set_len(len);
        let ty = Type::new(TypeKind::Array(arr));
        if let Some(module) = self.module.as_module() {
            module.register_helper(ty.clone());
        }
        ty
    }

    fn check_set(&mut self, expr: &ExprRef) -> TypeRef {
        let ExprKind::Set(set) = &expr.kind else {
            return self.uni.error_type();
        };
        for part in &set.parts {
            match &part.kind {
                // Ranges are legal inside a set constructor.
                ExprKind::Binary(bin) if bin.op == BinOp::Range => {
                    self.expect_integer(&bin.lhs);
                    self.expect_integer(&bin.rhs);
                    part.set_ty(&self.uni.base(BaseKind::Set));
                }
                _ => {
                    self.expect_integer(part);
                }
            }
        }
        self.uni.base(BaseKind::Set)
    }

    fn expect_integer(&mut self, expr: &ExprRef) {
        let ty = self.check_expr(expr);
        if is_error(&ty) {
            return;
        }
        let ok = derefed(&ty)
            .base_kind()
            .map(BaseKind::is_integer)
            .unwrap_or(false);
        if !ok {
            self.diags.error(
                ErrorKind::TypeMismatch,
                expr.loc,
                format!("expected an integer, found {}", ty.pretty()),
            );
        }
    }

    fn check_leaf(&mut self, expr: &ExprRef) -> TypeRef {
        let ExprKind::IdentLeaf(leaf) = &expr.kind else {
            return self.uni.error_type();
        };
        let Some(target) = find_in_scope(&self.scope, &leaf.name, true) else {
            return self.err(
                ErrorKind::UnresolvedIdent,
                expr.loc,
                format!("cannot resolve '{}'", leaf.name),
            );
        };
        leaf.resolve_to(&target);
        leaf.set_role(match &target.kind {
            NamedKind::Import(_) => IdentRole::Import,
            NamedKind::Param(p) if p.receiver => IdentRole::This,
            _ => IdentRole::Rhs,
        });
        self.entity_use_type(&target, expr.loc)
    }

    /// The type an entity contributes at a use site.
    fn entity_use_type(&mut self, target: &NamedRef, loc: Loc) -> TypeRef {
        match &target.kind {
            NamedKind::Variable
            | NamedKind::LocalVar
            | NamedKind::Param(_)
            | NamedKind::Field(_) => {
                if let Some(narrow) = self.narrowed_ty(target) {
                    return narrow;
                }
                target.ty().unwrap_or_else(|| self.uni.error_type())
            }
            NamedKind::Const(_) => target.ty().unwrap_or_else(|| self.uni.error_type()),
            NamedKind::Procedure(_) | NamedKind::TypeDecl(_) | NamedKind::GenericParam => {
                target.ty().unwrap_or_else(|| self.uni.error_type())
            }
            NamedKind::Import(_) => {
                let ty = Type::new(TypeKind::ModuleRef(ModuleRefType::new(target)));
                if let Some(module) = self.module.as_module() {
                    module.register_helper(ty.clone());
                }
                ty
            }
            // A bare builtin name has no value; uses other than calls are
            // reported at the call site.
            NamedKind::BuiltIn(_) | NamedKind::Module(_) => {
                let _ = loc;
                self.uni.error_type()
            }
        }
    }

    fn check_selection(&mut self, expr: &ExprRef) -> TypeRef {
        let ExprKind::IdentSel(sel) = &expr.kind else {
            return self.uni.error_type();
        };
        let sub_ty = self.check_expr(&sel.sub);

        // Qualified access through an import.
        if let Some(import) = sel.sub.ident().filter(|t| t.as_import().is_some()) {
            let data = import.as_import().expect("filtered as import");
            data.mark_used();
            let Some(target_module) = data.module() else {
                // The broken import was already reported.
                return self.uni.error_type();
            };
            let Some(found) = target_module
                .scope_data()
                .and_then(|s| s.find(&sel.name))
            else {
                return self.err(
                    ErrorKind::UnresolvedIdent,
                    expr.loc,
                    format!("module '{}' has no '{}'", target_module.name, sel.name),
                );
            };
            if !found.is_public() {
                return self.err(
                    ErrorKind::NotExported,
                    expr.loc,
                    format!(
                        "'{}' is not exported by module '{}'",
                        sel.name, target_module.name
                    ),
                );
            }
            sel.resolve_to(&found);
            sel.set_role(IdentRole::Rhs);
            return self.entity_use_type(&found, expr.loc);
        }

        if is_error(&sub_ty) {
            return self.uni.error_type();
        }

        // Record member access, with implicit dereference through pointers.
        let Some(rec_ty) = record_of(&sub_ty) else {
            return self.err(
                ErrorKind::TypeMismatch,
                expr.loc,
                format!("cannot select '{}' from {}", sel.name, sub_ty.pretty()),
            );
        };
        let rec = rec_ty.as_record().expect("record_of yields records");
        let Some(found) = rec.find(&sel.name, true) else {
            return self.err(
                ErrorKind::UnresolvedIdent,
                expr.loc,
                format!("record has no member '{}'", sel.name),
            );
        };

        // Members of records from other modules must be exported.
        let foreign = found
            .module()
            .map(|m| !std::rc::Rc::ptr_eq(&m, &self.module))
            .unwrap_or(false);
        if foreign && !found.is_public() {
            return self.err(
                ErrorKind::NotExported,
                expr.loc,
                format!("member '{}' is not exported", sel.name),
            );
        }

        sel.resolve_to(&found);
        sel.set_role(match &found.kind {
            NamedKind::Procedure(_) => IdentRole::Method,
            _ => IdentRole::Rhs,
        });
        self.entity_use_type(&found, expr.loc)
    }

    fn check_unary(&mut self, expr: &ExprRef) -> TypeRef {
        let ExprKind::Unary(un) = &expr.kind else {
            return self.uni.error_type();
        };
        let sub_ty = self.check_expr(&un.sub);
        if is_error(&sub_ty) {
            return self.uni.error_type();
        }
        match un.op {
            UnOp::Neg => {
                let numeric = derefed(&sub_ty)
                    .base_kind()
                    .map(BaseKind::is_numeric)
                    .unwrap_or(false);
                if numeric {
                    sub_ty
                } else {
                    self.err(
                        ErrorKind::TypeMismatch,
                        expr.loc,
                        format!("cannot negate {}", sub_ty.pretty()),
                    )
                }
            }
            UnOp::Not => {
                if derefed(&sub_ty).base_kind() == Some(BaseKind::Bool) {
                    sub_ty
                } else {
                    self.err(
                        ErrorKind::TypeMismatch,
                        expr.loc,
                        format!("NOT needs a BOOLEAN, found {}", sub_ty.pretty()),
                    )
                }
            }
            UnOp::Deref => match &derefed(&sub_ty).kind {
                TypeKind::Pointer(p) => derefed(&p.to),
                _ => self.err(
                    ErrorKind::TypeMismatch,
                    expr.loc,
                    format!("cannot dereference {}", sub_ty.pretty()),
                ),
            },
            UnOp::AddrOf => {
                if !is_lvalue(&un.sub) {
                    return self.err(
                        ErrorKind::NotLvalue,
                        expr.loc,
                        "can only take the address of a designator".to_string(),
                    );
                }
                // The synthesized pointer shares the module's lifetime.
                let ptr = Type::new(TypeKind::Pointer(Pointer {
                    loc: expr.loc,
                    to: sub_ty,
                }));
                if let Some(module) = self.module.as_module() {
                    module.register_helper(ptr.clone());
                }
                ptr
            }
        }
    }

    fn check_arg(&mut self, expr: &ExprRef) -> TypeRef {
        let ExprKind::Arg(arg) = &expr.kind else {
            return self.uni.error_type();
        };
        let sub_ty = self.check_expr(&arg.sub);

        if let Some(builtin) = arg.sub.ident().and_then(|t| t.as_builtin().map(|b| b.func)) {
            arg.op.set(ArgOp::Call);
            self.set_role_on_root(&arg.sub, IdentRole::Call);
            return self.check_builtin(builtin, arg, expr.loc);
        }

        let sub_derefed = derefed(&sub_ty);
        match &sub_derefed.kind {
            TypeKind::Proc(_) => {
                arg.op.set(ArgOp::Call);
                self.set_role_on_root(&arg.sub, IdentRole::Call);
                self.check_call(&sub_derefed, arg, expr.loc)
            }
            TypeKind::Array(_) => {
                arg.op.set(ArgOp::Index);
                self.check_index(&sub_derefed, arg, expr.loc)
            }
            TypeKind::Record(_) | TypeKind::Pointer(_) => {
                arg.op.set(ArgOp::Cast);
                self.check_guard(&sub_ty, arg, expr.loc)
            }
            _ if is_error(&sub_ty) => self.uni.error_type(),
            _ => self.err(
                ErrorKind::NotCallable,
                expr.loc,
                format!("{} cannot be called or indexed", sub_ty.pretty()),
            ),
        }
    }

    fn check_call(&mut self, proc_ty: &TypeRef, arg: &ArgExpr, loc: Loc) -> TypeRef {
        let Some(sig) = proc_ty.as_proc() else {
            return self.uni.error_type();
        };
        if sig.formals.len() != arg.args.len() {
            return self.err(
                ErrorKind::ArityMismatch,
                loc,
                format!(
                    "call takes {} arguments, {} given",
                    sig.formals.len(),
                    arg.args.len()
                ),
            );
        }
        for (formal, actual) in sig.formals.iter().zip(&arg.args) {
            let actual_ty = self.check_expr(actual);
            if formal.is_var_param() {
                if !is_lvalue(actual) {
                    self.diags.error(
                        ErrorKind::NotLvalue,
                        actual.loc,
                        format!("parameter '{}' needs a designator", formal.name),
                    );
                    continue;
                }
                let (var, _, _) = formal.param_modes();
                if var {
                    if let Some(reason) = write_blocked(actual, &self.module) {
                        self.diags.error(
                            ErrorKind::ReadonlyViolation,
                            actual.loc,
                            format!("cannot pass to VAR parameter '{}': {}", formal.name, reason),
                        );
                    }
                }
                self.set_role_on_root(actual, IdentRole::VarArg);
            }
            if !param_compatible(formal, &actual_ty, Some(actual)) {
                self.diags.error(
                    ErrorKind::ParamIncompatible,
                    actual.loc,
                    format!(
                        "{} does not fit parameter '{}'",
                        actual_ty.pretty(),
                        formal.name
                    ),
                );
            }
        }
        match &sig.ret {
            Some(ret) => derefed(ret),
            None => self.uni.error_type(),
        }
    }

    fn check_index(&mut self, array_ty: &TypeRef, arg: &ArgExpr, loc: Loc) -> TypeRef {
        let mut current = array_ty.clone();
        for index in &arg.args {
            self.expect_integer(index);
            let next = match &derefed(&current).kind {
                TypeKind::Array(a) => derefed(&a.elem),
                _ => {
                    return self.err(
                        ErrorKind::NotIndexable,
                        loc,
                        "too many indices for array".to_string(),
                    );
                }
            };
            current = next;
        }
        current
    }

    fn check_guard(&mut self, static_ty: &TypeRef, arg: &ArgExpr, loc: Loc) -> TypeRef {
        if arg.args.len() != 1 {
            return self.err(
                ErrorKind::InvalidGuard,
                loc,
                "a type guard names exactly one type".to_string(),
            );
        }
        let Some(guard_ty) = self.type_name_of(&arg.args[0]) else {
            return self.err(
                ErrorKind::InvalidGuard,
                arg.args[0].loc,
                "a type guard needs a type name".to_string(),
            );
        };
        if !extends(&guard_ty, static_ty) {
            return self.err(
                ErrorKind::InvalidGuard,
                loc,
                format!(
                    "{} is not an extension of {}",
                    guard_ty.pretty(),
                    static_ty.pretty()
                ),
            );
        }
        derefed(&guard_ty)
    }

    /// Resolve an expression that must name a type.
    pub(crate) fn type_name_of(&mut self, expr: &ExprRef) -> Option<TypeRef> {
        self.check_expr(expr);
        let target = expr.ident()?;
        match &target.kind {
            NamedKind::TypeDecl(_) | NamedKind::GenericParam => target.ty(),
            _ => None,
        }
    }

    fn check_builtin(&mut self, func: BuiltInKind, arg: &ArgExpr, loc: Loc) -> TypeRef {
        use BuiltInKind::*;

        let arity_ok = match func {
            Len => (1..=2).contains(&arg.args.len()),
            New => !arg.args.is_empty(),
            Inc | Dec => (1..=2).contains(&arg.args.len()),
            Assert => (1..=2).contains(&arg.args.len()),
            Copy | Incl | Excl | Ash | Lsl | Asr | Ror => arg.args.len() == 2,
            _ => arg.args.len() == 1,
        };
        if !arity_ok {
            return self.err(
                ErrorKind::ArityMismatch,
                loc,
                format!("wrong number of arguments for {}", func.name()),
            );
        }

        match func {
            Abs => {
                let ty = self.check_expr(&arg.args[0]);
                match derefed(&ty).base_kind() {
                    Some(k) if k.is_numeric() => ty,
                    _ => self.builtin_operand_error(func, &ty, loc),
                }
            }
            Odd => {
                self.expect_integer(&arg.args[0]);
                self.uni.bool_type()
            }
            Len => {
                let ty = self.check_expr(&arg.args[0]);
                if arg.args.len() == 2 {
                    self.expect_integer(&arg.args[1]);
                }
                if matches!(derefed(&ty).kind, TypeKind::Array(_)) || is_stringish(&ty) {
                    self.uni.int_type()
                } else {
                    self.builtin_operand_error(func, &ty, loc)
                }
            }
            StrLen => {
                let ty = self.check_expr(&arg.args[0]);
                if is_stringish(&ty) {
                    self.uni.int_type()
                } else {
                    self.builtin_operand_error(func, &ty, loc)
                }
            }
            Lsl | Asr | Ror | Ash => {
                let ty = self.check_expr(&arg.args[0]);
                self.expect_integer(&arg.args[1]);
                match derefed(&ty).base_kind() {
                    Some(k) if k.is_integer() => ty,
                    _ => self.builtin_operand_error(func, &ty, loc),
                }
            }
            Floor => {
                let ty = self.check_expr(&arg.args[0]);
                match derefed(&ty).base_kind() {
                    Some(k) if k.is_real() => self.uni.int_type(),
                    _ => self.builtin_operand_error(func, &ty, loc),
                }
            }
            Entier => {
                let ty = self.check_expr(&arg.args[0]);
                match derefed(&ty).base_kind() {
                    Some(k) if k.is_real() => self.uni.base(BaseKind::LongInt),
                    _ => self.builtin_operand_error(func, &ty, loc),
                }
            }
            Flt => {
                self.expect_integer(&arg.args[0]);
                self.uni.base(BaseKind::Real)
            }
            Ord => {
                let ty = self.check_expr(&arg.args[0]);
                match derefed(&ty).base_kind() {
                    Some(k) if k.is_char() || k == BaseKind::Bool || k == BaseKind::Set => {
                        self.uni.int_type()
                    }
                    _ => match &derefed(&ty).kind {
                        TypeKind::Enum(_) => self.uni.int_type(),
                        _ => self.builtin_operand_error(func, &ty, loc),
                    },
                }
            }
            Chr => {
                self.expect_integer(&arg.args[0]);
                self.uni.base(BaseKind::Char)
            }
            WChr => {
                self.expect_integer(&arg.args[0]);
                self.uni.base(BaseKind::WChar)
            }
            Cap => {
                let ty = self.check_expr(&arg.args[0]);
                match derefed(&ty).base_kind() {
                    Some(k) if k.is_char() => ty,
                    _ => self.builtin_operand_error(func, &ty, loc),
                }
            }
            Inc | Dec => {
                let target = &arg.args[0];
                self.expect_integer(target);
                if !is_lvalue(target) {
                    self.diags.error(
                        ErrorKind::NotLvalue,
                        target.loc,
                        format!("{} needs a designator", func.name()),
                    );
                }
                self.set_role_on_root(target, IdentRole::VarArg);
                if arg.args.len() == 2 {
                    self.expect_integer(&arg.args[1]);
                }
                self.uni.error_type()
            }
            Incl | Excl => {
                let set = self.check_expr(&arg.args[0]);
                if derefed(&set).base_kind() != Some(BaseKind::Set) {
                    self.builtin_operand_error(func, &set, loc);
                } else if !is_lvalue(&arg.args[0]) {
                    self.diags.error(
                        ErrorKind::NotLvalue,
                        arg.args[0].loc,
                        format!("{} needs a designator", func.name()),
                    );
                }
                self.set_role_on_root(&arg.args[0], IdentRole::VarArg);
                self.expect_integer(&arg.args[1]);
                self.uni.error_type()
            }
            New => {
                let target = &arg.args[0];
                let ty = self.check_expr(target);
                if !matches!(derefed(&ty).kind, TypeKind::Pointer(_)) {
                    self.builtin_operand_error(func, &ty, loc);
                } else if !is_lvalue(target) {
                    self.diags.error(
                        ErrorKind::NotLvalue,
                        target.loc,
                        "NEW needs a pointer designator".to_string(),
                    );
                }
                self.set_role_on_root(target, IdentRole::VarArg);
                // Extra arguments size open array dimensions.
                for extra in &arg.args[1..] {
                    self.expect_integer(extra);
                }
                self.uni.error_type()
            }
            Assert => {
                let ty = self.check_expr(&arg.args[0]);
                if derefed(&ty).base_kind() != Some(BaseKind::Bool) {
                    self.builtin_operand_error(func, &ty, loc);
                }
                if arg.args.len() == 2 {
                    self.expect_integer(&arg.args[1]);
                }
                self.uni.error_type()
            }
            Halt => {
                self.expect_integer(&arg.args[0]);
                self.uni.error_type()
            }
            Min | Max => match self.type_name_of(&arg.args[0]) {
                Some(ty) if derefed(&ty).base_kind().is_some() => derefed(&ty),
                _ => self.err(
                    ErrorKind::TypeMismatch,
                    loc,
                    format!("{} needs a basic type name", func.name()),
                ),
            },
            Size => match self.type_name_of(&arg.args[0]) {
                Some(_) => self.uni.int_type(),
                None => self.err(
                    ErrorKind::TypeMismatch,
                    loc,
                    "SIZE needs a type name".to_string(),
                ),
            },
            Long | Short => {
                let ty = self.check_expr(&arg.args[0]);
                match derefed(&ty).base_kind() {
                    Some(kind) => match shifted_kind(kind, func == Long) {
                        Some(shifted) => self.uni.base(shifted),
                        None => self.builtin_operand_error(func, &ty, loc),
                    },
                    None => self.builtin_operand_error(func, &ty, loc),
                }
            }
            Copy => {
                let src = self.check_expr(&arg.args[0]);
                let dst = self.check_expr(&arg.args[1]);
                if !is_stringish(&src) || !is_stringish(&dst) {
                    self.diags.error(
                        ErrorKind::TypeMismatch,
                        loc,
                        "COPY needs string or character array operands".to_string(),
                    );
                } else if !is_lvalue(&arg.args[1]) {
                    self.diags.error(
                        ErrorKind::NotLvalue,
                        arg.args[1].loc,
                        "COPY target needs a designator".to_string(),
                    );
                }
                self.set_role_on_root(&arg.args[1], IdentRole::VarArg);
                self.uni.error_type()
            }
        }
    }

    fn builtin_operand_error(&mut self, func: BuiltInKind, ty: &TypeRef, loc: Loc) -> TypeRef {
        self.err(
            ErrorKind::TypeMismatch,
            loc,
            format!("{} cannot take {}", func.name(), ty.pretty()),
        )
    }

    fn check_binary(&mut self, expr: &ExprRef) -> TypeRef {
        let ExprKind::Binary(bin) = &expr.kind else {
            return self.uni.error_type();
        };

        if bin.op == BinOp::Range {
            // Ranges only occur in set constructors and case labels, which
            // handle them before general expression checking.
            return self.err(
                ErrorKind::RangeMisuse,
                expr.loc,
                "a range is only valid in a set constructor or case labels".to_string(),
            );
        }

        if bin.op == BinOp::Is {
            return self.check_type_test(bin, expr.loc);
        }

        let lhs = self.check_expr(&bin.lhs);
        let rhs = self.check_expr(&bin.rhs);
        if is_error(&lhs) || is_error(&rhs) {
            return self.uni.error_type();
        }

        match bin.op {
            BinOp::Add | BinOp::Sub | BinOp::Mul => {
                if let Some(promoted) = promoted_type(&lhs, &rhs) {
                    return promoted;
                }
                if both_sets(&lhs, &rhs) {
                    return self.uni.base(BaseKind::Set);
                }
                self.operand_error(bin, &lhs, &rhs, expr.loc)
            }
            BinOp::Fdiv => {
                if both_sets(&lhs, &rhs) {
                    return self.uni.base(BaseKind::Set);
                }
                match promoted_type(&lhs, &rhs) {
                    // Real division promotes both operands to a real type.
                    Some(promoted) => match promoted.base_kind() {
                        Some(BaseKind::LongReal) => promoted,
                        Some(_) => self.uni.base(BaseKind::Real),
                        None => self.operand_error(bin, &lhs, &rhs, expr.loc),
                    },
                    None => self.operand_error(bin, &lhs, &rhs, expr.loc),
                }
            }
            BinOp::Div | BinOp::Mod => {
                let both_int = [&lhs, &rhs].iter().all(|t| {
                    derefed(t)
                        .base_kind()
                        .map(BaseKind::is_integer)
                        .unwrap_or(false)
                });
                if both_int {
                    promoted_type(&lhs, &rhs).unwrap_or_else(|| self.uni.int_type())
                } else {
                    self.operand_error(bin, &lhs, &rhs, expr.loc)
                }
            }
            BinOp::And | BinOp::Or => {
                let both_bool = [&lhs, &rhs]
                    .iter()
                    .all(|t| derefed(t).base_kind() == Some(BaseKind::Bool));
                if both_bool {
                    self.uni.bool_type()
                } else {
                    self.operand_error(bin, &lhs, &rhs, expr.loc)
                }
            }
            BinOp::In => {
                self.expect_integer(&bin.lhs);
                if derefed(&rhs).base_kind() != Some(BaseKind::Set) {
                    return self.operand_error(bin, &lhs, &rhs, expr.loc);
                }
                self.uni.bool_type()
            }
            BinOp::Eq | BinOp::Neq | BinOp::Lt | BinOp::Leq | BinOp::Gt | BinOp::Geq => {
                self.check_relation(bin, &lhs, &rhs, expr.loc)
            }
            BinOp::Range | BinOp::Is => self.uni.error_type(),
        }
    }

    fn check_type_test(&mut self, bin: &BinExpr, loc: Loc) -> TypeRef {
        let lhs = self.check_expr(&bin.lhs);
        if is_error(&lhs) {
            return self.uni.error_type();
        }
        if record_of(&lhs).is_none() {
            return self.err(
                ErrorKind::TypeMismatch,
                loc,
                format!("IS needs a record or pointer, found {}", lhs.pretty()),
            );
        }
        let Some(test_ty) = self.type_name_of(&bin.rhs) else {
            return self.err(
                ErrorKind::InvalidGuard,
                bin.rhs.loc,
                "IS needs a type name on the right".to_string(),
            );
        };
        if !extends(&test_ty, &lhs) {
            return self.err(
                ErrorKind::InvalidGuard,
                loc,
                format!(
                    "{} is not an extension of {}",
                    test_ty.pretty(),
                    lhs.pretty()
                ),
            );
        }
        self.uni.bool_type()
    }

    fn check_relation(
        &mut self,
        bin: &BinExpr,
        lhs: &TypeRef,
        rhs: &TypeRef,
        loc: Loc,
    ) -> TypeRef {
        let ordering = matches!(bin.op, BinOp::Lt | BinOp::Leq | BinOp::Gt | BinOp::Geq);
        let (dl, dr) = (derefed(lhs), derefed(rhs));
        let (kl, kr) = (dl.base_kind(), dr.base_kind());

        let comparable = if let (Some(a), Some(b)) = (kl, kr) {
            (a.is_numeric() && b.is_numeric())
                || (a.is_char() && b.is_char())
                || (!ordering && a == BaseKind::Bool && b == BaseKind::Bool)
                || (!ordering && a == BaseKind::Set && b == BaseKind::Set)
                || (!ordering && (a == BaseKind::Nil) != (b == BaseKind::Nil))
                || (a == BaseKind::Nil && b == BaseKind::Nil)
        } else {
            false
        };

        if comparable {
            // NIL compares against pointers and procedure values only.
            let nil_ok = match (kl, kr) {
                (Some(BaseKind::Nil), _) => nil_comparable(&dr) || kr == Some(BaseKind::Nil),
                (_, Some(BaseKind::Nil)) => nil_comparable(&dl) || kl == Some(BaseKind::Nil),
                _ => true,
            };
            if nil_ok {
                return self.uni.bool_type();
            }
        }

        // Strings and character arrays compare by content.
        if is_stringish(lhs) && is_stringish(rhs) {
            self.set_role_on_root(&bin.lhs, IdentRole::StringOp);
            self.set_role_on_root(&bin.rhs, IdentRole::StringOp);
            return self.uni.bool_type();
        }

        if !ordering {
            // Pointers of related types, procedure values, enumerations.
            let pointers = matches!(dl.kind, TypeKind::Pointer(_))
                && matches!(dr.kind, TypeKind::Pointer(_))
                && (extends(&dl, &dr) || extends(&dr, &dl));
            let nil_pointer = (kl == Some(BaseKind::Nil) && nil_comparable(&dr))
                || (kr == Some(BaseKind::Nil) && nil_comparable(&dl));
            let procs = matches!(dl.kind, TypeKind::Proc(_)) && equal_types(&dl, &dr);
            let enums = matches!(dl.kind, TypeKind::Enum(_)) && equal_types(&dl, &dr);
            if pointers || nil_pointer || procs || enums {
                return self.uni.bool_type();
            }
        } else if matches!(dl.kind, TypeKind::Enum(_)) && equal_types(&dl, &dr) {
            return self.uni.bool_type();
        }

        self.operand_error(bin, lhs, rhs, loc)
    }

    fn operand_error(
        &mut self,
        bin: &BinExpr,
        lhs: &TypeRef,
        rhs: &TypeRef,
        loc: Loc,
    ) -> TypeRef {
        self.err(
            ErrorKind::TypeMismatch,
            loc,
            format!(
                "operator '{}' cannot combine {} and {}",
                bin.op.symbol(),
                lhs.pretty(),
                rhs.pretty()
            ),
        )
    }

    /// Annotate the identifier at the root of a designator chain.
    pub(crate) fn set_role_on_root(&mut self, expr: &ExprRef, role: IdentRole) {
        match &expr.kind {
            ExprKind::IdentLeaf(leaf) => leaf.set_role(role),
            ExprKind::IdentSel(sel) => sel.set_role(role),
            ExprKind::Unary(UnExpr { sub, .. }) => self.set_role_on_root(sub, role),
            ExprKind::Arg(arg) => self.set_role_on_root(&arg.sub, role),
            _ => {}
        }
    }

    /// Fold a constant label expression, resolving names in the current
    /// scope.
    pub(crate) fn fold_label(&mut self, expr: &ExprRef) -> Value {
        self.check_expr(expr);
        eval::eval(expr, Some(&self.scope))
    }
}

fn both_sets(lhs: &TypeRef, rhs: &TypeRef) -> bool {
    derefed(lhs).base_kind() == Some(BaseKind::Set)
        && derefed(rhs).base_kind() == Some(BaseKind::Set)
}

fn nil_comparable(ty: &TypeRef) -> bool {
    matches!(derefed(ty).kind, TypeKind::Pointer(_) | TypeKind::Proc(_))
}

fn shifted_kind(kind: BaseKind, widen: bool) -> Option<BaseKind> {
    const INT_LADDER: &[BaseKind] = &[
        BaseKind::Byte,
        BaseKind::ShortInt,
        BaseKind::Integer,
        BaseKind::LongInt,
    ];
    const REAL_LADDER: &[BaseKind] = &[BaseKind::Real, BaseKind::LongReal];

    for ladder in [INT_LADDER, REAL_LADDER] {
        if let Some(pos) = ladder.iter().position(|k| *k == kind) {
            let next = if widen {
                pos.checked_add(1).filter(|p| *p < ladder.len())
            } else {
                pos.checked_sub(1)
            };
            return next.map(|p| ladder[p]);
        }
    }
    None
}
