//! Type resolution.
//!
//! Closes the type graph of a module: links every qualified type reference
//! to its declaration, validates pointer targets and record bases, folds
//! array lengths, binds receiver procedures as methods, and instantiates
//! generic templates.
//!
//! Resolution is idempotent and memoized per type node. A reference back
//! into a type that is currently being resolved takes the self-reference
//! path: legal behind a pointer or inside record or procedure type
//! composition, an error otherwise. Generic instantiations are memoized by
//! template identity and the identities of the actual types, and the fresh
//! types are kept alive by the instantiating module's helper list.

use crate::resolve::eval;
use crate::resolve::universe::Universe;
use indexmap::IndexMap;
use oberst_ast::ast::{
    derefed, extends, extension_depth, record_of, Array, BaseKind, ExprKind, ExprRef, IdentRole,
    Named, NamedKind, NamedRef, Param, Pointer, ProcType, QualiType, Record, Type, TypeKind,
    TypeRef, Value,
};
use oberst_ast::error::{Diagnostics, ErrorKind};
use oberst_ast::foundation::Loc;
use std::collections::HashSet;
use std::rc::Rc;
use tracing::{debug, trace};

/// Longest supported record extension chain.
const MAX_EXTENSION: usize = 16;

/// Resolve all types declared in a module.
pub fn resolve_module_types(module: &NamedRef, uni: &Universe, diags: &mut Diagnostics) {
    debug!(module = %module.name, "resolving types");
    let mut resolver = TypeResolver {
        uni,
        module: module.clone(),
        diags,
        scope: module.clone(),
        in_progress: HashSet::new(),
        decl_stack: Vec::new(),
        pointer_depth: 0,
        record_depth: 0,
        proc_depth: 0,
    };
    resolver.resolve_scope(module);
}

struct TypeResolver<'a> {
    uni: &'a Universe,
    module: NamedRef,
    diags: &'a mut Diagnostics,
    /// Current lookup scope for qualified references
    scope: NamedRef,
    in_progress: HashSet<usize>,
    /// Type declarations currently being resolved, for self-ref detection
    decl_stack: Vec<NamedRef>,
    pointer_depth: usize,
    record_depth: usize,
    proc_depth: usize,
}

impl TypeResolver<'_> {
    /// Resolve every declaration of a scope, in declaration order.
    ///
    /// For modules, the declaration list includes receiver procedures that
    /// are absent from the scope name table.
    fn resolve_scope(&mut self, owner: &NamedRef) {
        let entities = match owner.as_module() {
            Some(module) => module.decls(),
            None => match owner.scope_data() {
                Some(data) => data.entries(),
                None => return,
            },
        };
        for entity in entities {
            match &entity.kind {
                NamedKind::TypeDecl(_) => self.resolve_named_type(&entity),
                NamedKind::Const(_) => self.fold_const(&entity),
                NamedKind::Variable | NamedKind::LocalVar | NamedKind::Field(_) => {
                    if let Some(ty) = entity.ty() {
                        self.resolve_type(&ty);
                    }
                }
                NamedKind::Procedure(_) => self.resolve_procedure(&entity),
                _ => {}
            }
        }
    }

    /// Resolve a type declaration, tracking it for self-ref detection.
    fn resolve_named_type(&mut self, decl: &NamedRef) {
        let Some(ty) = decl.ty() else {
            return;
        };
        trace!(name = %decl.name, "resolving type declaration");
        let saved = std::mem::replace(&mut self.scope, decl.clone());
        self.decl_stack.push(decl.clone());
        self.resolve_type(&ty);
        self.decl_stack.pop();
        self.scope = saved;
    }

    /// Fold a constant declaration and give it its value type.
    fn fold_const(&mut self, decl: &NamedRef) {
        let Some(data) = decl.as_const() else {
            return;
        };
        if data.val().is_valid() {
            return;
        }
        let Some(expr) = data.expr.clone() else {
            return;
        };
        let value = eval::eval(&expr, Some(&self.scope));
        if value.is_valid() {
            if let Some(ty) = self.value_type(&value) {
                decl.set_ty(&ty);
            }
            data.set_val(value);
        }
        // A failed fold stays Invalid; the checker reports it where the
        // constant is declared or used.
    }

    /// The base type of a folded constant value.
    fn value_type(&self, value: &Value) -> Option<TypeRef> {
        let kind = match value {
            Value::Int(i) => {
                if i32::try_from(*i).is_ok() {
                    BaseKind::Integer
                } else {
                    BaseKind::LongInt
                }
            }
            Value::Real(_) => BaseKind::Real,
            Value::Bool(_) => BaseKind::Bool,
            Value::Str(_) => BaseKind::Str,
            Value::Bytes(_) => BaseKind::Str,
            Value::Char(c) if *c > u8::MAX as u16 => BaseKind::WChar,
            Value::Char(_) => BaseKind::Char,
            Value::Nil => BaseKind::Nil,
            Value::Set(_) => BaseKind::Set,
            Value::Invalid => return None,
        };
        Some(self.uni.base(kind))
    }

    /// Resolve a procedure signature and its local declarations, and bind
    /// it as a method when it has a receiver.
    fn resolve_procedure(&mut self, proc: &NamedRef) {
        if let Some(ty) = proc.ty() {
            let saved = std::mem::replace(&mut self.scope, proc.clone());
            self.resolve_type(&ty);
            self.scope = saved;
        }
        let Some(data) = proc.as_procedure() else {
            return;
        };

        if let Some(receiver) = data.receiver.clone() {
            let saved = std::mem::replace(&mut self.scope, proc.clone());
            if let Some(recv_ty) = receiver.ty() {
                self.resolve_type(&recv_ty);
            }
            self.scope = saved;
            self.bind_method(proc, &receiver);
        }

        let saved = std::mem::replace(&mut self.scope, proc.clone());
        self.resolve_scope(proc);
        self.scope = saved;
    }

    /// Bind a receiver procedure to its record and link the override chain.
    fn bind_method(&mut self, proc: &NamedRef, receiver: &NamedRef) {
        let Some(data) = proc.as_procedure() else {
            return;
        };
        let Some(recv_ty) = receiver.ty() else {
            return;
        };
        let Some(rec_ty) = record_of(&recv_ty) else {
            self.diags.error(
                ErrorKind::TypeMismatch,
                receiver.loc,
                format!(
                    "receiver of '{}' must be a record or a pointer to a record",
                    proc.name
                ),
            );
            return;
        };
        data.set_receiver_rec(&rec_ty);
        let Some(rec) = rec_ty.as_record() else {
            return;
        };

        // An inherited member with the same name is the overridden method,
        // or a clash when it is not a procedure.
        if let Some(base) = rec.base_rec() {
            if let Some(inherited) = base.as_record().and_then(|b| b.find(&proc.name, true)) {
                match &inherited.kind {
                    NamedKind::Procedure(sup) => {
                        data.set_super_method(&inherited);
                        sup.push_sub(proc);
                    }
                    _ => {
                        self.diags.error(
                            ErrorKind::DuplicateName,
                            proc.loc,
                            format!(
                                "method '{}' clashes with an inherited {}",
                                proc.name,
                                inherited.kind_name()
                            ),
                        );
                    }
                }
            }
        }

        if rec.insert(proc.clone()).is_err() {
            self.diags.error(
                ErrorKind::DuplicateName,
                proc.loc,
                format!("record already has a member '{}'", proc.name),
            );
            return;
        }
        rec.push_method(proc.clone());
    }

    /// Resolve one type node. Idempotent; reentrant calls during cycle
    /// walks see the in-progress marker and return.
    ///
    /// The completion marker lives on the node, so a type resolved in its
    /// home module is never re-resolved through an importer.
    fn resolve_type(&mut self, ty: &TypeRef) {
        let key = Rc::as_ptr(ty) as usize;
        if ty.is_visited() || self.in_progress.contains(&key) {
            return;
        }
        self.in_progress.insert(key);

        match &ty.kind {
            TypeKind::Quali(q) => self.resolve_quali(q),
            TypeKind::Pointer(p) => self.resolve_pointer(ty, p),
            TypeKind::Array(a) => self.resolve_array(a),
            TypeKind::Record(_) => self.resolve_record(ty),
            TypeKind::Proc(p) => self.resolve_proc_type(p),
            TypeKind::Base(_)
            | TypeKind::Enum(_)
            | TypeKind::Generic(_)
            | TypeKind::ModuleRef(_) => {}
        }

        self.in_progress.remove(&key);
        ty.mark_visited();
    }

    fn resolve_pointer(&mut self, ty: &TypeRef, p: &Pointer) {
        self.pointer_depth += 1;
        self.resolve_type(&p.to);
        self.pointer_depth -= 1;

        let target = derefed(&p.to);
        match &target.kind {
            TypeKind::Record(rec) => {
                // Anonymous target records back-link to the first pointer
                // declared around them.
                if target.ident().is_none() && !rec.bind_pointer(ty) {
                    self.diags.warning(
                        ErrorKind::DuplicateName,
                        p.loc,
                        "anonymous record is already bound to another pointer".to_string(),
                    );
                }
            }
            TypeKind::Array(_) | TypeKind::Generic(_) => {}
            // An unresolved reference was already reported at the quali.
            TypeKind::Quali(_) => {}
            TypeKind::Base(b) if b.kind == BaseKind::Undef => {}
            _ => {
                self.diags.error(
                    ErrorKind::PointerBaseIllegal,
                    p.loc,
                    format!("pointer target must be a record or an array, not {}",
                        target.kind_name()),
                );
            }
        }
    }

    fn resolve_array(&mut self, a: &Array) {
        self.resolve_type(&a.elem);
        let Some(len_expr) = a.len_expr.clone() else {
            return;
        };
        match eval::eval(&len_expr, Some(&self.scope)) {
            Value::Int(n) if n >= 1 && n <= u32::MAX as i64 => a.set_len(n as u32),
            _ => {
                self.diags.error(
                    ErrorKind::ArrayLengthError,
                    a.loc,
                    "array length must be a constant integer >= 1".to_string(),
                );
            }
        }
    }

    fn resolve_record(&mut self, ty: &TypeRef) {
        let Some(rec) = ty.as_record() else {
            return;
        };
        self.record_depth += 1;

        if let Some(base) = rec.base.clone() {
            self.resolve_type(&base);
            match record_of(&base) {
                Some(base_rec_ty) => {
                    // Make sure the base record's own members exist before
                    // clash checks below.
                    self.resolve_type(&base_rec_ty);
                    if extends(&base_rec_ty, ty) {
                        self.diags.error(
                            ErrorKind::RecordBaseIllegal,
                            rec.loc,
                            "record extension chain is cyclic".to_string(),
                        );
                    } else {
                        rec.set_base_rec(&base_rec_ty);
                        if let Some(base_rec) = base_rec_ty.as_record() {
                            base_rec.push_sub_rec(ty);
                        }
                        if extension_depth(ty) > MAX_EXTENSION {
                            self.diags.error(
                                ErrorKind::ExtensionTooDeep,
                                rec.loc,
                                format!(
                                    "record extension chain exceeds {} levels",
                                    MAX_EXTENSION
                                ),
                            );
                        }
                    }
                }
                None => {
                    // Unresolved bases were already reported at the quali.
                    if !matches!(derefed(&base).kind, TypeKind::Quali(_))
                        && !oberst_ast::ast::is_error(&base)
                    {
                        self.diags.error(
                            ErrorKind::RecordBaseIllegal,
                            rec.loc,
                            "record base must be a record or a pointer to a record".to_string(),
                        );
                    }
                }
            }
        }

        for field in rec.fields() {
            field.set_scope(&self.scope);
            self.check_field_clash(rec, &field);
            if let Some(field_ty) = field.ty() {
                self.resolve_type(&field_ty);
            }
        }

        self.record_depth -= 1;
    }

    /// Insert a field into the record namespace, allowing inherited fields
    /// to be re-declared at a more specific type.
    fn check_field_clash(&mut self, rec: &Record, field: &NamedRef) {
        if let Some(base) = rec.base_rec() {
            if let Some(inherited) = base.as_record().and_then(|b| b.find(&field.name, true)) {
                let specializes = match (&inherited.kind, inherited.ty(), field.ty()) {
                    (NamedKind::Field(_), Some(sup_ty), Some(sub_ty)) => {
                        extends(&sub_ty, &sup_ty) && !oberst_ast::ast::equal_types(&sub_ty, &sup_ty)
                    }
                    _ => false,
                };
                if specializes {
                    if let Some(data) = field.as_field() {
                        data.mark_specialized();
                    }
                } else {
                    self.diags.error(
                        ErrorKind::DuplicateName,
                        field.loc,
                        format!(
                            "field '{}' clashes with an inherited {}",
                            field.name,
                            inherited.kind_name()
                        ),
                    );
                }
            }
        }
        if rec.insert(field.clone()).is_err() {
            self.diags.error(
                ErrorKind::DuplicateName,
                field.loc,
                format!("record already has a member '{}'", field.name),
            );
        }
    }

    fn resolve_proc_type(&mut self, p: &ProcType) {
        self.proc_depth += 1;
        for formal in &p.formals {
            if formal.scope().is_none() {
                formal.set_scope(&self.scope);
            }
            if let Some(formal_ty) = formal.ty() {
                self.resolve_type(&formal_ty);
            }
        }
        if let Some(ret) = &p.ret {
            self.resolve_type(ret);
        }
        self.proc_depth -= 1;
    }

    /// Resolve a qualified type reference to its declaration.
    fn resolve_quali(&mut self, q: &QualiType) {
        if q.resolved().is_some() {
            return;
        }

        let target = match self.lookup_quali(&q.quali) {
            Some(target) => target,
            None => {
                self.diags.error(
                    ErrorKind::UnresolvedIdent,
                    q.loc,
                    format!("cannot resolve type '{}'", q.text()),
                );
                q.resolve_to(&self.uni.error_type());
                return;
            }
        };

        // A reference back into the declaration being resolved is the
        // self-reference path.
        if self.decl_stack.iter().any(|d| Rc::ptr_eq(d, &target)) {
            q.mark_self_ref();
            if self.pointer_depth == 0 && self.record_depth == 0 && self.proc_depth == 0 {
                self.diags.error(
                    ErrorKind::IllegalSelfRef,
                    q.loc,
                    format!("type '{}' directly refers to itself", q.text()),
                );
                q.resolve_to(&self.uni.error_type());
                return;
            }
        }

        match &target.kind {
            NamedKind::TypeDecl(decl) => {
                let Some(target_ty) = target.ty() else {
                    q.resolve_to(&self.uni.error_type());
                    return;
                };
                if q.actuals.is_empty() {
                    q.resolve_to(&target_ty);
                } else if decl.meta_params.len() != q.actuals.len() {
                    self.diags.error(
                        ErrorKind::ArityMismatch,
                        q.loc,
                        format!(
                            "'{}' takes {} generic parameters, {} given",
                            target.name,
                            decl.meta_params.len(),
                            q.actuals.len()
                        ),
                    );
                    q.resolve_to(&self.uni.error_type());
                } else {
                    for actual in &q.actuals {
                        self.resolve_type(actual);
                    }
                    // Inside the template, an instantiation with its own
                    // meta parameters means the template itself.
                    let self_inst = self.decl_stack.iter().any(|d| Rc::ptr_eq(d, &target))
                        && q.actuals
                            .iter()
                            .all(|a| matches!(derefed(a).kind, TypeKind::Generic(_)));
                    if self_inst {
                        q.mark_self_ref();
                        q.resolve_to(&target_ty);
                    } else {
                        let instance = self.instantiate(&target, &q.actuals, q.loc);
                        q.resolve_to(&instance);
                    }
                }
            }
            NamedKind::GenericParam => match target.ty() {
                Some(param_ty) => q.resolve_to(&param_ty),
                None => q.resolve_to(&self.uni.error_type()),
            },
            _ => {
                self.diags.error(
                    ErrorKind::TypeMismatch,
                    q.loc,
                    format!("'{}' is a {}, not a type", q.text(), target.kind_name()),
                );
                q.resolve_to(&self.uni.error_type());
            }
        }
    }

    /// Look up the target of a qualifying name expression and record the
    /// resolution on its identifier nodes.
    fn lookup_quali(&mut self, quali: &ExprRef) -> Option<NamedRef> {
        match &quali.kind {
            ExprKind::IdentLeaf(leaf) => {
                let found = oberst_ast::ast::find_in_scope(&self.scope, &leaf.name, true)?;
                leaf.resolve_to(&found);
                leaf.set_role(IdentRole::Rhs);
                Some(found)
            }
            ExprKind::IdentSel(sel) => {
                let module = match &sel.sub.kind {
                    ExprKind::IdentLeaf(leaf) => {
                        let import =
                            oberst_ast::ast::find_in_scope(&self.scope, &leaf.name, true)?;
                        leaf.resolve_to(&import);
                        leaf.set_role(IdentRole::Import);
                        let data = import.as_import()?;
                        data.mark_used();
                        data.module()?
                    }
                    _ => return None,
                };
                let found = module.scope_data()?.find(&sel.name)?;
                if !found.is_public() {
                    self.diags.error(
                        ErrorKind::NotExported,
                        quali.loc,
                        format!(
                            "'{}' is not exported by module '{}'",
                            sel.name, module.name
                        ),
                    );
                    return None;
                }
                sel.resolve_to(&found);
                sel.set_role(IdentRole::Rhs);
                Some(found)
            }
            _ => None,
        }
    }

    /// Produce (or reuse) the instantiation of a generic template.
    ///
    /// The memo lives on the template declaration, so identical
    /// instantiations share identity no matter which module asks.
    fn instantiate(&mut self, template: &NamedRef, actuals: &[TypeRef], loc: Loc) -> TypeRef {
        let key: Vec<usize> = actuals
            .iter()
            .map(|a| Rc::as_ptr(&derefed(a)) as usize)
            .collect();

        let Some(decl) = template.as_type_decl() else {
            return self.uni.error_type();
        };
        if let Some(instance) = decl.instance(&key) {
            return instance;
        }
        let Some(template_ty_raw) = template.ty() else {
            return self.uni.error_type();
        };

        // Instantiating a template with concrete actuals while the template
        // itself is still being resolved would never terminate.
        if self
            .in_progress
            .contains(&(Rc::as_ptr(&template_ty_raw) as usize))
        {
            self.diags.error(
                ErrorKind::GenericCycle,
                loc,
                format!("generic instantiation of '{}' recurses into itself", template.name),
            );
            return self.uni.error_type();
        }

        let mut subst: IndexMap<usize, TypeRef> = IndexMap::new();
        for (param, actual) in decl.meta_params.iter().zip(actuals) {
            subst.insert(Rc::as_ptr(param) as usize, actual.clone());
        }

        debug!(template = %template.name, actuals = actuals.len(), "instantiating generic type");
        let template_ty = derefed(&template_ty_raw);
        let instance = match &template_ty.kind {
            TypeKind::Record(rec) => {
                let inst = Type::new(TypeKind::Record(Record::new(rec.loc, None, vec![])));
                // Diagnostics against the instance resolve to the template
                // source location through the shared declaring entity.
                inst.set_ident(template);
                inst.mark_visited();
                decl.record_instance(key, inst.clone());
                if let Some(module) = self.module.as_module() {
                    module.register_helper(inst.clone());
                }

                if let Some(base) = rec.base_rec() {
                    let inst_rec = inst.as_record().expect("instance is a record");
                    inst_rec.set_base_rec(&base);
                    if let Some(base_rec) = base.as_record() {
                        base_rec.push_sub_rec(&inst);
                    }
                }
                let ctx = InstCtx {
                    template: template.clone(),
                    instance: inst.clone(),
                };
                for field in rec.fields() {
                    let field_ty = field
                        .ty()
                        .map(|t| self.clone_type(&t, &subst, &ctx))
                        .unwrap_or_else(|| self.uni.error_type());
                    let copy = Named::with_ty(
                        field.name.clone(),
                        field.loc,
                        NamedKind::Field(Default::default()),
                        field_ty,
                    );
                    copy.set_visibility(field.visibility());
                    copy.set_scope(&self.module);
                    let inst_rec = inst.as_record().expect("instance is a record");
                    inst_rec.push_field(copy.clone());
                    let _ = inst_rec.insert(copy);
                }
                inst
            }
            _ => {
                let ctx = InstCtx {
                    template: template.clone(),
                    instance: self.uni.error_type(),
                };
                let inst = self.clone_type(&template_ty, &subst, &ctx);
                decl.record_instance(key, inst.clone());
                if let Some(module) = self.module.as_module() {
                    module.register_helper(inst.clone());
                }
                inst
            }
        };
        instance
    }

    /// Structurally clone a template type, substituting generic parameters
    /// with the actuals of the current instantiation.
    fn clone_type(
        &mut self,
        ty: &TypeRef,
        subst: &IndexMap<usize, TypeRef>,
        ctx: &InstCtx,
    ) -> TypeRef {
        match &ty.kind {
            TypeKind::Generic(g) => match g.param() {
                Some(param) => subst
                    .get(&(Rc::as_ptr(&param) as usize))
                    .cloned()
                    .unwrap_or_else(|| ty.clone()),
                None => ty.clone(),
            },
            TypeKind::Quali(q) => {
                let Some(resolved) = q.resolved() else {
                    return ty.clone();
                };
                // A meta parameter behind a reference substitutes directly.
                if let TypeKind::Generic(g) = &resolved.kind {
                    if let Some(param) = g.param() {
                        if let Some(actual) = subst.get(&(Rc::as_ptr(&param) as usize)) {
                            return actual.clone();
                        }
                    }
                }
                // A recursive reference to the template becomes a reference
                // to the instantiation being built.
                if let Some(ident) = resolved.ident() {
                    if Rc::ptr_eq(&ident, &ctx.template) {
                        if q.actuals.is_empty() {
                            return ctx.instance.clone();
                        }
                        let new_actuals: Vec<TypeRef> = q
                            .actuals
                            .iter()
                            .map(|a| self.clone_type(a, subst, ctx))
                            .collect();
                        return self.instantiate(&ident, &new_actuals, q.loc);
                    }
                }
                ty.clone()
            }
            TypeKind::Pointer(p) => {
                let to = self.clone_type(&p.to, subst, ctx);
                if Rc::ptr_eq(&to, &p.to) {
                    ty.clone()
                } else {
                    let clone = Type::new(TypeKind::Pointer(Pointer { loc: p.loc, to }));
                    clone.mark_visited();
                    clone
                }
            }
            TypeKind::Array(a) => {
                let elem = self.clone_type(&a.elem, subst, ctx);
                if Rc::ptr_eq(&elem, &a.elem) {
                    ty.clone()
                } else {
                    let copy = Array::new(a.loc, a.len_expr.clone(), elem);
                    copy.set_len(a.len());
                    let clone = Type::new(TypeKind::Array(copy));
                    clone.mark_visited();
                    clone
                }
            }
            TypeKind::Proc(p) => {
                let formals: Vec<NamedRef> = p
                    .formals
                    .iter()
                    .map(|f| {
                        let (var, const_, receiver) = f.param_modes();
                        let formal_ty = f
                            .ty()
                            .map(|t| self.clone_type(&t, subst, ctx))
                            .unwrap_or_else(|| self.uni.error_type());
                        Named::with_ty(
                            f.name.clone(),
                            f.loc,
                            NamedKind::Param(Param {
                                var,
                                const_,
                                receiver,
                            }),
                            formal_ty,
                        )
                    })
                    .collect();
                let ret = p.ret.as_ref().map(|r| self.clone_type(r, subst, ctx));
                let clone = Type::new(TypeKind::Proc(ProcType {
                    loc: p.loc,
                    formals,
                    ret,
                }));
                clone.mark_visited();
                clone
            }
            _ => ty.clone(),
        }
    }
}

/// Context of one running generic instantiation.
struct InstCtx {
    template: NamedRef,
    instance: TypeRef,
}
