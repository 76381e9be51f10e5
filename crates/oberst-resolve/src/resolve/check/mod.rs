//! Expression and statement checker.
//!
//! After this pass runs over a module, every expression has a type, every
//! identifier occurrence has a resolved target and a role annotation, and
//! every statement is well-formed. Local errors attach the sentinel error
//! type to the offending node and checking continues, so one invocation
//! reports as many findings as possible.
//!
//! Type narrowing for WITH statements and type cases is a stack of
//! (entity, narrowed type) overrides consulted whenever an identifier
//! occurrence is typed.

pub mod compat;
mod expr;
mod stmt;

use crate::resolve::pipeline::CancelFlag;
use crate::resolve::universe::Universe;
use oberst_ast::ast::{NamedKind, NamedRef, TypeRef};
use oberst_ast::error::{Diagnostics, ErrorKind};
use oberst_ast::foundation::Loc;
use std::rc::Rc;
use tracing::debug;

/// Check every expression and statement of a module.
///
/// Cancellation is observed between top-level statements of the module
/// initializer; a cancelled module is discarded by the pipeline.
pub fn check_module(
    module: &NamedRef,
    uni: &Universe,
    diags: &mut Diagnostics,
    cancel: &CancelFlag,
) {
    debug!(module = %module.name, "checking module");
    let mut checker = Checker {
        uni,
        module: module.clone(),
        diags,
        scope: module.clone(),
        ret_ty: None,
        loop_depth: 0,
        narrowed: Vec::new(),
    };
    checker.check_declarations(module);

    if let Some(data) = module.as_module() {
        for stmt in &data.scope.body {
            if cancel.is_cancelled() {
                return;
            }
            checker.check_stmt(stmt);
        }
    }
}

pub(crate) struct Checker<'a> {
    pub(crate) uni: &'a Universe,
    pub(crate) module: NamedRef,
    pub(crate) diags: &'a mut Diagnostics,
    /// Current scope for identifier resolution
    pub(crate) scope: NamedRef,
    /// Declared return type of the procedure being checked
    pub(crate) ret_ty: Option<TypeRef>,
    /// Nesting depth of LOOP statements
    pub(crate) loop_depth: usize,
    /// Narrowing overrides, innermost last
    pub(crate) narrowed: Vec<(NamedRef, TypeRef)>,
}

impl Checker<'_> {
    /// Check the declarations of a scope: constant expressions and the
    /// procedures with their bodies. Module declaration lists include the
    /// receiver procedures missing from the scope name table.
    fn check_declarations(&mut self, owner: &NamedRef) {
        let entities = match owner.as_module() {
            Some(module) => module.decls(),
            None => match owner.scope_data() {
                Some(data) => data.entries(),
                None => return,
            },
        };
        for entity in entities {
            match &entity.kind {
                NamedKind::Const(c) => {
                    if let Some(expr) = c.expr.clone() {
                        self.check_expr(&expr);
                        if !c.val().is_valid() {
                            self.diags.error(
                                ErrorKind::ConstExpected,
                                entity.loc,
                                format!("'{}' is not a compile-time constant", entity.name),
                            );
                            entity.mark_errors();
                        }
                    }
                }
                NamedKind::Procedure(_) => self.check_procedure(&entity),
                _ => {}
            }
        }
    }

    /// Check a procedure: local declarations, then the body under the
    /// procedure's scope and return type.
    fn check_procedure(&mut self, proc: &NamedRef) {
        let saved_scope = std::mem::replace(&mut self.scope, proc.clone());
        let saved_ret = self.ret_ty.take();
        let saved_depth = std::mem::replace(&mut self.loop_depth, 0);

        self.ret_ty = proc
            .ty()
            .and_then(|t| t.as_proc().and_then(|p| p.ret.clone()));

        self.check_declarations(proc);
        if let Some(data) = proc.as_procedure() {
            let body: Vec<_> = data.scope.body.to_vec();
            for stmt in &body {
                self.check_stmt(stmt);
            }
        }

        self.loop_depth = saved_depth;
        self.ret_ty = saved_ret;
        self.scope = saved_scope;
    }

    /// The narrowed static type of an entity, if a WITH or type case is
    /// active for it.
    pub(crate) fn narrowed_ty(&self, entity: &NamedRef) -> Option<TypeRef> {
        self.narrowed
            .iter()
            .rev()
            .find(|(e, _)| Rc::ptr_eq(e, entity))
            .map(|(_, ty)| ty.clone())
    }

    /// Report an error and produce the sentinel type.
    pub(crate) fn err(&mut self, kind: ErrorKind, loc: Loc, message: String) -> TypeRef {
        self.diags.error(kind, loc, message);
        self.uni.error_type()
    }
}
