//! Statement checking.

use super::compat::{assignment_compatible, is_lvalue, root_entity, write_blocked};
use super::Checker;
use crate::resolve::eval;
use oberst_ast::ast::{
    derefed, extends, is_error, record_of, walk_stmts, ArgOp, BaseKind, BinOp, CaseStmt, ExprKind,
    ExprRef, ForStmt, IdentRole, IfLoop, IfLoopOp, NamedKind, NamedRef, Stmt, StmtRef, TypeKind,
    TypeRef, Value,
};
use oberst_ast::error::ErrorKind;
use std::rc::Rc;

impl Checker<'_> {
    /// Check one statement.
    pub(crate) fn check_stmt(&mut self, stmt: &StmtRef) {
        match &**stmt {
            Stmt::Call(s) => self.check_call_stmt(&s.call),
            Stmt::Return(s) => self.check_return(stmt, s.value.as_ref()),
            Stmt::Exit(s) => {
                if self.loop_depth == 0 {
                    self.diags.error(
                        ErrorKind::ExitOutsideLoop,
                        s.loc,
                        "EXIT is only valid inside a LOOP statement".to_string(),
                    );
                }
            }
            Stmt::Assign(s) => self.check_assign(&s.lhs, &s.rhs),
            Stmt::IfLoop(s) => self.check_if_loop(s),
            Stmt::For(s) => self.check_for(s),
            Stmt::Case(s) => self.check_case(s),
        }
    }

    /// Check a statement sequence.
    pub(crate) fn check_seq(&mut self, stmts: &[StmtRef]) {
        for stmt in stmts {
            self.check_stmt(stmt);
        }
    }

    fn check_call_stmt(&mut self, call: &ExprRef) {
        let ty = self.check_expr(call);
        let is_call = match &call.kind {
            ExprKind::Arg(arg) => arg.op.get() == ArgOp::Call,
            _ => false,
        };
        if !is_call && !is_error(&ty) {
            self.diags.error(
                ErrorKind::NotCallable,
                call.loc,
                "statement is not a procedure call".to_string(),
            );
        }
    }

    fn check_return(&mut self, stmt: &StmtRef, value: Option<&ExprRef>) {
        match (&self.ret_ty.clone(), value) {
            (Some(ret), Some(v)) => {
                let ty = self.check_expr(v);
                if !assignment_compatible(ret, &ty, Some(v)) {
                    self.diags.error(
                        ErrorKind::AssignIncompatible,
                        v.loc,
                        format!(
                            "cannot return {} from a procedure returning {}",
                            ty.pretty(),
                            ret.pretty()
                        ),
                    );
                }
            }
            (Some(ret), None) => {
                self.diags.error(
                    ErrorKind::TypeMismatch,
                    stmt.loc(),
                    format!("a value of type {} must be returned", ret.pretty()),
                );
            }
            (None, Some(v)) => {
                self.check_expr(v);
                self.diags.error(
                    ErrorKind::TypeMismatch,
                    v.loc,
                    "this procedure does not return a value".to_string(),
                );
            }
            (None, None) => {}
        }
    }

    fn check_assign(&mut self, lhs: &ExprRef, rhs: &ExprRef) {
        let lhs_ty = self.check_expr(lhs);
        let rhs_ty = self.check_expr(rhs);

        if !is_error(&lhs_ty) && !is_lvalue(lhs) {
            self.diags.error(
                ErrorKind::NotLvalue,
                lhs.loc,
                "left side of an assignment must be a designator".to_string(),
            );
            return;
        }
        if let Some(reason) = write_blocked(lhs, &self.module) {
            self.diags.error(
                ErrorKind::ReadonlyViolation,
                lhs.loc,
                format!("cannot assign here: {}", reason),
            );
        }
        self.set_role_on_root(lhs, IdentRole::Lhs);

        if !assignment_compatible(&lhs_ty, &rhs_ty, Some(rhs)) {
            self.diags.error(
                ErrorKind::AssignIncompatible,
                rhs.loc,
                format!(
                    "cannot assign {} to {}",
                    rhs_ty.pretty(),
                    lhs_ty.pretty()
                ),
            );
        }
    }

    fn check_if_loop(&mut self, stmt: &IfLoop) {
        match stmt.op {
            IfLoopOp::If | IfLoopOp::While | IfLoopOp::Repeat => {
                for (cond, branch) in stmt.conds.iter().zip(&stmt.branches) {
                    self.expect_bool(cond);
                    self.check_seq(branch);
                }
                self.check_seq(&stmt.els);
            }
            IfLoopOp::With => {
                // Each guard narrows the tested variable inside its branch.
                for (cond, branch) in stmt.conds.iter().zip(&stmt.branches) {
                    self.expect_bool(cond);
                    let narrowing = self.with_narrowing(cond);
                    if let Some((entity, ty)) = narrowing.clone() {
                        self.narrowed.push((entity, ty));
                    }
                    self.check_seq(branch);
                    if narrowing.is_some() {
                        self.narrowed.pop();
                    }
                }
                self.check_seq(&stmt.els);
            }
            IfLoopOp::Loop => {
                self.loop_depth += 1;
                for branch in &stmt.branches {
                    self.check_seq(branch);
                }
                self.loop_depth -= 1;
            }
        }
    }

    fn expect_bool(&mut self, expr: &ExprRef) {
        let ty = self.check_expr(expr);
        if is_error(&ty) {
            return;
        }
        if derefed(&ty).base_kind() != Some(BaseKind::Bool) {
            self.diags.error(
                ErrorKind::TypeMismatch,
                expr.loc,
                format!("guard must be BOOLEAN, found {}", ty.pretty()),
            );
        }
    }

    /// The narrowing implied by a WITH guard of the form `v IS T`.
    fn with_narrowing(&mut self, cond: &ExprRef) -> Option<(NamedRef, TypeRef)> {
        let ExprKind::Binary(bin) = &cond.kind else {
            return None;
        };
        if bin.op != BinOp::Is {
            return None;
        }
        let entity = bin.lhs.ident()?;
        let narrow = self.type_name_of(&bin.rhs)?;
        let target = self.narrow_target(&entity, &narrow);
        Some((entity, target))
    }

    /// The narrowed type seen inside a guard branch: a pointer scrutinee
    /// narrows to a pointer of the tested record, a record scrutinee to the
    /// record itself.
    fn narrow_target(&mut self, entity: &NamedRef, tested: &TypeRef) -> TypeRef {
        let static_ty = entity.ty().map(|t| derefed(&t));
        let tested = derefed(tested);
        match (static_ty.map(|t| matches!(t.kind, TypeKind::Pointer(_))), &tested.kind) {
            (Some(true), TypeKind::Record(_)) => {
                // The tested name is a record; the variable stays a pointer.
                let ptr = oberst_ast::ast::Type::new(TypeKind::Pointer(
                    oberst_ast::ast::Pointer {
                        loc: tested.loc(),
                        to: tested.clone(),
                    },
                ));
                if let Some(module) = self.module.as_module() {
                    module.register_helper(ptr.clone());
                }
                ptr
            }
            _ => tested,
        }
    }

    fn check_for(&mut self, stmt: &ForStmt) {
        let control_ty = self.check_expr(&stmt.control);
        let control = stmt.control.ident();

        let control_ok = control
            .as_ref()
            .map(|c| {
                matches!(
                    c.kind,
                    NamedKind::LocalVar | NamedKind::Variable | NamedKind::Param(_)
                )
            })
            .unwrap_or(false)
            && derefed(&control_ty)
                .base_kind()
                .map(BaseKind::is_integer)
                .unwrap_or(false);
        if !control_ok && !is_error(&control_ty) {
            self.diags.error(
                ErrorKind::TypeMismatch,
                stmt.control.loc,
                "FOR control must be an integer variable".to_string(),
            );
        }
        self.set_role_on_root(&stmt.control, IdentRole::Lhs);

        for bound in [&stmt.from, &stmt.to] {
            let ty = self.check_expr(bound);
            if !is_error(&ty) && !assignment_compatible(&control_ty, &ty, Some(bound)) {
                self.diags.error(
                    ErrorKind::TypeMismatch,
                    bound.loc,
                    format!("FOR bound of type {} does not fit", ty.pretty()),
                );
            }
        }

        match &stmt.by {
            Some(by) => {
                self.check_expr(by);
                match eval::eval(by, Some(&self.scope)) {
                    Value::Int(0) => {
                        self.diags.error(
                            ErrorKind::ForStepZero,
                            by.loc,
                            "FOR step must not be zero".to_string(),
                        );
                    }
                    Value::Int(step) => stmt.set_by_val(Value::Int(step)),
                    _ => {
                        self.diags.error(
                            ErrorKind::ConstExpected,
                            by.loc,
                            "FOR step must be a constant integer".to_string(),
                        );
                    }
                }
            }
            None => stmt.set_by_val(Value::Int(1)),
        }

        self.check_seq(&stmt.body);

        // The body must not assign the control variable.
        if let Some(control) = control {
            let mut writes = Vec::new();
            walk_stmts(&stmt.body, &mut |s: &StmtRef| {
                if let Stmt::Assign(assign) = &**s {
                    if let Some(root) = root_entity(&assign.lhs) {
                        if Rc::ptr_eq(&root, &control) {
                            writes.push(assign.lhs.loc);
                        }
                    }
                }
            });
            for loc in writes {
                self.diags.error(
                    ErrorKind::ReadonlyViolation,
                    loc,
                    format!("FOR control variable '{}' cannot be assigned", control.name),
                );
            }
        }
    }

    fn check_case(&mut self, stmt: &CaseStmt) {
        let scrutinee_ty = self.check_expr(&stmt.expr);
        if is_error(&scrutinee_ty) {
            for arm in &stmt.arms {
                self.check_seq(&arm.body);
            }
            self.check_seq(&stmt.els);
            return;
        }

        if record_of(&scrutinee_ty).is_some() {
            stmt.mark_type_case();
            self.check_type_case(stmt, &scrutinee_ty);
        } else {
            self.check_value_case(stmt, &scrutinee_ty);
        }
    }

    /// A type case: labels are type names; the scrutinee narrows per arm.
    fn check_type_case(&mut self, stmt: &CaseStmt, scrutinee_ty: &TypeRef) {
        let scrutinee = stmt.expr.ident();
        let mut seen: Vec<TypeRef> = Vec::new();

        for arm in &stmt.arms {
            let mut arm_narrow: Option<TypeRef> = None;
            for label in &arm.labels {
                let Some(label_ty) = self.type_name_of(label) else {
                    self.diags.error(
                        ErrorKind::InvalidGuard,
                        label.loc,
                        "type case labels must be type names".to_string(),
                    );
                    continue;
                };
                if !extends(&label_ty, scrutinee_ty) {
                    self.diags.error(
                        ErrorKind::InvalidGuard,
                        label.loc,
                        format!(
                            "{} is not an extension of {}",
                            label_ty.pretty(),
                            scrutinee_ty.pretty()
                        ),
                    );
                    continue;
                }
                let label_rec = record_of(&label_ty);
                let duplicate = seen.iter().any(|prev| {
                    match (record_of(prev), &label_rec) {
                        (Some(a), Some(b)) => Rc::ptr_eq(&a, b),
                        _ => false,
                    }
                });
                if duplicate {
                    self.diags.error(
                        ErrorKind::CaseLabelOverlap,
                        label.loc,
                        format!("type {} is already covered", label_ty.pretty()),
                    );
                }
                seen.push(label_ty.clone());
                if arm.labels.len() == 1 {
                    arm_narrow = Some(label_ty);
                }
            }

            match (scrutinee.clone(), arm_narrow) {
                (Some(entity), Some(narrow)) => {
                    let narrowed = self.narrow_target(&entity, &narrow);
                    self.narrowed.push((entity, narrowed));
                    self.check_seq(&arm.body);
                    self.narrowed.pop();
                }
                _ => self.check_seq(&arm.body),
            }
        }
        self.check_seq(&stmt.els);
    }

    /// A value case over an ordinal or string scrutinee.
    fn check_value_case(&mut self, stmt: &CaseStmt, scrutinee_ty: &TypeRef) {
        let kind = derefed(scrutinee_ty).base_kind();
        let ordinal = matches!(kind, Some(k) if k.is_integer() || k.is_char())
            || matches!(derefed(scrutinee_ty).kind, TypeKind::Enum(_));
        let stringish = super::compat::is_stringish(scrutinee_ty);
        if !ordinal && !stringish {
            self.diags.error(
                ErrorKind::TypeMismatch,
                stmt.expr.loc,
                format!("cannot case over {}", scrutinee_ty.pretty()),
            );
        }

        let mut intervals: Vec<(i64, i64)> = Vec::new();
        let mut strings: Vec<String> = Vec::new();

        for arm in &stmt.arms {
            for label in &arm.labels {
                match &label.kind {
                    ExprKind::Binary(bin) if bin.op == BinOp::Range => {
                        let lo = self.fold_label(&bin.lhs);
                        let hi = self.fold_label(&bin.rhs);
                        // The range label carries its element type.
                        let elem_ty = bin
                            .lhs
                            .ty()
                            .unwrap_or_else(|| self.uni.int_type());
                        label.set_ty(&elem_ty);
                        match (ordinal_value(&lo), ordinal_value(&hi)) {
                            (Some(lo), Some(hi)) if lo <= hi => {
                                self.add_interval(&mut intervals, (lo, hi), label.loc);
                            }
                            _ => {
                                self.diags.error(
                                    ErrorKind::ConstExpected,
                                    label.loc,
                                    "case label range must be constant and ordered".to_string(),
                                );
                            }
                        }
                    }
                    _ => match self.fold_label(label) {
                        Value::Str(s) if stringish => {
                            if strings.contains(&s) {
                                self.diags.error(
                                    ErrorKind::CaseLabelOverlap,
                                    label.loc,
                                    format!("label \"{}\" is already covered", s),
                                );
                            } else {
                                strings.push(s);
                            }
                        }
                        other => match ordinal_value(&other) {
                            Some(v) if ordinal => {
                                self.add_interval(&mut intervals, (v, v), label.loc);
                            }
                            _ => {
                                self.diags.error(
                                    ErrorKind::ConstExpected,
                                    label.loc,
                                    "case labels must be compile-time constants".to_string(),
                                );
                            }
                        },
                    },
                }
            }
            self.check_seq(&arm.body);
        }
        self.check_seq(&stmt.els);
    }

    fn add_interval(
        &mut self,
        intervals: &mut Vec<(i64, i64)>,
        new: (i64, i64),
        loc: oberst_ast::foundation::Loc,
    ) {
        let overlaps = intervals
            .iter()
            .any(|(lo, hi)| new.0 <= *hi && *lo <= new.1);
        if overlaps {
            self.diags.error(
                ErrorKind::CaseLabelOverlap,
                loc,
                "case label overlaps an earlier label".to_string(),
            );
        }
        intervals.push(new);
    }
}

/// A case label constant as an ordinal.
fn ordinal_value(value: &Value) -> Option<i64> {
    match value {
        Value::Int(i) => Some(*i),
        Value::Char(c) => Some(*c as i64),
        _ => None,
    }
}
