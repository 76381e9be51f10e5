//! Final validation pass.
//!
//! Cross-cutting checks after resolution and checking:
//!
//! 1. **Definite return** - a value-returning procedure returns on every
//!    path through its body
//! 2. **Override compatibility** - a method override keeps the overridden
//!    signature and does not narrow its visibility
//! 3. **Import liveness** - imports never used by any qualified access get
//!    a warning
//!
//! Validation errors mark the module but leave its graph intact.

use oberst_ast::ast::{
    equal_proc_types, BuiltInKind, ExprKind, NamedKind, NamedRef, Stmt, StmtRef, Visibility,
};
use oberst_ast::error::{Diagnostics, ErrorKind};
use tracing::debug;

/// Run the validator over a fully checked module.
pub fn validate_module(module: &NamedRef, diags: &mut Diagnostics) {
    debug!(module = %module.name, "validating module");
    let Some(data) = module.as_module() else {
        return;
    };

    validate_scope(module, data.is_def, diags);

    for import in data.imports() {
        if let Some(imp) = import.as_import() {
            if !imp.is_used() {
                diags.warning(
                    ErrorKind::UnusedImport,
                    import.loc,
                    format!("import '{}' is never used", import.name),
                );
            }
        }
    }
}

fn validate_scope(owner: &NamedRef, is_def: bool, diags: &mut Diagnostics) {
    let entities = match owner.as_module() {
        Some(module) => module.decls(),
        None => match owner.scope_data() {
            Some(data) => data.entries(),
            None => return,
        },
    };
    for entity in entities {
        if let NamedKind::Procedure(_) = &entity.kind {
            validate_procedure(&entity, is_def, diags);
            validate_scope(&entity, is_def, diags);
        }
    }
}

fn validate_procedure(proc: &NamedRef, is_def: bool, diags: &mut Diagnostics) {
    let Some(data) = proc.as_procedure() else {
        return;
    };

    // Definition modules carry no bodies.
    let returns_value = proc
        .ty()
        .and_then(|t| t.as_proc().and_then(|p| p.ret.clone()))
        .is_some();
    if returns_value && !is_def && !seq_returns(&data.scope.body) {
        diags.error(
            ErrorKind::MissingReturn,
            proc.loc,
            format!("procedure '{}' does not return on every path", proc.name),
        );
        proc.mark_errors();
    }

    if let Some(super_method) = data.super_method() {
        validate_override(proc, &super_method, diags);
    }
}

/// An override keeps arity, parameter types and return type, and its
/// visibility never narrows below the overridden method's.
fn validate_override(proc: &NamedRef, super_method: &NamedRef, diags: &mut Diagnostics) {
    let signatures = (
        proc.ty().and_then(|t| t.as_proc().map(|_| t.clone())),
        super_method.ty().and_then(|t| t.as_proc().map(|_| t.clone())),
    );
    if let (Some(sub_ty), Some(sup_ty)) = signatures {
        let (Some(sub_sig), Some(sup_sig)) = (sub_ty.as_proc(), sup_ty.as_proc()) else {
            return;
        };
        if !equal_proc_types(sub_sig, sup_sig) {
            diags.error(
                ErrorKind::OverrideSignatureMismatch,
                proc.loc,
                format!(
                    "override of '{}' changes the overridden signature",
                    proc.name
                ),
            );
            proc.mark_errors();
        }
    }

    if visibility_rank(proc.visibility()) < visibility_rank(super_method.visibility()) {
        diags.error(
            ErrorKind::OverrideVisibilityNarrow,
            proc.loc,
            format!(
                "override of '{}' narrows the overridden visibility",
                proc.name
            ),
        );
        proc.mark_errors();
    }
}

fn visibility_rank(visibility: Visibility) -> u8 {
    match visibility {
        Visibility::NotApplicable | Visibility::Private => 0,
        Visibility::ReadOnly => 1,
        Visibility::ReadWrite => 2,
    }
}

/// Whether a statement sequence definitely returns (or diverges).
fn seq_returns(seq: &[StmtRef]) -> bool {
    seq.iter().any(stmt_returns)
}

fn stmt_returns(stmt: &StmtRef) -> bool {
    match &**stmt {
        Stmt::Return(_) => true,
        // HALT never comes back.
        Stmt::Call(call) => match &call.call.kind {
            ExprKind::Arg(arg) => arg
                .sub
                .ident()
                .and_then(|t| t.as_builtin().map(|b| b.func == BuiltInKind::Halt))
                .unwrap_or(false),
            _ => false,
        },
        Stmt::IfLoop(s) => match s.op {
            oberst_ast::ast::IfLoopOp::If => {
                !s.els.is_empty()
                    && s.branches.iter().all(|b| seq_returns(b))
                    && seq_returns(&s.els)
            }
            // The body runs at least once.
            oberst_ast::ast::IfLoopOp::Repeat => {
                s.branches.first().map(|b| seq_returns(b)).unwrap_or(false)
            }
            // A LOOP without EXIT never falls through.
            oberst_ast::ast::IfLoopOp::Loop => {
                let mut has_exit = false;
                for branch in &s.branches {
                    oberst_ast::ast::walk_stmts(branch, &mut |inner: &StmtRef| {
                        if matches!(&**inner, Stmt::Exit(_)) {
                            has_exit = true;
                        }
                    });
                }
                !has_exit
            }
            _ => false,
        },
        Stmt::Case(s) => {
            !s.els.is_empty()
                && s.arms.iter().all(|arm| seq_returns(&arm.body))
                && seq_returns(&s.els)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oberst_ast::ast::{Expr, IfLoop, IfLoopOp, Literal, ReturnStmt, Value};
    use oberst_ast::foundation::Loc;
    use std::rc::Rc;

    fn ret() -> StmtRef {
        Rc::new(Stmt::Return(ReturnStmt {
            loc: Loc::none(),
            value: Some(Expr::new(
                Loc::none(),
                ExprKind::Literal(Literal::new(Value::Int(0))),
            )),
        }))
    }

    fn assign() -> StmtRef {
        let lhs = Expr::new(
            Loc::none(),
            ExprKind::IdentLeaf(oberst_ast::ast::IdentLeaf::new("x")),
        );
        let rhs = Expr::new(Loc::none(), ExprKind::Literal(Literal::new(Value::Int(1))));
        Rc::new(Stmt::Assign(oberst_ast::ast::AssignStmt {
            loc: Loc::none(),
            lhs,
            rhs,
        }))
    }

    fn if_stmt(branches: Vec<Vec<StmtRef>>, els: Vec<StmtRef>) -> StmtRef {
        let cond = Expr::new(
            Loc::none(),
            ExprKind::Literal(Literal::new(Value::Bool(true))),
        );
        Rc::new(Stmt::IfLoop(IfLoop {
            loc: Loc::none(),
            op: IfLoopOp::If,
            conds: vec![cond],
            branches,
            els,
        }))
    }

    #[test]
    fn test_plain_return_sequence() {
        assert!(seq_returns(&[assign(), ret()]));
        assert!(!seq_returns(&[assign()]));
    }

    #[test]
    fn test_if_needs_else_for_definite_return() {
        // IF with a returning branch but no ELSE can fall through.
        assert!(!seq_returns(&[if_stmt(vec![vec![ret()]], vec![])]));
        // IF where every branch and the ELSE return.
        assert!(seq_returns(&[if_stmt(vec![vec![ret()]], vec![ret()])]));
        // A non-returning branch breaks it.
        assert!(!seq_returns(&[if_stmt(vec![vec![assign()]], vec![ret()])]));
    }

    #[test]
    fn test_loop_without_exit_diverges() {
        let endless = Rc::new(Stmt::IfLoop(IfLoop {
            loc: Loc::none(),
            op: IfLoopOp::Loop,
            conds: vec![],
            branches: vec![vec![assign()]],
            els: vec![],
        }));
        assert!(seq_returns(&[endless]));

        let with_exit = Rc::new(Stmt::IfLoop(IfLoop {
            loc: Loc::none(),
            op: IfLoopOp::Loop,
            conds: vec![],
            branches: vec![vec![Rc::new(Stmt::Exit(oberst_ast::ast::ExitStmt {
                loc: Loc::none(),
            }))]],
            els: vec![],
        }));
        assert!(!seq_returns(&[with_exit]));
    }
}
