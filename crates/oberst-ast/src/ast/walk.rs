//! Tree walking utilities.
//!
//! Shared traversal logic so the checker and validator do not duplicate
//! recursive descent over expressions and statements.
//!
//! # Design
//!
//! - **Minimal API** - two functions, not a trait hierarchy
//! - **Visitor pattern** - caller provides `FnMut` closures for inspection
//! - **Pre-order traversal** - visitor called before recursing into children
//! - **No context threading** - visitors own their state

use crate::ast::expr::{ExprKind, ExprRef};
use crate::ast::stmt::{Stmt, StmtRef};

/// Recursively walk an expression tree in pre-order.
pub fn walk_expr<V>(expr: &ExprRef, visitor: &mut V)
where
    V: FnMut(&ExprRef),
{
    visitor(expr);

    match &expr.kind {
        ExprKind::Set(set) => {
            for part in &set.parts {
                walk_expr(part, visitor);
            }
        }
        ExprKind::IdentSel(sel) => {
            walk_expr(&sel.sub, visitor);
        }
        ExprKind::Unary(un) => {
            walk_expr(&un.sub, visitor);
        }
        ExprKind::Arg(arg) => {
            walk_expr(&arg.sub, visitor);
            for a in &arg.args {
                walk_expr(a, visitor);
            }
        }
        ExprKind::Binary(bin) => {
            walk_expr(&bin.lhs, visitor);
            walk_expr(&bin.rhs, visitor);
        }
        ExprKind::Literal(_) | ExprKind::IdentLeaf(_) => {}
    }
}

/// Recursively walk a statement sequence in pre-order.
///
/// Only statements are visited; use [`walk_expr`] on the expressions of the
/// statements the visitor cares about.
pub fn walk_stmts<V>(stmts: &[StmtRef], visitor: &mut V)
where
    V: FnMut(&StmtRef),
{
    for stmt in stmts {
        visitor(stmt);
        match &**stmt {
            Stmt::IfLoop(s) => {
                for branch in &s.branches {
                    walk_stmts(branch, visitor);
                }
                walk_stmts(&s.els, visitor);
            }
            Stmt::For(s) => walk_stmts(&s.body, visitor),
            Stmt::Case(s) => {
                for arm in &s.arms {
                    walk_stmts(&arm.body, visitor);
                }
                walk_stmts(&s.els, visitor);
            }
            Stmt::Call(_) | Stmt::Return(_) | Stmt::Exit(_) | Stmt::Assign(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::expr::{BinExpr, BinOp, Expr, IdentLeaf, Literal, Value};
    use crate::ast::stmt::{ExitStmt, IfLoop, IfLoopOp};
    use crate::foundation::Loc;
    use std::rc::Rc;

    #[test]
    fn test_walk_expr_visits_all_nodes() {
        // x + 1
        let lhs = Expr::new(Loc::none(), ExprKind::IdentLeaf(IdentLeaf::new("x")));
        let rhs = Expr::new(Loc::none(), ExprKind::Literal(Literal::new(Value::Int(1))));
        let sum = Expr::new(
            Loc::none(),
            ExprKind::Binary(BinExpr {
                op: BinOp::Add,
                lhs,
                rhs,
            }),
        );

        let mut count = 0;
        walk_expr(&sum, &mut |_| count += 1);
        assert_eq!(count, 3);
    }

    #[test]
    fn test_walk_stmts_descends_into_branches() {
        let exit = Rc::new(Stmt::Exit(ExitStmt { loc: Loc::none() }));
        let body = vec![exit];
        let loop_stmt = Rc::new(Stmt::IfLoop(IfLoop {
            loc: Loc::none(),
            op: IfLoopOp::Loop,
            conds: vec![],
            branches: vec![body],
            els: vec![],
        }));

        let mut exits = 0;
        walk_stmts(&[loop_stmt], &mut |s| {
            if matches!(&**s, Stmt::Exit(_)) {
                exits += 1;
            }
        });
        assert_eq!(exits, 1);
    }
}
