//! Compile-time constant folding.
//!
//! Folds literal, unary, binary, and set expressions into [`Value`]s for
//! constant declarations, array lengths, case labels, and FOR steps.
//! Integer division and modulus are floored (rounded toward negative
//! infinity). Anything that is not a compile-time constant folds to
//! [`Value::Invalid`]; the caller decides whether that is an error.

use oberst_ast::ast::{
    find_in_scope, BinOp, BuiltInKind, ExprKind, ExprRef, NamedKind, NamedRef, UnOp, Value,
    SET_BIT_LEN,
};

/// Fold an expression to a compile-time value.
///
/// When `scope` is given, unresolved identifier leaves are resolved along
/// the scope chain first (the type resolver folds array lengths before the
/// checker has run). Resolution results are recorded on the expression so
/// later passes see them.
pub fn eval(expr: &ExprRef, scope: Option<&NamedRef>) -> Value {
    match &expr.kind {
        ExprKind::Literal(lit) => lit.value.clone(),

        ExprKind::IdentLeaf(leaf) => {
            let target = leaf.ident().or_else(|| {
                let found = scope.and_then(|s| find_in_scope(s, &leaf.name, true))?;
                leaf.resolve_to(&found);
                Some(found)
            });
            const_value(target)
        }

        ExprKind::IdentSel(sel) => {
            let target = sel.ident().or_else(|| {
                // Qualified constant: the sub must name an import.
                let scope = scope?;
                let module = match &sel.sub.kind {
                    ExprKind::IdentLeaf(leaf) => {
                        let import = leaf
                            .ident()
                            .or_else(|| find_in_scope(scope, &leaf.name, true))?;
                        leaf.resolve_to(&import);
                        let data = import.as_import()?;
                        data.mark_used();
                        data.module()
                    }
                    _ => None,
                }?;
                let found = module.scope_data()?.find(&sel.name)?;
                if !found.is_public() {
                    return None;
                }
                sel.resolve_to(&found);
                Some(found)
            });
            const_value(target)
        }

        ExprKind::Unary(un) => match (un.op, eval(&un.sub, scope)) {
            (UnOp::Neg, Value::Int(i)) => i.checked_neg().map(Value::Int).unwrap_or(Value::Invalid),
            (UnOp::Neg, Value::Real(r)) => Value::Real(-r),
            (UnOp::Not, Value::Bool(b)) => Value::Bool(!b),
            _ => Value::Invalid,
        },

        ExprKind::Binary(bin) => {
            let lhs = eval(&bin.lhs, scope);
            let rhs = eval(&bin.rhs, scope);
            eval_binary(bin.op, lhs, rhs)
        }

        ExprKind::Set(set) => {
            let mut bits: u32 = 0;
            for part in &set.parts {
                match &part.kind {
                    ExprKind::Binary(range) if range.op == BinOp::Range => {
                        let lo = eval(&range.lhs, scope);
                        let hi = eval(&range.rhs, scope);
                        match (lo, hi) {
                            (Value::Int(lo), Value::Int(hi))
                                if set_element(lo).is_some()
                                    && set_element(hi).is_some()
                                    && lo <= hi =>
                            {
                                for bit in lo..=hi {
                                    bits |= 1 << bit;
                                }
                            }
                            _ => return Value::Invalid,
                        }
                    }
                    _ => match eval(part, scope) {
                        Value::Int(i) => match set_element(i) {
                            Some(bit) => bits |= 1 << bit,
                            None => return Value::Invalid,
                        },
                        _ => return Value::Invalid,
                    },
                }
            }
            Value::Set(bits)
        }

        ExprKind::Arg(arg) => eval_builtin_call(arg, scope),
    }
}

/// The folded value of a constant entity, if the target is one.
fn const_value(target: Option<NamedRef>) -> Value {
    match target {
        Some(entity) => match entity.as_const() {
            Some(data) => data.val(),
            None => Value::Invalid,
        },
        None => Value::Invalid,
    }
}

fn set_element(i: i64) -> Option<u32> {
    if (0..SET_BIT_LEN as i64).contains(&i) {
        Some(i as u32)
    } else {
        None
    }
}

fn eval_binary(op: BinOp, lhs: Value, rhs: Value) -> Value {
    use BinOp::*;
    use Value::*;

    match (op, lhs, rhs) {
        // Integer arithmetic; overflow is not a constant.
        (Add, Int(a), Int(b)) => a.checked_add(b).map(Int).unwrap_or(Invalid),
        (Sub, Int(a), Int(b)) => a.checked_sub(b).map(Int).unwrap_or(Invalid),
        (Mul, Int(a), Int(b)) => a.checked_mul(b).map(Int).unwrap_or(Invalid),
        (Div, Int(a), Int(b)) if b != 0 => Int(a.div_euclid(b)),
        (Mod, Int(a), Int(b)) if b != 0 => Int(a.rem_euclid(b)),
        (Fdiv, Int(a), Int(b)) if b != 0 => Real(a as f64 / b as f64),

        // Mixed and real arithmetic.
        (Add, Real(a), Real(b)) => Real(a + b),
        (Sub, Real(a), Real(b)) => Real(a - b),
        (Mul, Real(a), Real(b)) => Real(a * b),
        (Fdiv, Real(a), Real(b)) if b != 0.0 => Real(a / b),
        (op, Int(a), Real(b)) => eval_binary(op, Real(a as f64), Real(b)),
        (op, Real(a), Int(b)) => eval_binary(op, Real(a), Real(b as f64)),

        // Boolean connectives.
        (And, Bool(a), Bool(b)) => Bool(a && b),
        (Or, Bool(a), Bool(b)) => Bool(a || b),

        // Set algebra: union, difference, intersection, symmetric
        // difference.
        (Add, Set(a), Set(b)) => Set(a | b),
        (Sub, Set(a), Set(b)) => Set(a & !b),
        (Mul, Set(a), Set(b)) => Set(a & b),
        (Fdiv, Set(a), Set(b)) => Set(a ^ b),
        (In, Int(a), Set(b)) => match set_element(a) {
            Some(bit) => Bool(b & (1 << bit) != 0),
            None => Invalid,
        },

        // Relations.
        (Eq, a, b) => bool_of(compare(&a, &b), |o| o == std::cmp::Ordering::Equal),
        (Neq, a, b) => bool_of(compare(&a, &b), |o| o != std::cmp::Ordering::Equal),
        (Lt, a, b) => bool_of(compare(&a, &b), |o| o == std::cmp::Ordering::Less),
        (Leq, a, b) => bool_of(compare(&a, &b), |o| o != std::cmp::Ordering::Greater),
        (Gt, a, b) => bool_of(compare(&a, &b), |o| o == std::cmp::Ordering::Greater),
        (Geq, a, b) => bool_of(compare(&a, &b), |o| o != std::cmp::Ordering::Less),

        _ => Invalid,
    }
}

/// Ordering of two constant values; `None` when they do not compare.
fn compare(lhs: &Value, rhs: &Value) -> Option<std::cmp::Ordering> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Real(a), Value::Real(b)) => a.partial_cmp(b),
        (Value::Int(a), Value::Real(b)) => (*a as f64).partial_cmp(b),
        (Value::Real(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Char(a), Value::Char(b)) => Some(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn bool_of(
    ordering: Option<std::cmp::Ordering>,
    test: impl FnOnce(std::cmp::Ordering) -> bool,
) -> Value {
    match ordering {
        Some(o) => Value::Bool(test(o)),
        None => Value::Invalid,
    }
}

/// Fold calls of the value-producing builtins.
fn eval_builtin_call(arg: &oberst_ast::ast::ArgExpr, scope: Option<&NamedRef>) -> Value {
    let builtin = match &arg.sub.kind {
        ExprKind::IdentLeaf(leaf) => {
            let target = leaf.ident().or_else(|| {
                let found = scope.and_then(|s| find_in_scope(s, &leaf.name, true))?;
                leaf.resolve_to(&found);
                Some(found)
            });
            match target.as_ref().and_then(|t| t.as_builtin()) {
                Some(b) => b.func,
                None => return Value::Invalid,
            }
        }
        _ => return Value::Invalid,
    };

    match (builtin, arg.args.len()) {
        (BuiltInKind::Abs, 1) => match eval(&arg.args[0], scope) {
            Value::Int(i) => i.checked_abs().map(Value::Int).unwrap_or(Value::Invalid),
            Value::Real(r) => Value::Real(r.abs()),
            _ => Value::Invalid,
        },
        (BuiltInKind::Odd, 1) => match eval(&arg.args[0], scope) {
            Value::Int(i) => Value::Bool(i.rem_euclid(2) == 1),
            _ => Value::Invalid,
        },
        (BuiltInKind::Ord, 1) => match eval(&arg.args[0], scope) {
            Value::Char(c) => Value::Int(c as i64),
            Value::Bool(b) => Value::Int(b as i64),
            Value::Set(s) => Value::Int(s as i64),
            _ => Value::Invalid,
        },
        (BuiltInKind::Chr, 1) => match eval(&arg.args[0], scope) {
            Value::Int(i) if (0..=u16::MAX as i64).contains(&i) => Value::Char(i as u16),
            _ => Value::Invalid,
        },
        (BuiltInKind::Min, 1) | (BuiltInKind::Max, 1) => {
            let bounds = arg.args[0]
                .ident()
                .or_else(|| match &arg.args[0].kind {
                    ExprKind::IdentLeaf(leaf) => {
                        scope.and_then(|s| find_in_scope(s, &leaf.name, true))
                    }
                    _ => None,
                })
                .filter(|t| matches!(t.kind, NamedKind::TypeDecl(_)))
                .and_then(|t| t.ty())
                .and_then(|ty| ty.base_kind())
                .and_then(|kind| kind.int_bounds());
            match bounds {
                Some((min, max)) => Value::Int(if builtin == BuiltInKind::Min { min } else { max }),
                None => Value::Invalid,
            }
        }
        _ => Value::Invalid,
    }
}
