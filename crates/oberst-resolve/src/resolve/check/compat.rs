//! Type compatibility rules.
//!
//! Assignment compatibility, parameter-passing compatibility, the numeric
//! promotion ladder, and lvalue classification. Shared by the expression
//! and statement checkers.

use oberst_ast::ast::{
    derefed, equal_types, extends, is_error, BaseKind, BaseType, ExprKind, ExprRef, NamedKind,
    NamedRef, TypeKind, TypeRef, Value, Visibility,
};

/// The wider of two numeric kinds on the promotion ladder.
pub fn promote(a: BaseKind, b: BaseKind) -> BaseKind {
    if a.rank() >= b.rank() {
        a
    } else {
        b
    }
}

/// The interned type of the wider numeric operand.
pub fn promoted_type(a: &TypeRef, b: &TypeRef) -> Option<TypeRef> {
    let (ka, kb) = (derefed(a).base_kind()?, derefed(b).base_kind()?);
    if !ka.is_numeric() || !kb.is_numeric() {
        return None;
    }
    Some(BaseType::intern(promote(ka, kb)))
}

/// Whether a type is a character array or a string base type.
pub fn is_stringish(ty: &TypeRef) -> bool {
    let ty = derefed(ty);
    match &ty.kind {
        TypeKind::Base(b) => b.kind.is_string(),
        TypeKind::Array(a) => derefed(&a.elem)
            .base_kind()
            .map(BaseKind::is_char)
            .unwrap_or(false),
        _ => false,
    }
}

/// Assignment compatibility of a source with a destination.
///
/// The rules, first match wins: identical types; numeric widening; NIL into
/// pointers and procedure variables; pointer extension; string literals
/// into character arrays that can hold them including the trailing zero;
/// character widening; matching procedure signatures.
pub fn assignment_compatible(dst: &TypeRef, src: &TypeRef, src_expr: Option<&ExprRef>) -> bool {
    if is_error(dst) || is_error(src) {
        // The sentinel swallows follow-up diagnostics.
        return true;
    }
    let dst = derefed(dst);
    let src = derefed(src);

    if equal_types(&dst, &src) {
        return true;
    }

    let dst_kind = dst.base_kind();
    let src_kind = src.base_kind();

    // Numeric widening; narrowing needs an explicit conversion intrinsic.
    if let (Some(d), Some(s)) = (dst_kind, src_kind) {
        if d.is_numeric() && s.is_numeric() && d.rank() >= s.rank() {
            return true;
        }
        if d == BaseKind::WChar && s == BaseKind::Char {
            return true;
        }
        if d == BaseKind::WStr && s == BaseKind::Str {
            return true;
        }
        if d == BaseKind::Any {
            return true;
        }
    }

    // NIL is assignable to any pointer or procedure variable.
    if src_kind == Some(BaseKind::Nil) {
        return matches!(dst.kind, TypeKind::Pointer(_) | TypeKind::Proc(_))
            || dst_kind == Some(BaseKind::Nil)
            || dst_kind == Some(BaseKind::Any);
    }

    // Pointer to an extension assigns to a pointer to its base.
    if matches!(dst.kind, TypeKind::Pointer(_)) && matches!(src.kind, TypeKind::Pointer(_)) {
        return extends(&src, &dst);
    }

    // String sources into character arrays.
    if let TypeKind::Array(dst_arr) = &dst.kind {
        let dst_elem = derefed(&dst_arr.elem).base_kind();
        if matches!(dst_elem, Some(k) if k.is_char()) {
            // A checked string literal arrives as a character array with
            // its length already counting the trailing zero.
            if let TypeKind::Array(src_arr) = &src.kind {
                let src_elem = derefed(&src_arr.elem).base_kind();
                let widens = match (dst_elem, src_elem) {
                    (Some(d), Some(s)) if s.is_char() => d == s || d == BaseKind::WChar,
                    _ => false,
                };
                if widens && is_literal_string(src_expr) {
                    return dst_arr.is_open()
                        || src_arr.len() == 0
                        || src_arr.len() <= dst_arr.len();
                }
            }
            // A constant of string base type fits any character array.
            if matches!(src_kind, Some(k) if k.is_string()) {
                return true;
            }
        }
    }

    // A single-character literal assigns to a character variable.
    if matches!(dst_kind, Some(k) if k.is_char()) {
        if let Some(expr) = src_expr {
            if let ExprKind::Literal(lit) = &expr.kind {
                if let Value::Str(s) = &lit.value {
                    return s.chars().count() == 1;
                }
            }
        }
        if src_kind == Some(BaseKind::Char) && dst_kind == Some(BaseKind::WChar) {
            return true;
        }
    }

    false
}

fn is_literal_string(expr: Option<&ExprRef>) -> bool {
    match expr {
        Some(e) => matches!(
            &e.kind,
            ExprKind::Literal(lit) if matches!(lit.value, Value::Str(_) | Value::Bytes(_))
        ),
        None => true,
    }
}

/// Whether an actual fits a formal parameter.
///
/// By-value formals take anything assignable. By-reference formals require
/// the same type, except that record actuals may be extensions of a record
/// formal. Open-array formals accept any array with the same element type
/// regardless of length, and by-value or IN character open arrays accept
/// string literals.
pub fn param_compatible(formal: &NamedRef, actual: &TypeRef, actual_expr: Option<&ExprRef>) -> bool {
    let Some(formal_ty) = formal.ty() else {
        return true;
    };
    if is_error(&formal_ty) || is_error(actual) {
        return true;
    }
    let formal_ty = derefed(&formal_ty);
    let actual_ty = derefed(actual);

    // Open arrays match on the element type only.
    if let TypeKind::Array(f_arr) = &formal_ty.kind {
        if f_arr.is_open() {
            if let TypeKind::Array(a_arr) = &actual_ty.kind {
                if equal_types(&f_arr.elem, &a_arr.elem) {
                    return true;
                }
            }
            let f_elem = derefed(&f_arr.elem).base_kind();
            if matches!(f_elem, Some(k) if k.is_char()) && is_stringish(&actual_ty) {
                // String constants fit read-only character array formals.
                return !formal.param_modes().0;
            }
        }
    }

    let (var, const_, _) = formal.param_modes();
    if var || const_ {
        if equal_types(&formal_ty, &actual_ty) {
            return true;
        }
        // A record extension may travel through a record reference formal;
        // the callee sees the static formal type and may narrow by type
        // case.
        if matches!(formal_ty.kind, TypeKind::Record(_)) {
            return extends(&actual_ty, &formal_ty);
        }
        return false;
    }

    let _ = actual_expr;
    assignment_compatible(&formal_ty, &actual_ty, actual_expr)
}

/// Whether an expression designates a storage location.
pub fn is_lvalue(expr: &ExprRef) -> bool {
    match &expr.kind {
        ExprKind::IdentLeaf(leaf) => match leaf.ident() {
            Some(target) => matches!(
                target.kind,
                NamedKind::Variable | NamedKind::LocalVar | NamedKind::Param(_)
            ),
            None => false,
        },
        ExprKind::IdentSel(sel) => match sel.ident() {
            Some(target) => matches!(target.kind, NamedKind::Field(_) | NamedKind::Variable),
            None => false,
        },
        ExprKind::Unary(un) if un.op == oberst_ast::ast::UnOp::Deref => true,
        ExprKind::Arg(arg) => match arg.op.get() {
            oberst_ast::ast::ArgOp::Index | oberst_ast::ast::ArgOp::Cast => is_lvalue(&arg.sub),
            oberst_ast::ast::ArgOp::Call => false,
        },
        _ => false,
    }
}

/// The entity at the root of a designator chain.
pub fn root_entity(expr: &ExprRef) -> Option<NamedRef> {
    match &expr.kind {
        ExprKind::IdentLeaf(leaf) => leaf.ident(),
        ExprKind::IdentSel(sel) => {
            // A qualified module variable is its own root.
            if let Some(target) = sel.ident() {
                if matches!(target.kind, NamedKind::Variable) {
                    return Some(target);
                }
            }
            root_entity(&sel.sub)
        }
        ExprKind::Unary(un) => root_entity(&un.sub),
        ExprKind::Arg(arg) => root_entity(&arg.sub),
        _ => None,
    }
}

/// Why a write to a designator is rejected, if it is.
///
/// Writes are blocked through IN parameters and through entities imported
/// read-only from another module.
pub fn write_blocked(expr: &ExprRef, current_module: &NamedRef) -> Option<&'static str> {
    let root = root_entity(expr)?;
    if let NamedKind::Param(p) = &root.kind {
        if p.const_ {
            return Some("parameter is passed by constant reference");
        }
    }
    if root.visibility() == Visibility::ReadOnly {
        let home = root.module();
        let foreign = home
            .map(|m| !std::rc::Rc::ptr_eq(&m, current_module))
            .unwrap_or(false);
        if foreign {
            return Some("entity is exported read-only");
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use oberst_ast::ast::{Array, Expr, Literal, Pointer, Record, Type};
    use oberst_ast::foundation::Loc;

    fn base(kind: BaseKind) -> TypeRef {
        BaseType::intern(kind)
    }

    #[test]
    fn test_numeric_widening_only() {
        assert!(assignment_compatible(
            &base(BaseKind::LongInt),
            &base(BaseKind::Integer),
            None
        ));
        assert!(assignment_compatible(
            &base(BaseKind::Real),
            &base(BaseKind::Byte),
            None
        ));
        assert!(!assignment_compatible(
            &base(BaseKind::Integer),
            &base(BaseKind::LongInt),
            None
        ));
        assert!(!assignment_compatible(
            &base(BaseKind::Integer),
            &base(BaseKind::Real),
            None
        ));
    }

    #[test]
    fn test_nil_into_pointers_only() {
        let rec = Type::new(TypeKind::Record(Record::new(Loc::none(), None, vec![])));
        let ptr = Type::new(TypeKind::Pointer(Pointer {
            loc: Loc::none(),
            to: rec,
        }));
        assert!(assignment_compatible(&ptr, &base(BaseKind::Nil), None));
        assert!(!assignment_compatible(
            &base(BaseKind::Integer),
            &base(BaseKind::Nil),
            None
        ));
    }

    #[test]
    fn test_pointer_extension_assignability() {
        let root = Type::new(TypeKind::Record(Record::new(Loc::none(), None, vec![])));
        let sub = Type::new(TypeKind::Record(Record::new(Loc::none(), None, vec![])));
        sub.as_record().unwrap().set_base_rec(&root);

        let p_root = Type::new(TypeKind::Pointer(Pointer {
            loc: Loc::none(),
            to: root,
        }));
        let p_sub = Type::new(TypeKind::Pointer(Pointer {
            loc: Loc::none(),
            to: sub,
        }));

        assert!(assignment_compatible(&p_root, &p_sub, None));
        assert!(!assignment_compatible(&p_sub, &p_root, None));
    }

    #[test]
    fn test_string_literal_into_char_array() {
        // "ab" checks as ARRAY 3 OF CHAR (two codepoints plus the zero).
        let lit_ty = Type::new(TypeKind::Array(Array::new(
            Loc::none(),
            None,
            base(BaseKind::Char),
        )));
        lit_ty.as_array().unwrap().set_len(3);
        let lit = Expr::new(
            Loc::none(),
            ExprKind::Literal(Literal::new(Value::Str("ab".into()))),
        );

        let dst_fits = Type::new(TypeKind::Array(Array::new(
            Loc::none(),
            None,
            base(BaseKind::Char),
        )));
        dst_fits.as_array().unwrap().set_len(8);
        assert!(assignment_compatible(&dst_fits, &lit_ty, Some(&lit)));

        let dst_small = Type::new(TypeKind::Array(Array::new(
            Loc::none(),
            None,
            base(BaseKind::Char),
        )));
        dst_small.as_array().unwrap().set_len(2);
        assert!(!assignment_compatible(&dst_small, &lit_ty, Some(&lit)));
    }

    #[test]
    fn test_promotion_ladder() {
        assert_eq!(
            promote(BaseKind::Integer, BaseKind::Real),
            BaseKind::Real
        );
        assert_eq!(
            promote(BaseKind::LongInt, BaseKind::ShortInt),
            BaseKind::LongInt
        );
    }
}
