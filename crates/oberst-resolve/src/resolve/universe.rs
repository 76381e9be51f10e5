//! The universe scope.
//!
//! The outermost scope of every compilation: the primitive type names and
//! the builtin procedures. One universe exists per front end and is passed
//! explicitly into every pass; modules chain to it as their enclosing scope
//! so ordinary scope-chain lookup finds `INTEGER` or `LEN` without special
//! cases.

use oberst_ast::ast::{
    BaseKind, BaseType, BuiltIn, BuiltInKind, Module, Named, NamedKind, NamedRef, TypeRef,
};
use oberst_ast::foundation::{Loc, ModPath};

/// Names visible in every module: base types and builtin procedures.
#[derive(Debug)]
pub struct Universe {
    scope: NamedRef,
}

/// Base type kinds that have a source-level name.
const NAMED_BASE_KINDS: &[BaseKind] = &[
    BaseKind::Bool,
    BaseKind::Char,
    BaseKind::WChar,
    BaseKind::Byte,
    BaseKind::ShortInt,
    BaseKind::Integer,
    BaseKind::LongInt,
    BaseKind::Real,
    BaseKind::LongReal,
    BaseKind::Set,
    BaseKind::Any,
];

impl Universe {
    /// Build the universe scope.
    pub fn new() -> Self {
        let scope = Named::new(
            "<universe>",
            Loc::none(),
            NamedKind::Module(Module::new(
                ModPath::parse("<universe>"),
                0,
                true,
                Vec::new(),
                Vec::new(),
            )),
        );
        let data = scope.as_module().expect("universe scope is a module");

        for &kind in NAMED_BASE_KINDS {
            let decl = Named::type_decl(kind.name(), Loc::none(), BaseType::intern(kind), vec![]);
            decl.set_scope(&scope);
            data.scope
                .add(decl)
                .expect("base type names are distinct");
        }

        for &func in BuiltInKind::ALL {
            let builtin = Named::new(func.name(), Loc::none(), NamedKind::BuiltIn(BuiltIn { func }));
            builtin.set_scope(&scope);
            data.scope
                .add(builtin)
                .expect("builtin names are distinct");
        }

        Self { scope }
    }

    /// The universe scope entity; modules use it as their enclosing scope.
    pub fn scope(&self) -> &NamedRef {
        &self.scope
    }

    /// The interned singleton for a base kind.
    pub fn base(&self, kind: BaseKind) -> TypeRef {
        BaseType::intern(kind)
    }

    /// The sentinel type attached to expressions whose checking failed.
    pub fn error_type(&self) -> TypeRef {
        BaseType::intern(BaseKind::Undef)
    }

    /// BOOLEAN.
    pub fn bool_type(&self) -> TypeRef {
        BaseType::intern(BaseKind::Bool)
    }

    /// INTEGER.
    pub fn int_type(&self) -> TypeRef {
        BaseType::intern(BaseKind::Integer)
    }
}

impl Default for Universe {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oberst_ast::ast::find_in_scope;

    #[test]
    fn test_universe_has_base_type_names() {
        let uni = Universe::new();
        let int = find_in_scope(uni.scope(), "INTEGER", false).unwrap();
        let ty = int.ty().unwrap();
        assert_eq!(ty.base_kind(), Some(BaseKind::Integer));
    }

    #[test]
    fn test_universe_has_builtins() {
        let uni = Universe::new();
        let len = find_in_scope(uni.scope(), "LEN", false).unwrap();
        assert_eq!(len.as_builtin().unwrap().func, BuiltInKind::Len);
        assert!(find_in_scope(uni.scope(), "FOO", false).is_none());
    }

    #[test]
    fn test_error_type_is_undefined() {
        let uni = Universe::new();
        assert_eq!(uni.error_type().base_kind(), Some(BaseKind::Undef));
    }
}
