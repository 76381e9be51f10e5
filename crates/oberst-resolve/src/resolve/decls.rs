//! Declaration pass.
//!
//! Turns a raw compilation unit into a module entity: introduces every
//! declared entity into its enclosing scope with duplicate detection, sets
//! the owning-scope back-pointers, links import targets against the already
//! compiled modules, and prepares generic meta parameters.
//!
//! Method binding happens later, in the type resolver, because a receiver's
//! record type is not known until qualified type references resolve.

use crate::resolve::universe::Universe;
use indexmap::IndexMap;
use oberst_ast::ast::{
    GenericType, Named, NamedKind, NamedRef, RawUnit, Type, TypeKind, Value, Visibility,
};
use oberst_ast::error::{Diagnostics, ErrorKind};
use oberst_ast::foundation::ModPath;
use tracing::debug;

/// Build the module entity for a raw unit and populate its scopes.
pub fn declare_module(
    unit: RawUnit,
    uni: &Universe,
    modules: &IndexMap<ModPath, NamedRef>,
    diags: &mut Diagnostics,
) -> NamedRef {
    debug!(module = %unit.path, decls = unit.decls.len(), "declaring module");

    let module = Named::new(
        unit.path.name(),
        unit.loc,
        NamedKind::Module(oberst_ast::ast::Module::new(
            unit.path.clone(),
            unit.file,
            unit.is_def,
            unit.meta_params.clone(),
            unit.body,
        )),
    );
    module.set_scope(uni.scope());
    let data = module.as_module().expect("just constructed as module");

    setup_generic_params(&module, &unit.meta_params, diags);

    for raw in unit.imports {
        let local_name = raw.local_name().to_string();
        let import = Named::new(
            local_name,
            raw.loc,
            NamedKind::Import(oberst_ast::ast::Import::new(
                raw.path.clone(),
                raw.alias_loc,
                raw.actuals,
            )),
        );
        import.set_scope(&module);

        match modules.get(&raw.path) {
            Some(target)
                if !target
                    .as_module()
                    .map(|m| m.is_broken())
                    .unwrap_or(true) =>
            {
                import
                    .as_import()
                    .expect("just constructed as import")
                    .set_module(target);
            }
            Some(_) => {
                diags.error(
                    ErrorKind::ImportBroken,
                    raw.loc,
                    format!("imported module '{}' failed to compile", raw.path),
                );
            }
            None => {
                diags.error(
                    ErrorKind::ImportBroken,
                    raw.loc,
                    format!("imported module '{}' is not available", raw.path),
                );
            }
        }

        add_to_scope(&module, import.clone(), diags);
        data.push_import(import);
    }

    for decl in unit.decls {
        decl.set_scope(&module);
        if unit.is_def && !decl.visibility().is_public() {
            decl.set_visibility(Visibility::ReadWrite);
        }
        data.push_decl(decl.clone());
        // A receiver procedure is named in its record, not in the module.
        let is_method = decl
            .as_procedure()
            .map(|p| p.receiver.is_some())
            .unwrap_or(false);
        if !is_method {
            add_to_scope(&module, decl.clone(), diags);
        }
        declare_entity(&decl, diags);
    }

    module
}

/// Recurse into an entity that carries nested declarations.
fn declare_entity(entity: &NamedRef, diags: &mut Diagnostics) {
    match &entity.kind {
        NamedKind::Procedure(_) => declare_procedure(entity, diags),
        NamedKind::TypeDecl(decl) => {
            setup_generic_params(entity, &decl.meta_params, diags);
            declare_enum_items(entity, diags);
        }
        _ => {}
    }
}

/// Introduce the parameters and local declarations of a procedure.
fn declare_procedure(proc: &NamedRef, diags: &mut Diagnostics) {
    let data = proc.as_procedure().expect("entity is a procedure");

    if let Some(receiver) = &data.receiver {
        receiver.set_scope(proc);
        add_to_scope(proc, receiver.clone(), diags);
    }
    for param in &data.params {
        param.set_scope(proc);
        add_to_scope(proc, param.clone(), diags);
    }
    for decl in &data.decls {
        decl.set_scope(proc);
        add_to_scope(proc, decl.clone(), diags);
        declare_entity(decl, diags);
    }
}

/// Give generic meta parameters their pseudo-types and names.
fn setup_generic_params(owner: &NamedRef, params: &[NamedRef], diags: &mut Diagnostics) {
    for param in params {
        param.set_scope(owner);
        if param.ty().is_none() {
            let ty = Type::new(TypeKind::Generic(GenericType::new(param)));
            param.set_ty(&ty);
        }
        if let Some(scope) = owner.scope_data() {
            if let Err(existing) = scope.add(param.clone()) {
                diags.error(
                    ErrorKind::DuplicateName,
                    param.loc,
                    format!(
                        "generic parameter '{}' conflicts with '{}' declared at {}",
                        param.name, existing.name, existing.loc
                    ),
                );
            }
        }
    }
}

/// Enumeration constants are visible in the scope of the type declaration.
fn declare_enum_items(decl: &NamedRef, diags: &mut Diagnostics) {
    let Some(ty) = decl.ty() else { return };
    let Some(enum_ty) = ty.as_enum() else { return };
    let Some(owner) = decl.scope() else { return };

    for (index, item) in enum_ty.items.iter().enumerate() {
        item.set_scope(&owner);
        item.set_ty(&ty);
        if let Some(data) = item.as_const() {
            data.set_val(Value::Int(index as i64));
        }
        add_to_scope(&owner, item.clone(), diags);
    }
}

/// Add an entity to a scope, reporting duplicates.
fn add_to_scope(scope: &NamedRef, entity: NamedRef, diags: &mut Diagnostics) {
    let Some(data) = scope.scope_data() else {
        return;
    };
    let name = entity.name.clone();
    let loc = entity.loc;
    if let Err(existing) = data.add(entity) {
        diags.error(
            ErrorKind::DuplicateName,
            loc,
            format!("'{}' is already declared in this scope", name),
        );
        let _ = existing;
    }
}
