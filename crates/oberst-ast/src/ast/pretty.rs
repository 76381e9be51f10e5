//! Declaration-surface pretty printer.
//!
//! Renders a resolved module's declarations back to source form: module
//! header, imports, constants, types, variables, and procedure headers.
//! Bodies are not rendered. The output is deterministic for a given resolved
//! graph and is used by diagnostics and by structural round-trip checks.
//!
//! An anonymous record bound to a pointer is rendered structurally at that
//! pointer (`POINTER TO RECORD ... END`); every other reference to it is
//! rendered by the short form so one declaration surface never expands the
//! same anonymous record twice.

use crate::ast::expr::Value;
use crate::ast::named::{Named, NamedKind, NamedRef};
use crate::ast::types::{derefed, TypeKind, TypeRef};
use std::fmt::Write;

/// Render the declaration surface of a module.
pub fn print_module(module: &NamedRef) -> String {
    let mut out = String::new();
    let Some(data) = module.as_module() else {
        return out;
    };

    if data.is_def {
        let _ = writeln!(out, "DEFINITION {};", module.name);
    } else {
        let _ = writeln!(out, "MODULE {};", module.name);
    }

    let imports = data.imports();
    if !imports.is_empty() {
        let clauses: Vec<String> = imports
            .iter()
            .filter_map(|imp| {
                let import = imp.as_import()?;
                if imp.name == import.path.name() {
                    Some(import.path.to_string())
                } else {
                    Some(format!("{} := {}", imp.name, import.path))
                }
            })
            .collect();
        let _ = writeln!(out, "IMPORT {};", clauses.join(", "));
    }

    let entries = data.scope.entries();

    let consts: Vec<_> = entries
        .iter()
        .filter(|n| matches!(n.kind, NamedKind::Const(_)))
        .collect();
    if !consts.is_empty() {
        let _ = writeln!(out, "CONST");
        for c in consts {
            let val = c.as_const().map(|d| d.val()).unwrap_or(Value::Invalid);
            let _ = writeln!(
                out,
                "  {}{} = {};",
                c.name,
                c.visibility().symbol(),
                value_text(&val)
            );
        }
    }

    let types: Vec<_> = entries
        .iter()
        .filter(|n| matches!(n.kind, NamedKind::TypeDecl(_)))
        .collect();
    if !types.is_empty() {
        let _ = writeln!(out, "TYPE");
        for t in types {
            let text = t
                .ty()
                .map(|ty| type_text(&ty, true))
                .unwrap_or_else(|| "?".to_string());
            let _ = writeln!(out, "  {}{} = {};", t.name, t.visibility().symbol(), text);
        }
    }

    let vars: Vec<_> = entries
        .iter()
        .filter(|n| matches!(n.kind, NamedKind::Variable))
        .collect();
    if !vars.is_empty() {
        let _ = writeln!(out, "VAR");
        for v in vars {
            let text = v
                .ty()
                .map(|ty| type_text(&ty, false))
                .unwrap_or_else(|| "?".to_string());
            let _ = writeln!(out, "  {}{}: {};", v.name, v.visibility().symbol(), text);
        }
    }

    // The declaration list carries receiver procedures that are absent
    // from the scope name table; fall back to the table for hand-built
    // modules.
    let decl_list = data.decls();
    let proc_source = if decl_list.is_empty() { &entries } else { &decl_list };
    for p in proc_source
        .iter()
        .filter(|n| matches!(n.kind, NamedKind::Procedure(_)))
    {
        let _ = writeln!(out, "{}", procedure_header(p));
    }

    let _ = writeln!(out, "END {}.", module.name);
    out
}

/// Render a procedure header.
pub fn procedure_header(proc: &NamedRef) -> String {
    let mut out = String::from("PROCEDURE ");
    if let Some(data) = proc.as_procedure() {
        if let Some(receiver) = &data.receiver {
            out.push_str(&format!("({}) ", param_text(receiver)));
        }
    }
    out.push_str(&proc.name);
    out.push_str(proc.visibility().symbol());

    let proc_ty = proc.ty();
    let sig = proc_ty.as_ref().and_then(|t| t.as_proc());
    let formals: Vec<String> = sig
        .map(|s| {
            s.formals
                .iter()
                .filter(|f| !f.param_modes().2)
                .map(param_text)
                .collect()
        })
        .unwrap_or_default();
    out.push_str(&format!("({})", formals.join("; ")));

    if let Some(ret) = sig.and_then(|s| s.ret.as_ref()) {
        out.push_str(&format!(": {}", type_text(ret, false)));
    }
    out.push(';');
    out
}

fn param_text(param: &NamedRef) -> String {
    let (var, const_, _) = param.param_modes();
    let mode = if const_ {
        "IN "
    } else if var {
        "VAR "
    } else {
        ""
    };
    let ty = param
        .ty()
        .map(|t| type_text(&t, false))
        .unwrap_or_else(|| "?".to_string());
    format!("{}{}: {}", mode, param.name, ty)
}

/// Render a type expression.
///
/// At a declaration site (`structural` true) composite types expand; at a
/// use site they render by name when one exists. An anonymous record behind
/// a pointer expands only at the pointer it is bound to.
pub fn type_text(ty: &TypeRef, structural: bool) -> String {
    if !structural {
        if let Some(ident) = ty.ident() {
            return ident.name.clone();
        }
    }
    match &ty.kind {
        TypeKind::Base(b) => b.kind.name().to_string(),
        TypeKind::Quali(q) => match q.resolved() {
            Some(target) => match target.ident() {
                Some(ident) => {
                    let actuals = &q.actuals;
                    if actuals.is_empty() {
                        ident.name.clone()
                    } else {
                        let list: Vec<String> =
                            actuals.iter().map(|a| type_text(a, false)).collect();
                        format!("{}({})", ident.name, list.join(", "))
                    }
                }
                None => type_text(&target, false),
            },
            None => q.text(),
        },
        TypeKind::Pointer(p) => {
            let target = derefed(&p.to);
            let expand = target
                .as_record()
                .and_then(|r| r.binding())
                .map(|bound| std::rc::Rc::ptr_eq(&bound, ty))
                .unwrap_or(false);
            if expand {
                format!("POINTER TO {}", record_text(&target))
            } else {
                format!("POINTER TO {}", type_text(&p.to, false))
            }
        }
        TypeKind::Array(a) => {
            if a.is_open() {
                format!("ARRAY OF {}", type_text(&a.elem, false))
            } else {
                format!("ARRAY {} OF {}", a.len(), type_text(&a.elem, false))
            }
        }
        TypeKind::Record(_) if structural => record_text(ty),
        TypeKind::Record(_) => "RECORD".to_string(),
        TypeKind::Proc(p) => {
            let formals: Vec<String> = p.formals.iter().map(param_text).collect();
            match &p.ret {
                Some(ret) => format!(
                    "PROCEDURE({}): {}",
                    formals.join("; "),
                    type_text(ret, false)
                ),
                None => format!("PROCEDURE({})", formals.join("; ")),
            }
        }
        TypeKind::Enum(e) => {
            let items: Vec<&str> = e.items.iter().map(|i| i.name.as_str()).collect();
            format!("({})", items.join(", "))
        }
        TypeKind::Generic(g) => g
            .param()
            .map(|p| p.name.clone())
            .unwrap_or_else(|| "?".to_string()),
        TypeKind::ModuleRef(_) => "MODULE".to_string(),
    }
}

fn record_text(ty: &TypeRef) -> String {
    let Some(rec) = ty.as_record() else {
        return "RECORD".to_string();
    };
    let mut out = String::from("RECORD");
    if let Some(base) = rec.base_rec() {
        if let Some(ident) = named_of(&base) {
            out.push_str(&format!(" ({})", ident.name));
        }
    }
    let fields = rec.fields();
    if !fields.is_empty() {
        out.push(' ');
        let list: Vec<String> = fields
            .iter()
            .map(|f| {
                let text = f
                    .ty()
                    .map(|t| type_text(&t, false))
                    .unwrap_or_else(|| "?".to_string());
                format!("{}{}: {}", f.name, f.visibility().symbol(), text)
            })
            .collect();
        out.push_str(&list.join("; "));
    }
    out.push_str(" END");
    out
}

fn named_of(ty: &TypeRef) -> Option<NamedRef> {
    if let Some(ident) = ty.ident() {
        return Some(ident);
    }
    // An anonymous record names itself after the pointer bound to it.
    ty.as_record()
        .and_then(|r| r.binding())
        .and_then(|p| p.ident())
}

/// Render a compile-time value.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Invalid => "?".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Real(r) => format!("{:?}", r),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Str(s) => format!("\"{}\"", s),
        Value::Bytes(b) => format!("${}$", b.len()),
        Value::Char(c) => format!("{:X}X", c),
        Value::Nil => "NIL".to_string(),
        Value::Set(bits) => {
            let mut parts = Vec::new();
            for bit in 0..32 {
                if bits & (1 << bit) != 0 {
                    parts.push(bit.to_string());
                }
            }
            format!("{{{}}}", parts.join(", "))
        }
    }
}

/// Render a short description of an entity for diagnostics.
pub fn entity_text(entity: &Named) -> String {
    match entity.ty() {
        Some(ty) => format!("{} '{}': {}", entity.kind_name(), entity.name, ty.pretty()),
        None => format!("{} '{}'", entity.kind_name(), entity.name),
    }
}
