//! End-to-end tests over the full front end: graph building, declaration
//! pass, type resolution, checking and validation, driven through the
//! `Project` API with a stub parser producing raw units.

mod common;

use common::*;
use oberst::ast::{
    derefed, extends, find_in_scope, pretty, BaseKind, BinOp, ErrorKind, NamedRef, Stmt, UnOp,
    Value,
};
use oberst::{ModPath, Project};
use std::rc::Rc;

fn compile_with(parser: MapParser, paths: &[&str], roots: &[&str]) -> Project {
    let mut project = Project::new(Box::new(parser));
    for p in paths {
        project
            .add_file(ModPath::parse(p), format!("MODULE {};\nEND {}.", p, p))
            .unwrap();
    }
    let root_paths: Vec<ModPath> = roots.iter().map(|r| ModPath::parse(r)).collect();
    project.parse_files(&root_paths);
    project
}

fn compile_m(build: impl Fn() -> oberst::ast::RawUnit + 'static) -> Project {
    compile_with(MapParser::new().with("M", build), &["M"], &["M"])
}

fn entity(project: &Project, module: &str, name: &str) -> NamedRef {
    let m = project.module(&ModPath::parse(module)).expect("module exists");
    find_in_scope(m, name, false).expect("entity exists")
}

fn kinds(project: &Project) -> Vec<ErrorKind> {
    project.diagnostics().iter().map(|d| d.kind).collect()
}

// ---------------------------------------------------------------------------
// the concrete end-to-end scenarios

#[test]
fn simple_constant_folds_to_integer() {
    let project = compile_m(|| {
        UnitBuilder::new("M")
            .decl(const_decl(
                "c",
                bin(BinOp::Add, int(1), bin(BinOp::Mul, int(2), int(3))),
            ))
            .build()
    });

    assert!(!project.has_errors(), "diags: {:?}", project.diagnostics());
    let c = entity(&project, "M", "c");
    assert_eq!(c.as_const().unwrap().val(), Value::Int(7));
    assert_eq!(
        derefed(&c.ty().unwrap()).base_kind(),
        Some(BaseKind::Integer)
    );
}

#[test]
fn forward_pointer_links_both_ways() {
    let project = compile_m(|| {
        UnitBuilder::new("M")
            .decl(type_decl("P", ptr_to(quali("R"))))
            .decl(type_decl(
                "R",
                record(
                    None,
                    vec![field("next", quali("P")), field("val", quali("INTEGER"))],
                ),
            ))
            .build()
    });

    assert!(!project.has_errors(), "diags: {:?}", project.diagnostics());
    let p_ty = entity(&project, "M", "P").ty().unwrap();
    let r_ty = entity(&project, "M", "R").ty().unwrap();

    // P.to resolves to R.
    let pointer = p_ty.as_pointer().unwrap();
    assert!(Rc::ptr_eq(&derefed(&pointer.to), &r_ty));
    // The forward reference is not a self reference.
    assert!(!pointer.to.as_quali().unwrap().is_self_ref());

    // R.next resolves back to P.
    let next = r_ty.as_record().unwrap().find("next", false).unwrap();
    assert!(Rc::ptr_eq(&derefed(&next.ty().unwrap()), &p_ty));
}

#[test]
fn extension_with_method_override() {
    let project = compile_m(|| {
        UnitBuilder::new("M")
            .decl(type_decl(
                "A",
                record(None, vec![field("x", quali("INTEGER"))]),
            ))
            .decl(type_decl(
                "B",
                record(Some(quali("A")), vec![field("y", quali("INTEGER"))]),
            ))
            .decl(procedure(
                "p",
                Some(receiver_param("self", quali("A"))),
                vec![],
                None,
                vec![],
                vec![],
            ))
            .decl(procedure(
                "p",
                Some(receiver_param("self", quali("B"))),
                vec![],
                None,
                vec![],
                vec![],
            ))
            .build()
    });

    assert!(!project.has_errors(), "diags: {:?}", project.diagnostics());
    let a_ty = entity(&project, "M", "A").ty().unwrap();
    let b_ty = entity(&project, "M", "B").ty().unwrap();
    assert!(extends(&b_ty, &a_ty));

    let base_method = a_ty.as_record().unwrap().find("p", true).unwrap();
    let override_method = b_ty.as_record().unwrap().find("p", true).unwrap();
    assert!(!Rc::ptr_eq(&base_method, &override_method));

    // The override links its super method, and the super knows the sub.
    let super_of = override_method
        .as_procedure()
        .unwrap()
        .super_method()
        .unwrap();
    assert!(Rc::ptr_eq(&super_of, &base_method));
    let subs = base_method.as_procedure().unwrap().subs();
    assert!(subs.iter().any(|s| Rc::ptr_eq(s, &override_method)));
}

#[test]
fn type_case_narrows_scrutinee() {
    let project = compile_m(|| {
        UnitBuilder::new("M")
            .decl(type_decl(
                "A",
                record(None, vec![field("x", quali("INTEGER"))]),
            ))
            .decl(type_decl(
                "B",
                record(Some(quali("A")), vec![field("y", quali("INTEGER"))]),
            ))
            .decl(type_decl("PA", ptr_to(quali("A"))))
            .decl(variable("a", quali("PA")))
            .stmt(case_stmt(
                leaf("a"),
                vec![(
                    vec![leaf("B")],
                    vec![assign(sel(leaf("a"), "y"), int(1))],
                )],
                vec![],
            ))
            .build()
    });

    assert!(!project.has_errors(), "diags: {:?}", project.diagnostics());

    let module = project.module(&ModPath::parse("M")).unwrap();
    let body = &module.as_module().unwrap().scope.body;
    let Stmt::Case(case) = &*body[0] else {
        panic!("module body starts with the case statement");
    };
    assert!(case.is_type_case());

    // Inside the B arm, a.y resolves to B's field.
    let Stmt::Assign(assignment) = &*case.arms[0].body[0] else {
        panic!("arm body is the assignment");
    };
    let selected = assignment.lhs.ident().unwrap();
    let b_ty = entity(&project, "M", "B").ty().unwrap();
    let b_field = b_ty.as_record().unwrap().find("y", false).unwrap();
    assert!(Rc::ptr_eq(&selected, &b_field));
}

#[test]
fn open_array_parameter_accepts_any_length() {
    let project = compile_m(|| {
        UnitBuilder::new("M")
            .decl(procedure(
                "sum",
                None,
                vec![var_param("xs", open_arr(quali("INTEGER")))],
                Some(quali("INTEGER")),
                vec![],
                vec![ret_stmt(Some(call(leaf("LEN"), vec![leaf("xs")])))],
            ))
            .decl(variable("v", arr(10, quali("INTEGER"))))
            .stmt(call_stmt(call(leaf("sum"), vec![leaf("v")])))
            .build()
    });

    assert!(!project.has_errors(), "diags: {:?}", project.diagnostics());
    let sum = entity(&project, "M", "sum");
    let sig_ty = sum.ty().unwrap();
    let sig = sig_ty.as_proc().unwrap();
    let xs_ty = sig.formals[0].ty().unwrap();
    assert!(xs_ty.as_array().unwrap().is_open());
}

#[test]
fn readonly_export_rejects_write() {
    let parser = MapParser::new()
        .with("A", || {
            UnitBuilder::new("A")
                .decl(readonly(variable("x", quali("INTEGER"))))
                .build()
        })
        .with("B", || {
            UnitBuilder::new("B")
                .import("A")
                .stmt(assign(sel(leaf("A"), "x"), int(0)))
                .build()
        });
    let project = compile_with(parser, &["A", "B"], &["B"]);

    assert!(kinds(&project).contains(&ErrorKind::ReadonlyViolation));
    let a = project.module(&ModPath::parse("A")).unwrap();
    let b = project.module(&ModPath::parse("B")).unwrap();
    assert!(b.has_errors());
    assert!(!a.has_errors());
    // A local checking error does not break B for its own importers.
    assert!(!b.as_module().unwrap().is_broken());
}

// ---------------------------------------------------------------------------
// universal properties

#[test]
fn diagnostics_and_pretty_print_are_deterministic() {
    let build = || {
        MapParser::new()
            .with("A", || {
                UnitBuilder::new("A")
                    .decl(exported(type_decl(
                        "T",
                        record(None, vec![field("n", quali("INTEGER"))]),
                    )))
                    .decl(exported(variable("x", quali("INTEGER"))))
                    .build()
            })
            .with("B", || {
                UnitBuilder::new("B")
                    .import("A")
                    .decl(variable("t", quali_in("A", "T")))
                    .decl(variable("bad", quali("Missing")))
                    .stmt(assign(sel(leaf("t"), "n"), sel(leaf("A"), "x")))
                    .build()
            })
    };

    let one = compile_with(build(), &["A", "B"], &["B"]);
    let two = compile_with(build(), &["A", "B"], &["B"]);

    assert_eq!(one.diagnostics(), two.diagnostics());
    let print = |p: &Project| {
        p.modules()
            .iter()
            .map(pretty::print_module)
            .collect::<Vec<_>>()
            .join("\n")
    };
    assert_eq!(print(&one), print(&two));
}

#[test]
fn checked_expressions_all_carry_types() {
    let project = compile_m(|| {
        UnitBuilder::new("M")
            .decl(variable("x", quali("INTEGER")))
            .decl(variable("b", quali("BOOLEAN")))
            .stmt(assign(
                leaf("x"),
                bin(BinOp::Add, int(1), bin(BinOp::Mul, leaf("x"), int(3))),
            ))
            .stmt(assign(leaf("b"), bin(BinOp::Lt, leaf("x"), int(10))))
            .build()
    });
    assert!(!project.has_errors(), "diags: {:?}", project.diagnostics());

    let module = project.module(&ModPath::parse("M")).unwrap();
    for stmt in &module.as_module().unwrap().scope.body {
        let Stmt::Assign(assignment) = &**stmt else {
            continue;
        };
        for root in [&assignment.lhs, &assignment.rhs] {
            oberst::ast::walk_expr(root, &mut |e| {
                assert!(e.ty().is_some(), "expression without type at {}", e.loc);
            });
        }
    }
}

#[test]
fn extension_is_transitive_and_pointers_follow() {
    let project = compile_m(|| {
        UnitBuilder::new("M")
            .decl(type_decl("A", record(None, vec![field("x", quali("INTEGER"))])))
            .decl(type_decl("B", record(Some(quali("A")), vec![])))
            .decl(type_decl("C", record(Some(quali("B")), vec![])))
            .decl(type_decl("PA", ptr_to(quali("A"))))
            .decl(type_decl("PC", ptr_to(quali("C"))))
            .decl(variable("pa", quali("PA")))
            .decl(variable("pc", quali("PC")))
            .stmt(assign(leaf("pa"), leaf("pc")))
            .build()
    });

    assert!(!project.has_errors(), "diags: {:?}", project.diagnostics());
    let a_ty = entity(&project, "M", "A").ty().unwrap();
    let c_ty = entity(&project, "M", "C").ty().unwrap();
    assert!(extends(&c_ty, &a_ty));
    assert!(!extends(&a_ty, &c_ty));
}

#[test]
fn module_cycle_is_rejected() {
    let parser = MapParser::new()
        .with("A", || UnitBuilder::new("A").import("B").build())
        .with("B", || UnitBuilder::new("B").import("A").build());
    let project = compile_with(parser, &["A", "B"], &["A"]);

    assert!(project.has_errors());
    assert!(kinds(&project).contains(&ErrorKind::ModuleCycle));
}

#[test]
fn override_must_not_narrow_visibility() {
    let project = compile_m(|| {
        UnitBuilder::new("M")
            .decl(type_decl("A", record(None, vec![])))
            .decl(type_decl("B", record(Some(quali("A")), vec![])))
            .decl(exported(procedure(
                "p",
                Some(receiver_param("self", quali("A"))),
                vec![],
                None,
                vec![],
                vec![],
            )))
            .decl(procedure(
                "p",
                Some(receiver_param("self", quali("B"))),
                vec![],
                None,
                vec![],
                vec![],
            ))
            .build()
    });

    assert!(kinds(&project).contains(&ErrorKind::OverrideVisibilityNarrow));
}

#[test]
fn override_signature_must_match() {
    let project = compile_m(|| {
        UnitBuilder::new("M")
            .decl(type_decl("A", record(None, vec![])))
            .decl(type_decl("B", record(Some(quali("A")), vec![])))
            .decl(procedure(
                "p",
                Some(receiver_param("self", quali("A"))),
                vec![value_param("n", quali("INTEGER"))],
                None,
                vec![],
                vec![],
            ))
            .decl(procedure(
                "p",
                Some(receiver_param("self", quali("B"))),
                vec![value_param("n", quali("REAL"))],
                None,
                vec![],
                vec![],
            ))
            .build()
    });

    assert!(kinds(&project).contains(&ErrorKind::OverrideSignatureMismatch));
}

// ---------------------------------------------------------------------------
// resolution details

#[test]
fn direct_self_alias_is_illegal() {
    let project = compile_m(|| UnitBuilder::new("M").decl(type_decl("T", quali("T"))).build());
    assert!(kinds(&project).contains(&ErrorKind::IllegalSelfRef));
}

#[test]
fn self_reference_behind_pointer_is_legal() {
    let project = compile_m(|| {
        UnitBuilder::new("M")
            .decl(type_decl(
                "R",
                record(None, vec![field("next", ptr_to(quali("R")))]),
            ))
            .build()
    });

    assert!(!project.has_errors(), "diags: {:?}", project.diagnostics());
    let r_ty = entity(&project, "M", "R").ty().unwrap();
    let next = r_ty.as_record().unwrap().find("next", false).unwrap();
    let next_ty = next.ty().unwrap();
    let target = &next_ty.as_pointer().unwrap().to;
    assert!(target.as_quali().unwrap().is_self_ref());
    assert!(Rc::ptr_eq(&derefed(target), &r_ty));
}

#[test]
fn generic_instantiations_are_memoized() {
    let project = compile_m(|| {
        UnitBuilder::new("M")
            .decl(generic_type_decl("List", &["T"], |_| {
                record(
                    None,
                    vec![
                        field("val", quali("T")),
                        field("next", ptr_to(quali_with("List", vec![quali("T")]))),
                    ],
                )
            }))
            .decl(variable("l1", quali_with("List", vec![quali("INTEGER")])))
            .decl(variable("l2", quali_with("List", vec![quali("INTEGER")])))
            .build()
    });

    assert!(!project.has_errors(), "diags: {:?}", project.diagnostics());
    let l1_ty = derefed(&entity(&project, "M", "l1").ty().unwrap());
    let l2_ty = derefed(&entity(&project, "M", "l2").ty().unwrap());

    // Identical instantiations share identity.
    assert!(Rc::ptr_eq(&l1_ty, &l2_ty));

    // The meta parameter was substituted.
    let val = l1_ty.as_record().unwrap().find("val", false).unwrap();
    assert_eq!(
        derefed(&val.ty().unwrap()).base_kind(),
        Some(BaseKind::Integer)
    );

    // The recursive reference closes back on the same instantiation.
    let next = l1_ty.as_record().unwrap().find("next", false).unwrap();
    let next_ty = next.ty().unwrap();
    let target = derefed(&next_ty.as_pointer().unwrap().to);
    assert!(Rc::ptr_eq(&target, &l1_ty));
}

#[test]
fn string_literal_types_as_char_array() {
    let project = compile_m(|| {
        UnitBuilder::new("M")
            .decl(variable("a", arr(3, quali("CHAR"))))
            .decl(variable("b", arr(2, quali("CHAR"))))
            .stmt(assign(leaf("a"), str_lit("ab")))
            .stmt(assign(leaf("b"), str_lit("ab")))
            .build()
    });

    // "ab" needs three characters including the trailing zero: the first
    // assignment fits, the second does not.
    let errors = kinds(&project);
    assert_eq!(
        errors
            .iter()
            .filter(|k| **k == ErrorKind::AssignIncompatible)
            .count(),
        1
    );

    let module = project.module(&ModPath::parse("M")).unwrap();
    let Stmt::Assign(first) = &*module.as_module().unwrap().scope.body[0] else {
        panic!("first statement is an assignment");
    };
    let lit_ty = first.rhs.ty().unwrap();
    let arr_ty = lit_ty.as_array().unwrap();
    assert_eq!(arr_ty.len(), 3);
    assert_eq!(derefed(&arr_ty.elem).base_kind(), Some(BaseKind::Char));
}

// ---------------------------------------------------------------------------
// statement rules

#[test]
fn missing_return_on_some_path() {
    let project = compile_m(|| {
        UnitBuilder::new("M")
            .decl(procedure(
                "f",
                None,
                vec![],
                Some(quali("INTEGER")),
                vec![],
                vec![if_stmt(boolean(true), vec![ret_stmt(Some(int(1)))], vec![])],
            ))
            .build()
    });
    assert!(kinds(&project).contains(&ErrorKind::MissingReturn));
}

#[test]
fn exit_requires_enclosing_loop() {
    let project = compile_m(|| UnitBuilder::new("M").stmt(exit_stmt()).build());
    assert!(kinds(&project).contains(&ErrorKind::ExitOutsideLoop));

    let ok = compile_m(|| {
        UnitBuilder::new("M")
            .stmt(loop_stmt(vec![exit_stmt()]))
            .build()
    });
    assert!(!ok.has_errors(), "diags: {:?}", ok.diagnostics());
}

#[test]
fn for_step_zero_is_an_error() {
    let project = compile_m(|| {
        UnitBuilder::new("M")
            .decl(variable("i", quali("INTEGER")))
            .stmt(for_stmt("i", int(1), int(10), Some(int(0)), vec![]))
            .build()
    });
    assert!(kinds(&project).contains(&ErrorKind::ForStepZero));

    // A missing step defaults to +1.
    let ok = compile_m(|| {
        UnitBuilder::new("M")
            .decl(variable("i", quali("INTEGER")))
            .stmt(for_stmt("i", int(1), int(10), None, vec![]))
            .build()
    });
    assert!(!ok.has_errors(), "diags: {:?}", ok.diagnostics());
}

#[test]
fn for_control_must_not_be_assigned() {
    let project = compile_m(|| {
        UnitBuilder::new("M")
            .decl(variable("i", quali("INTEGER")))
            .stmt(for_stmt(
                "i",
                int(1),
                int(10),
                None,
                vec![assign(leaf("i"), int(0))],
            ))
            .build()
    });
    assert!(kinds(&project).contains(&ErrorKind::ReadonlyViolation));
}

#[test]
fn overlapping_case_labels_are_rejected() {
    let project = compile_m(|| {
        UnitBuilder::new("M")
            .decl(variable("c", quali("INTEGER")))
            .stmt(case_stmt(
                leaf("c"),
                vec![
                    (vec![int(3)], vec![]),
                    (vec![bin(BinOp::Range, int(1), int(5))], vec![]),
                ],
                vec![],
            ))
            .build()
    });
    assert!(kinds(&project).contains(&ErrorKind::CaseLabelOverlap));
}

#[test]
fn range_outside_set_or_labels_is_misuse() {
    let project = compile_m(|| {
        UnitBuilder::new("M")
            .decl(variable("x", quali("INTEGER")))
            .stmt(assign(leaf("x"), bin(BinOp::Range, int(1), int(5))))
            .build()
    });
    assert!(kinds(&project).contains(&ErrorKind::RangeMisuse));

    let ok = compile_m(|| {
        UnitBuilder::new("M")
            .decl(variable("s", quali("SET")))
            .stmt(assign(
                leaf("s"),
                set_expr(vec![int(1), bin(BinOp::Range, int(3), int(5))]),
            ))
            .build()
    });
    assert!(!ok.has_errors(), "diags: {:?}", ok.diagnostics());
}

#[test]
fn address_of_needs_a_designator() {
    let project = compile_m(|| {
        UnitBuilder::new("M")
            .decl(variable("x", quali("INTEGER")))
            .decl(variable("ok", quali("BOOLEAN")))
            .stmt(assign(
                leaf("ok"),
                bin(BinOp::Neq, un(UnOp::AddrOf, leaf("x")), nil()),
            ))
            .build()
    });
    assert!(!project.has_errors(), "diags: {:?}", project.diagnostics());

    let bad = compile_m(|| {
        UnitBuilder::new("M")
            .decl(variable("ok", quali("BOOLEAN")))
            .stmt(assign(
                leaf("ok"),
                bin(BinOp::Neq, un(UnOp::AddrOf, int(1)), nil()),
            ))
            .build()
    });
    assert!(kinds(&bad).contains(&ErrorKind::NotLvalue));
}

// ---------------------------------------------------------------------------
// modules, imports, preloads

#[test]
fn private_entities_are_invisible_to_importers() {
    let parser = MapParser::new()
        .with("A", || {
            UnitBuilder::new("A")
                .decl(variable("y", quali("INTEGER")))
                .build()
        })
        .with("B", || {
            UnitBuilder::new("B")
                .import("A")
                .decl(variable("x", quali("INTEGER")))
                .stmt(assign(leaf("x"), sel(leaf("A"), "y")))
                .build()
        });
    let project = compile_with(parser, &["A", "B"], &["B"]);
    assert!(kinds(&project).contains(&ErrorKind::NotExported));
}

#[test]
fn unused_import_is_a_warning_only() {
    let parser = MapParser::new()
        .with("A", || UnitBuilder::new("A").build())
        .with("B", || UnitBuilder::new("B").import("A").build());
    let project = compile_with(parser, &["A", "B"], &["B"]);

    assert!(!project.has_errors());
    assert!(kinds(&project).contains(&ErrorKind::UnusedImport));
}

#[test]
fn preloaded_definition_module_is_importable() {
    let parser = MapParser::new()
        .with("Out", || {
            UnitBuilder::new("Out")
                .decl(procedure(
                    "Int",
                    None,
                    vec![value_param("n", quali("INTEGER"))],
                    None,
                    vec![],
                    vec![],
                ))
                .build()
        })
        .with("Main", || {
            UnitBuilder::new("Main")
                .import("Out")
                .stmt(call_stmt(call(sel(leaf("Out"), "Int"), vec![int(42)])))
                .build()
        });

    let mut project = Project::new(Box::new(parser));
    project.add_preload("Out", "DEFINITION Out; PROCEDURE Int(n: INTEGER); END Out.").unwrap();
    project
        .add_file(ModPath::parse("Main"), "MODULE Main; END Main.")
        .unwrap();
    let ok = project.parse_files(&[ModPath::parse("Main")]);

    assert!(ok, "diags: {:?}", project.diagnostics());
    let out = project.module(&ModPath::parse("Out")).unwrap();
    let data = out.as_module().unwrap();
    assert!(data.is_def);
    // Definition module entities default to exported.
    let int_proc = find_in_scope(out, "Int", false).unwrap();
    assert!(int_proc.is_public());
}

#[test]
fn cancellation_discards_compilation() {
    let parser = MapParser::new().with("M", || UnitBuilder::new("M").build());
    let mut project = Project::new(Box::new(parser));
    project
        .add_file(ModPath::parse("M"), "MODULE M; END M.")
        .unwrap();
    project.cancel_flag().cancel();
    project.parse_files(&[ModPath::parse("M")]);
    assert!(project.modules().is_empty());
}

#[test]
fn duplicate_declarations_in_one_scope() {
    let project = compile_m(|| {
        UnitBuilder::new("M")
            .decl(variable("x", quali("INTEGER")))
            .decl(variable("x", quali("REAL")))
            .build()
    });
    assert!(kinds(&project).contains(&ErrorKind::DuplicateName));
}
