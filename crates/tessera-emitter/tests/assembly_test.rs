//! Module layout for the supported module kinds and class styles

mod common;

use common::*;
use pretty_assertions::assert_eq;
use tessera_core::builder::{ClassBuilder, ModuleBuilder};
use tessera_core::ir::{ClassKind, Expr, FieldType, MemberNamespace, TopLevelExportKind};
use tessera_core::{ModuleId, ModuleSet, Version};
use tessera_emitter::tree::{DeclKind, Ident};
use tessera_emitter::{EmitError, Emitter, EmitterConfig, ModuleKind, Tree};

fn outline(trees: &[Tree]) -> Vec<String> {
    trees.iter().map(Tree::outline).collect()
}

fn exported_program() -> ModuleSet {
    let main = ClassBuilder::new("app.Main$", ClassKind::ModuleClass)
        .extends("lang.Object")
        .constructor("init___", &[], Expr::Skip)
        .with_instances()
        .build();
    ModuleSet::new(vec![ModuleBuilder::new("main")
        .root()
        .class(object())
        .class(main)
        .export(
            "main",
            TopLevelExportKind::Module {
                class: "app.Main$".into(),
            },
            Version::from_int(1),
        )
        .build()])
}

#[test]
fn test_script_exports_become_vars() -> Result<(), Box<dyn std::error::Error>> {
    let mut emitter = Emitter::new(EmitterConfig::default());
    let result = emitter.emit(&exported_program())?;
    let main = &result.modules[&ModuleId::from("main")];

    assert!(main.imports.is_empty());
    assert_eq!(
        main.body.last(),
        Some(&Tree::decl(
            DeclKind::Var,
            "main",
            Some(Tree::apply(Tree::ident("$m_app_Main$u0024"), vec![]))
        ))
    );
    Ok(())
}

#[test]
fn test_commonjs_exports_and_requires() -> Result<(), Box<dyn std::error::Error>> {
    let mut program = two_modules(vec![counter(1, 1)]);
    program.modules[1].top_level_exports.push(tessera_core::ir::TopLevelExport {
        export_name: "Counter".to_string(),
        kind: TopLevelExportKind::JsClass {
            class: "app.Counter".into(),
        },
        version: Version::from_int(1),
    });
    let mut emitter =
        Emitter::new(EmitterConfig::default().with_module_kind(ModuleKind::CommonJs));
    let result = emitter.emit(&program)?;

    let app = &result.modules[&ModuleId::from("app")];
    assert_eq!(outline(&app.imports), vec!["const $j_main"]);
    assert_eq!(
        app.body.last().map(Tree::outline).as_deref(),
        Some("exports.Counter = ...")
    );

    let main = &result.modules[&ModuleId::from("main")];
    assert!(main
        .body
        .iter()
        .any(|t| t.outline() == "exports.$c_lang_Object = ..."));
    Ok(())
}

#[test]
fn test_es_module_cross_module_parent() -> Result<(), Box<dyn std::error::Error>> {
    let mut emitter =
        Emitter::new(EmitterConfig::default().with_module_kind(ModuleKind::EsModule));
    let result = emitter.emit(&two_modules(vec![counter(1, 1)]))?;
    let app = &result.modules[&ModuleId::from("app")];

    assert_eq!(
        app.imports,
        vec![Tree::ImportNamespace {
            binding: Ident::new("$j_main"),
            from: "./main.js".to_string(),
        }]
    );
    let Some(Tree::ClassDef { parent, .. }) = find_class_def(app, "$c_app_Counter") else {
        panic!("app.Counter was not emitted");
    };
    assert_eq!(
        parent.as_deref(),
        Some(&Tree::dot(Tree::ident("$j_main"), "$c_lang_Object"))
    );
    Ok(())
}

#[test]
fn test_es5_root_module_layout() -> Result<(), Box<dyn std::error::Error>> {
    let mut emitter = Emitter::new(EmitterConfig::default().with_class_syntax(false));
    let result = emitter.emit(&single_module(vec![object(), counter(1, 1)]))?;
    let main = &result.modules[&ModuleId::from("main")];

    assert_eq!(
        main.defined_names(),
        vec![
            "$throwClassCastException",
            "$c_lang_Object",
            "$h_lang_Object",
            "$TypeData",
            "$is_lang_Object",
            "$as_lang_Object",
            "$d_lang_Object",
            "$s_app_Counter__create$_$_Lapp$_Counter",
            "$c_app_Counter",
            "$h_app_Counter",
            "$is_app_Counter",
            "$as_app_Counter",
            "$d_app_Counter",
            "$d_I",
            "$d_Z",
            "$d_D",
        ]
    );
    assert!(main
        .body
        .iter()
        .any(|t| t.outline() == "$c_app_Counter.prototype.increment$_$_I = ..."));
    Ok(())
}

#[test]
fn test_module_without_content_fails() {
    let program = two_modules(vec![ClassBuilder::new("app.Tag", ClassKind::Interface)
        .extends("lang.Object")
        .build()]);
    let mut emitter =
        Emitter::new(EmitterConfig::default().with_module_kind(ModuleKind::EsModule));
    assert_eq!(
        emitter.emit(&program).unwrap_err(),
        EmitError::EmptyModule {
            module: "app".to_string(),
            classes: vec!["app.Tag".to_string()],
        }
    );
}

#[test]
fn test_statics_come_before_exports_and_initializers() -> Result<(), Box<dyn std::error::Error>> {
    let limit = || Expr::select_static("app.Config", "limit");
    let config = ClassBuilder::new("app.Config", ClassKind::Class)
        .extends("lang.Object")
        .static_field("limit", FieldType::Int)
        .method(
            MemberNamespace::StaticConstructor,
            "clinit___",
            &[],
            Expr::assign(
                limit(),
                Expr::BinaryOp {
                    op: "+".to_string(),
                    lhs: Box::new(limit()),
                    rhs: Box::new(Expr::int(1)),
                },
            ),
            Version::from_int(1),
        )
        .method(
            MemberNamespace::PublicStatic,
            "main__V",
            &[],
            Expr::Skip,
            Version::from_int(1),
        )
        .build();
    let program = ModuleSet::new(vec![ModuleBuilder::new("main")
        .root()
        .class(object())
        .class(config)
        .export(
            "limit",
            TopLevelExportKind::Field {
                class: "app.Config".into(),
                field: "limit".into(),
            },
            Version::from_int(1),
        )
        .initializer("app.Config", "main__V")
        .build()]);
    let mut emitter =
        Emitter::new(EmitterConfig::default().with_module_kind(ModuleKind::EsModule));
    let result = emitter.emit(&program)?;
    let body = &result.modules[&ModuleId::from("main")].body;

    let position = |what: &str, pred: &dyn Fn(&Tree) -> bool| {
        body.iter()
            .position(pred)
            .unwrap_or_else(|| panic!("no {} in {:?}", what, outline(body)))
    };
    let field = position("field", &|t| t.defined_name() == Some("$t_app_Config__limit"));
    let clinit = position("static initializer", &|t| {
        matches!(t, Tree::Apply { .. }) && t.outline().starts_with("$sct_app_Config__")
    });
    let export = position("export", &|t| matches!(t, Tree::Export(_)));
    let init = position("module initializer", &|t| {
        matches!(t, Tree::Apply { .. }) && t.outline().starts_with("$s_app_Config__main")
    });

    let clinit_def = position("static initializer body", &|t| {
        t.outline().starts_with("function $sct_app_Config__")
    });
    assert!(body[clinit_def].references("$t_app_Config__limit"));
    assert!(
        field < clinit && clinit < export && export < init,
        "unexpected order: {:?}",
        outline(body)
    );
    Ok(())
}
