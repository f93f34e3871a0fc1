//! Reuse and invalidation across successive emitter runs

mod common;

use common::*;
use pretty_assertions::assert_eq;
use tessera_core::builder::{ClassBuilder, ModuleBuilder};
use tessera_core::ir::{ClassKind, Expr};
use tessera_core::{ModuleId, ModuleSet};
use tessera_emitter::{Emitter, EmitterConfig, EmitterStats, ModuleKind, Tree};

#[test]
fn test_unchanged_program_is_fully_reused() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let program = single_module(vec![object(), counter(1, 1)]);
    let mut emitter = Emitter::new(EmitterConfig::default());

    let first = emitter.emit(&program)?;
    assert_eq!(first.passes, 1);
    assert_eq!(first.stats.classes_invalidated, 2);

    let second = emitter.emit(&program)?;
    assert_eq!(
        second.stats,
        EmitterStats {
            classes_reused: 2,
            classes_invalidated: 0,
            methods_reused: 4,
            methods_invalidated: 0,
        },
        "Every class and method should come from the cache"
    );
    assert_eq!(first.modules, second.modules);
    Ok(())
}

#[test]
fn test_changed_method_is_the_only_invalidation() -> Result<(), Box<dyn std::error::Error>> {
    let mut emitter = Emitter::new(EmitterConfig::default());
    let first = emitter.emit(&single_module(vec![object(), counter(1, 1)]))?;
    let second = emitter.emit(&single_module(vec![object(), counter(1, 2)]))?;

    assert_eq!(second.stats.classes_reused, 2);
    assert_eq!(second.stats.methods_invalidated, 1);
    assert_eq!(second.stats.methods_reused, 3);

    let main = ModuleId::from("main");
    let before = find_class_def(&first.modules[&main], "$c_app_Counter");
    let after = find_class_def(&second.modules[&main], "$c_app_Counter");
    assert!(before.is_some());
    assert_ne!(before, after, "The class definition must pick up the new method body");
    Ok(())
}

#[test]
fn test_class_version_change_keeps_method_artifacts() -> Result<(), Box<dyn std::error::Error>> {
    let mut emitter = Emitter::new(EmitterConfig::default());
    emitter.emit(&single_module(vec![object(), counter(1, 1)]))?;
    let second = emitter.emit(&single_module(vec![object(), counter(2, 1)]))?;

    assert_eq!(second.stats.classes_reused, 1);
    assert_eq!(second.stats.classes_invalidated, 1);
    assert_eq!(second.stats.methods_invalidated, 0);
    Ok(())
}

#[test]
fn test_removed_class_is_evicted() -> Result<(), Box<dyn std::error::Error>> {
    let mut emitter = Emitter::new(EmitterConfig::default());
    emitter.emit(&single_module(vec![object(), counter(1, 1)]))?;
    assert_eq!(emitter.session().cached_classes(), 2);

    let result = emitter.emit(&single_module(vec![object()]))?;
    assert_eq!(emitter.session().cached_classes(), 1);
    assert!(!result.modules[&ModuleId::from("main")]
        .defined_names()
        .contains(&"$c_app_Counter"));
    Ok(())
}

#[test]
fn test_untouched_module_output_is_stable() -> Result<(), Box<dyn std::error::Error>> {
    let mut emitter =
        Emitter::new(EmitterConfig::default().with_module_kind(ModuleKind::EsModule));
    let first = emitter.emit(&two_modules(vec![counter(1, 1)]))?;
    let second = emitter.emit(&two_modules(vec![counter(2, 2)]))?;

    let main = ModuleId::from("main");
    let app = ModuleId::from("app");
    assert_eq!(first.modules[&main], second.modules[&main]);
    assert_ne!(first.modules[&app], second.modules[&app]);
    assert_eq!(second.stats.classes_reused, 1);
    assert_eq!(second.stats.classes_invalidated, 1);
    Ok(())
}

#[test]
fn test_moving_a_class_between_modules_starts_cold() -> Result<(), Box<dyn std::error::Error>> {
    let mut emitter =
        Emitter::new(EmitterConfig::default().with_module_kind(ModuleKind::EsModule));
    emitter.emit(&two_modules(vec![counter(1, 1)]))?;

    let mut moved = two_modules(vec![]);
    moved.modules[1].classes.push(object_marker());
    moved.modules[0].classes.push(counter(1, 1));
    let result = emitter.emit(&moved)?;

    // lang.Object stays put, app.Counter is new in `main`
    assert_eq!(result.stats.classes_reused, 1);
    assert!(result.stats.classes_invalidated >= 2);
    Ok(())
}

/// Something to keep the `app` module non-empty
fn object_marker() -> tessera_core::LinkedClass {
    ClassBuilder::new("app.Marker", ClassKind::Class)
        .extends("lang.Object")
        .with_instances()
        .build()
}

/// `app.A extends app.B` in module `app`, with `app.B` owned by `parent_owner`
fn split_hierarchy(parent_owner: &str) -> ModuleSet {
    let parent = ClassBuilder::new("app.B", ClassKind::Class)
        .extends("lang.Object")
        .constructor("init___", &[], Expr::Skip)
        .with_instances()
        .build();
    let child = ClassBuilder::new("app.A", ClassKind::Class)
        .extends("app.B")
        .ancestor("lang.Object")
        .public_method(
            "sibling__Lapp_B",
            Expr::ret(Expr::New {
                class: "app.B".into(),
                ctor: "init___".into(),
                args: vec![],
            }),
        )
        .with_instances()
        .build();

    let mut main = ModuleBuilder::new("main").root().class(object());
    let mut app = ModuleBuilder::new("app").depends_on("main").class(child);
    let mut modules = Vec::new();
    if parent_owner == "main" {
        main = main.class(parent);
    } else {
        app = app.depends_on(parent_owner);
        modules.push(
            ModuleBuilder::new(parent_owner)
                .depends_on("main")
                .class(parent)
                .build(),
        );
    }
    modules.push(main.build());
    modules.push(app.build());
    ModuleSet::new(modules)
}

#[test]
fn test_moved_parent_is_relinked() -> Result<(), Box<dyn std::error::Error>> {
    let config = EmitterConfig::default().with_module_kind(ModuleKind::EsModule);
    let mut warm = Emitter::new(config.clone());
    warm.emit(&split_hierarchy("main"))?;

    let moved = split_hierarchy("lib");
    let relinked = warm.emit(&moved)?;
    let cold = Emitter::new(config).emit(&moved)?;

    let app = ModuleId::from("app");
    assert_eq!(relinked.modules[&app], cold.modules[&app]);
    let Some(Tree::ClassDef { parent, .. }) = find_class_def(&relinked.modules[&app], "$c_app_A")
    else {
        panic!("app.A was not emitted");
    };
    assert_eq!(
        parent.as_deref(),
        Some(&Tree::dot(Tree::ident("$j_lib"), "$c_app_B"))
    );
    Ok(())
}
