//! Shared program fixtures for emitter integration tests

#![allow(dead_code)]

use tessera_core::builder::{ClassBuilder, ModuleBuilder};
use tessera_core::ir::{ClassKind, Expr, FieldType, MemberNamespace};
use tessera_core::{LinkedClass, Module, ModuleSet, Version};
use tessera_emitter::{ModuleOutput, Tree};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("tessera_emitter=debug")
        .with_test_writer()
        .try_init();
}

pub fn object() -> LinkedClass {
    ClassBuilder::new("lang.Object", ClassKind::Class)
        .public_method("hashCode__I", Expr::ret(Expr::int(0)))
        .public_method("toString__T", Expr::ret(Expr::string("")))
        .with_instances()
        .build()
}

/// A leaf class with an inlined constructor, one instance method and one
/// static factory. The body of `increment` depends on its version.
pub fn counter(class_version: i64, increment_version: i64) -> LinkedClass {
    ClassBuilder::new("app.Counter", ClassKind::Class)
        .version(Version::from_int(class_version))
        .extends("lang.Object")
        .field("count", FieldType::Int)
        .constructor("init___", &[], Expr::Skip)
        .method(
            MemberNamespace::Public,
            "increment__I",
            &[],
            Expr::ret(Expr::int(increment_version as i32)),
            Version::from_int(increment_version),
        )
        .method(
            MemberNamespace::PublicStatic,
            "create__Lapp_Counter",
            &[],
            Expr::ret(Expr::New {
                class: "app.Counter".into(),
                ctor: "init___".into(),
                args: vec![],
            }),
            Version::from_int(1),
        )
        .with_instances()
        .with_instance_tests()
        .with_type_data()
        .build()
}

pub fn single_module(classes: Vec<LinkedClass>) -> ModuleSet {
    let mut module = ModuleBuilder::new("main").root();
    for class in classes {
        module = module.class(class);
    }
    ModuleSet::new(vec![module.build()])
}

/// Root module `main` with the root class, and `app` with the given classes
pub fn two_modules(app_classes: Vec<LinkedClass>) -> ModuleSet {
    let mut app = ModuleBuilder::new("app").depends_on("main");
    for class in app_classes {
        app = app.class(class);
    }
    ModuleSet::new(vec![
        ModuleBuilder::new("main").root().class(object()).build(),
        app.build(),
    ])
}

pub fn module<'a>(set: &'a ModuleSet, id: &str) -> &'a Module {
    set.modules
        .iter()
        .find(|m| m.id.as_str() == id)
        .expect("module exists")
}

/// Class definition with the given name anywhere in a module body
pub fn find_class_def<'a>(output: &'a ModuleOutput, name: &str) -> Option<&'a Tree> {
    output
        .body
        .iter()
        .find(|t| matches!(t, Tree::ClassDef { name: n, .. } if n.as_str() == name))
}
