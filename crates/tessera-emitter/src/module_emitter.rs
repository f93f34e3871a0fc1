//! Module assembler
//!
//! Lays out the fragments of every class of a module in initialization
//! order around the bootstrap library, exports and initializers.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument};

use tessera_core::{LinkedClass, Module, ModuleId};

use crate::cache::Artifact;
use crate::class_cache::ClassCaches;
use crate::class_emitter::{emit_class, GeneratedClass};
use crate::codegen::CodegenCtx;
use crate::core_lib::{self, CoreLib};
use crate::error::EmitError;
use crate::globals::GlobalRefs;
use crate::module_cache::{
    imports_version, initializers_version, top_level_exports_version, ModuleCaches,
};
use crate::tree::{defined_names, Tree};

/// Generated statements of one module
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleOutput {
    pub id: ModuleId,
    pub imports: Vec<Tree>,
    pub body: Vec<Tree>,
    /// Global refs of every fragment in this module
    pub globals: GlobalRefs,
}

impl ModuleOutput {
    /// Imports followed by the body
    pub fn trees(&self) -> impl Iterator<Item = &Tree> {
        self.imports.iter().chain(self.body.iter())
    }

    pub fn defined_names(&self) -> Vec<&str> {
        self.trees().filter_map(Tree::defined_name).collect()
    }
}

/// Caches a module is emitted through
pub struct ModuleEmitCaches<'c> {
    pub classes: &'c mut ClassCaches,
    pub modules: &'c mut ModuleCaches,
}

/// Superclasses first, then by name
fn emission_order(module: &Module) -> Vec<&LinkedClass> {
    let mut classes: Vec<&LinkedClass> = module.classes.iter().collect();
    classes.sort_by(|a, b| {
        a.ancestors
            .len()
            .cmp(&b.ancestors.len())
            .then_with(|| a.name.cmp(&b.name))
    });
    classes
}

/// Emit one module
///
/// `core` is only used for the root module. `export_internals` makes the
/// module's definitions visible to the modules that import it.
#[instrument(level = "debug", skip_all, fields(module = %module.id))]
pub fn emit_module(
    ctx: &CodegenCtx<'_>,
    caches: ModuleEmitCaches<'_>,
    core: Option<&Arc<Artifact<CoreLib>>>,
    module: &Module,
    export_internals: bool,
) -> Result<ModuleOutput, EmitError> {
    let ModuleEmitCaches {
        classes: class_caches,
        modules: module_caches,
    } = caches;
    let mut globals = GlobalRefs::new();

    let imports = module_caches.imports(
        &module.id,
        &imports_version(module, ctx.index),
        || Ok::<_, EmitError>(ctx.imports(module)),
    )?;
    globals.extend(imports.globals());

    let generated = emission_order(module)
        .into_iter()
        .map(|class| emit_class(ctx, class_caches, class))
        .collect::<Result<Vec<GeneratedClass>, EmitError>>()?;
    for class in &generated {
        globals.extend(&class.globals);
    }
    let (root, others): (Vec<&GeneratedClass>, Vec<&GeneratedClass>) =
        generated.iter().partition(|class| class.name.is_root());

    let core = core.filter(|_| module.is_root);
    let mut body = Vec::new();

    if let Some(core) = core {
        globals.extend(core.globals());
        body.extend(core.value().pre.iter().cloned());
    }
    for class in &root {
        body.extend(class.main.iter().cloned());
    }
    if let Some(core) = core {
        body.extend(core.value().post.iter().cloned());
        if !root.is_empty() && ctx.index.root_class_has_instances() {
            body.push(core_lib::root_class_data(ctx));
        }
    }
    for class in &others {
        body.extend(class.main.iter().cloned());
        body.extend(class.type_support.iter().cloned());
    }
    if let Some(core) = core {
        body.extend(core.value().init.iter().cloned());
    }
    for class in &generated {
        body.extend(class.static_fields.iter().cloned());
    }
    for class in &generated {
        body.extend(class.static_initializers.iter().cloned());
    }

    if export_internals {
        let names = defined_names(&body);
        let exports = ctx.internal_exports(&names);
        globals.extend(&exports.globals);
        body.extend(exports.value);
    }

    let exports = module_caches.top_level_exports(
        &module.id,
        &top_level_exports_version(module, ctx.index),
        || Ok::<_, EmitError>(ctx.top_level_exports(&module.top_level_exports)),
    )?;
    globals.extend(exports.globals());
    body.extend(exports.value().iter().cloned());

    let initializers = module_caches.initializers(
        &module.id,
        &initializers_version(module, ctx.index),
        || Ok::<_, EmitError>(ctx.module_initializers(&module.initializers)),
    )?;
    globals.extend(initializers.globals());
    body.extend(initializers.value().iter().cloned());

    if body.is_empty() {
        return Err(EmitError::EmptyModule {
            module: module.id.to_string(),
            classes: module.classes.iter().map(|c| c.name.to_string()).collect(),
        });
    }

    debug!(
        classes = generated.len(),
        statements = body.len(),
        "module assembled"
    );
    Ok(ModuleOutput {
        id: module.id.clone(),
        imports: imports.value().clone(),
        body,
        globals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EmitterConfig, ModuleKind};
    use crate::globals::DangerousFilter;
    use crate::knowledge::ClassIndex;
    use crate::naming::NameGen;
    use pretty_assertions::assert_eq;
    use tessera_core::builder::{ClassBuilder, ModuleBuilder};
    use tessera_core::ir::{ClassKind, Expr, FieldType, MemberNamespace};
    use tessera_core::{ModuleSet, Version};

    struct Harness {
        config: EmitterConfig,
        names: NameGen,
        index: ClassIndex,
        filter: DangerousFilter,
        class_caches: ClassCaches,
        module_caches: ModuleCaches,
    }

    impl Harness {
        fn new(config: EmitterConfig, modules: &ModuleSet) -> Self {
            Self {
                config,
                names: NameGen::default(),
                index: ClassIndex::build(modules),
                filter: DangerousFilter::default(),
                class_caches: ClassCaches::new(),
                module_caches: ModuleCaches::new(),
            }
        }

        fn emit(&mut self, module: &Module, export_internals: bool) -> Result<ModuleOutput, EmitError> {
            let ctx = CodegenCtx {
                config: &self.config,
                names: &self.names,
                index: &self.index,
                filter: &self.filter,
                module: &module.id,
            };
            let core = Artifact::new(core_lib::generate(&ctx));
            emit_module(
                &ctx,
                ModuleEmitCaches {
                    classes: &mut self.class_caches,
                    modules: &mut self.module_caches,
                },
                Some(&core),
                module,
                export_internals,
            )
        }
    }

    fn object() -> LinkedClass {
        ClassBuilder::new("lang.Object", ClassKind::Class)
            .with_instances()
            .build()
    }

    #[test]
    fn test_root_module_layout() {
        let b = ClassBuilder::new("app.B", ClassKind::Class)
            .extends("app.A")
            .ancestor("lang.Object")
            .static_field("count", FieldType::Int)
            .with_instances()
            .with_instance_tests()
            .build();
        let a = ClassBuilder::new("app.A", ClassKind::Class)
            .extends("lang.Object")
            .method(
                MemberNamespace::StaticConstructor,
                "clinit___",
                &[],
                Expr::Skip,
                Version::from_int(1),
            )
            .with_instances()
            .build();
        let modules = ModuleSet::new(vec![ModuleBuilder::new("main")
            .root()
            .class(b)
            .class(object())
            .class(a)
            .build()]);
        let mut harness = Harness::new(EmitterConfig::default(), &modules);
        let output = harness.emit(&modules.modules[0], false).unwrap();

        let outline: Vec<String> = output.body.iter().map(Tree::outline).collect();
        assert_eq!(
            outline,
            vec![
                "function $throwClassCastException",
                "class $c_lang_Object (1 members)",
                "class $TypeData (3 members)",
                "function $is_lang_Object",
                "function $as_lang_Object",
                "const $d_lang_Object",
                "$c_lang_Object.prototype.$classData = ...",
                "function $sct_app_A__clinit$_$_$_",
                "class $c_app_A (1 members)",
                "class $c_app_B (1 members)",
                "function $is_app_B",
                "function $as_app_B",
                "const $d_I",
                "const $d_Z",
                "const $d_D",
                "let $t_app_B__count",
                "$sct_app_A__clinit$_$_$_(...)",
            ]
        );
        assert!(output.imports.is_empty());
    }

    #[test]
    fn test_internal_exports_for_depended_on_module() {
        let modules = ModuleSet::new(vec![
            ModuleBuilder::new("main").root().class(object()).build(),
            ModuleBuilder::new("app").depends_on("main").build(),
        ]);
        let mut harness = Harness::new(
            EmitterConfig::default().with_module_kind(ModuleKind::EsModule),
            &modules,
        );
        let output = harness.emit(&modules.modules[0], true).unwrap();
        let Some(Tree::Export(names)) = output.body.last() else {
            panic!("expected trailing export, got {:?}", output.body.last());
        };
        let exported: Vec<&str> = names.iter().map(|(_, n)| n.as_str()).collect();
        assert!(exported.contains(&"$c_lang_Object"));
        assert!(exported.contains(&"$throwClassCastException"));
    }

    #[test]
    fn test_empty_module_is_fatal() {
        let modules = ModuleSet::new(vec![
            ModuleBuilder::new("main").root().class(object()).build(),
            ModuleBuilder::new("empty")
                .class(
                    ClassBuilder::new("app.Marker", ClassKind::Interface)
                        .extends("lang.Object")
                        .build(),
                )
                .build(),
        ]);
        let mut harness = Harness::new(
            EmitterConfig::default().with_module_kind(ModuleKind::EsModule),
            &modules,
        );
        let err = harness.emit(&modules.modules[1], false).unwrap_err();
        assert_eq!(
            err,
            EmitError::EmptyModule {
                module: "empty".to_string(),
                classes: vec!["app.Marker".to_string()],
            }
        );
    }

    #[test]
    fn test_output_serializes_as_tagged_trees() {
        let modules = ModuleSet::new(vec![ModuleBuilder::new("main")
            .root()
            .class(object())
            .build()]);
        let mut harness = Harness::new(EmitterConfig::default(), &modules);
        let output = harness.emit(&modules.modules[0], false).unwrap();
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["id"], "main");
        assert!(json["body"][0]["FunctionDef"].is_object());
        assert!(json["imports"].as_array().is_some_and(|a| a.is_empty()));
    }

    #[test]
    fn test_module_fragments_are_reused() {
        let modules = ModuleSet::new(vec![ModuleBuilder::new("main")
            .root()
            .class(object())
            .initializer("lang.Object", "main__V")
            .build()]);
        let mut harness = Harness::new(EmitterConfig::default(), &modules);
        let first = harness.emit(&modules.modules[0], false).unwrap();
        harness.module_caches.start_run();
        harness.class_caches.start_run();
        let second = harness.emit(&modules.modules[0], false).unwrap();
        assert_eq!(first, second);
        assert_eq!(harness.module_caches.counters().invalidated, 0);
        assert_eq!(harness.module_caches.counters().reused, 3);
    }
}
