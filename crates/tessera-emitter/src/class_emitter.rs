//! Class assembler
//!
//! Turns one linked class into its ordered fragments, going through the
//! class caches for every piece.

use std::collections::BTreeSet;
use std::sync::Arc;

use tessera_core::ir::{ClassKind, MemberNamespace, MethodDef};
use tessera_core::{ClassName, LinkedClass, MethodName, Version};

use crate::cache::Artifact;
use crate::class_cache::{ClassCaches, ClassKey, FullClassParts};
use crate::codegen::CodegenCtx;
use crate::error::EmitError;
use crate::globals::GlobalRefs;
use crate::tree::Tree;

/// Fragments of one class, grouped by where the module assembler puts them
#[derive(Debug, Clone)]
pub struct GeneratedClass {
    pub name: ClassName,
    /// Free-function methods, class definition and module accessor
    pub main: Vec<Tree>,
    /// Instance tests and type data
    pub type_support: Vec<Tree>,
    pub static_fields: Vec<Tree>,
    pub static_initializers: Vec<Tree>,
    pub globals: GlobalRefs,
}

/// Distinguishes exported members of foreign classes, which are generated
/// differently for the same member version
fn exported_member_discriminant(class: &LinkedClass) -> Version {
    Version::from_int(i64::from(class.kind.is_js_class()))
}

fn bridge_version() -> Version {
    Version::from_token("bridge")
}

/// Linkage of one method: the classes its body names plus the class's own
/// ancestors, which `super` calls and `this` references go through
fn method_linkage(ctx: &CodegenCtx<'_>, class: &LinkedClass, def: &MethodDef) -> Version {
    let mut classes: BTreeSet<&ClassName> = class.ancestors.iter().collect();
    def.body.collect_classes(&mut classes);
    ctx.index.linkage_version(classes)
}

fn take<T: Clone>(artifact: &Artifact<T>, globals: &mut GlobalRefs) -> T {
    globals.extend(artifact.globals());
    artifact.value().clone()
}

pub fn emit_class(
    ctx: &CodegenCtx<'_>,
    caches: &mut ClassCaches,
    class: &LinkedClass,
) -> Result<GeneratedClass, EmitError> {
    let key = ClassKey::of(ctx.module, class);
    let mut out = GeneratedClass {
        name: class.name.clone(),
        main: Vec::new(),
        type_support: Vec::new(),
        static_fields: Vec::new(),
        static_initializers: Vec::new(),
        globals: GlobalRefs::new(),
    };
    if class.kind == ClassKind::NativeJsClass {
        // Provided by the host, nothing to generate
        return Ok(out);
    }

    let root = ClassName::root();
    let mut referenced = class.referenced_classes();
    referenced.insert(&root);
    // Class-level pieces are rebuilt when any class they can reach moves
    let linkage = ctx.index.linkage_version(referenced);
    let class_version = Version::combine([&class.version, &linkage]);

    let needs_class_def = class.kind.has_class_def() && class.has_instances;
    let inlined: Option<&MethodName> = if ctx.index.has_inlineable_init(&class.name) {
        class.constructors().next().map(|init| &init.value.name)
    } else {
        None
    };

    let mut members: Vec<Arc<Artifact<Tree>>> = Vec::new();
    for method in &class.methods {
        let def = &method.value;
        if def.namespace == MemberNamespace::Constructor && Some(&def.name) == inlined {
            continue;
        }
        let static_like = class.kind.is_static_like() || def.namespace != MemberNamespace::Public;
        if static_like {
            let version = Version::combine([&method.version, &method_linkage(ctx, class, def)]);
            let artifact = caches.methods.get_or_else_update(
                (key.clone(), def.namespace, def.name.clone()),
                &version,
                || Ok::<_, EmitError>(ctx.static_like_method(class, def)),
            )?;
            out.main.push(take(&artifact, &mut out.globals));
        } else if needs_class_def {
            let version = Version::combine([&method.version, &method_linkage(ctx, class, def)]);
            let artifact = caches.member_methods.get_or_else_update(
                (key.clone(), def.name.clone()),
                &version,
                || Ok::<_, EmitError>(ctx.member_method(class, def)),
            )?;
            members.push(artifact);
        }
    }

    if needs_class_def {
        if ctx.is_rewired_throwable(class) {
            let bridge_version =
                Version::combine([&bridge_version(), &ctx.index.linkage_version([&root])]);
            for method in ctx.index.root_public_methods() {
                if class.defines_public_method(method) {
                    continue;
                }
                let artifact = caches.bridges.get_or_else_update(
                    (key.clone(), method.clone()),
                    &bridge_version,
                    || Ok::<_, EmitError>(ctx.bridge(method)),
                )?;
                members.push(artifact);
            }
        }

        let ctor_version = match (&class.js_constructor, inlined) {
            (Some(js), _) if class.kind.is_js_class() => {
                Version::combine([&class_version, &js.version])
            }
            (_, Some(init_name)) => {
                let init_version = class
                    .constructors()
                    .find(|c| &c.value.name == init_name)
                    .map(|c| c.version.clone())
                    .unwrap_or_default();
                Version::combine([&class_version, &init_version])
            }
            _ => class_version.clone(),
        };
        let ctor = caches
            .constructors
            .get_or_else_update(key.clone(), &ctor_version, || ctx.constructor(class))?;

        let discriminant = exported_member_discriminant(class);
        let mut exported = Vec::with_capacity(class.exported_members.len());
        for (index, member) in class.exported_members.iter().enumerate() {
            let version = Version::combine([&discriminant, &member.version, &linkage]);
            exported.push(caches.exported_members.get_or_else_update(
                (key.clone(), index),
                &version,
                || Ok::<_, EmitError>(ctx.exported_member(class, &member.value)),
            )?);
        }

        out.globals.extend(ctor.globals());
        for artifact in &members {
            out.globals.extend(artifact.globals());
        }
        for artifact in &exported {
            out.globals.extend(artifact.globals());
        }

        let parts = FullClassParts {
            ctor: Some(&ctor),
            members: &members,
            exported: &exported,
        };
        let full = caches
            .full_classes
            .get_or_else_update(key.clone(), &class_version, &parts, || {
                let member_trees: Vec<&Tree> = members.iter().map(|m| m.value()).collect();
                let exported_trees: Vec<&Vec<Tree>> = exported.iter().map(|e| e.value()).collect();
                Ok::<_, EmitError>(ctx.full_class(
                    class,
                    ctor.value(),
                    &member_trees,
                    &exported_trees,
                ))
            })?;
        out.main.extend(take(&full, &mut out.globals));
    }

    let shell = caches.shell(&key, &class_version);

    if class.has_module_accessor && class.kind.is_module_like() {
        let accessor = shell
            .module_accessor
            .get_or_init(|| Ok::<_, EmitError>(ctx.module_accessor(class)))?;
        out.main.extend(take(&accessor, &mut out.globals));
    }

    if !class.name.is_root() {
        if class.has_instance_tests {
            let tests = shell
                .instance_tests
                .get_or_init(|| Ok::<_, EmitError>(ctx.instance_tests(class)))?;
            out.type_support.extend(take(&tests, &mut out.globals));
        }
        if class.has_runtime_type_info {
            let data = shell
                .type_data
                .get_or_init(|| Ok::<_, EmitError>(ctx.type_data(class)))?;
            out.type_support.extend(take(&data, &mut out.globals));
        }
    }

    let fields = shell
        .static_fields
        .get_or_init(|| Ok::<_, EmitError>(ctx.static_fields(class)))?;
    out.static_fields = take(&fields, &mut out.globals);

    let initializers = shell
        .static_initializers
        .get_or_init(|| Ok::<_, EmitError>(ctx.static_initializers(class)))?;
    out.static_initializers = take(&initializers, &mut out.globals);

    Ok(out)
}
