//! Cross-class knowledge for one run
//!
//! Code generated for a class sometimes depends on facts about other classes:
//! which module owns them, whether their constructor is inlined into the class
//! definition, where a native class is loaded from. Those facts are collected
//! once per run from the whole module set.
//!
//! Owners, kinds and init inlining of the classes a class refers to are folded
//! into its cache versions through [`ClassIndex::linkage_version`]. Anything
//! else a class depends on must be reflected in its own version by whoever
//! produces the IR.

use std::collections::{BTreeSet, HashMap, HashSet};

use tessera_core::ir::{ClassKind, JsNativeLoadSpec, MemberNamespace};
use tessera_core::{ClassName, LinkedClass, MethodName, ModuleId, ModuleSet, Version};

#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub kind: ClassKind,
    pub module: ModuleId,
    pub super_class: Option<ClassName>,
    /// The single constructor is inlined into the class constructor
    pub has_inlineable_init: bool,
    pub native_load_spec: Option<JsNativeLoadSpec>,
    pub has_instances: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ClassIndex {
    classes: HashMap<ClassName, ClassInfo>,
    root_module: Option<ModuleId>,
    root_public_methods: BTreeSet<MethodName>,
}

impl ClassIndex {
    pub fn build(modules: &ModuleSet) -> Self {
        let parents: HashSet<&ClassName> = modules
            .classes()
            .filter_map(|(_, class)| class.super_class.as_ref())
            .collect();

        let mut classes = HashMap::new();
        let mut root_public_methods = BTreeSet::new();
        for (module, class) in modules.classes() {
            if class.name.is_root() {
                root_public_methods = class
                    .methods_in(MemberNamespace::Public)
                    .map(|m| m.value.name.clone())
                    .collect();
            }
            classes.insert(
                class.name.clone(),
                ClassInfo {
                    kind: class.kind,
                    module: module.id.clone(),
                    super_class: class.super_class.clone(),
                    has_inlineable_init: is_inlineable(class, &parents),
                    native_load_spec: class.js_native_load_spec.clone(),
                    has_instances: class.has_instances,
                },
            );
        }

        Self {
            classes,
            root_module: modules.root_module().map(|m| m.id.clone()),
            root_public_methods,
        }
    }

    pub fn get(&self, class: &ClassName) -> Option<&ClassInfo> {
        self.classes.get(class)
    }

    pub fn owner(&self, class: &ClassName) -> Option<&ModuleId> {
        self.classes.get(class).map(|info| &info.module)
    }

    pub fn kind(&self, class: &ClassName) -> Option<ClassKind> {
        self.classes.get(class).map(|info| info.kind)
    }

    pub fn has_inlineable_init(&self, class: &ClassName) -> bool {
        self.classes
            .get(class)
            .is_some_and(|info| info.has_inlineable_init)
    }

    pub fn native_load_spec(&self, class: &ClassName) -> Option<&JsNativeLoadSpec> {
        self.classes
            .get(class)
            .and_then(|info| info.native_load_spec.as_ref())
    }

    pub fn root_module(&self) -> Option<&ModuleId> {
        self.root_module.as_ref()
    }

    pub fn root_public_methods(&self) -> &BTreeSet<MethodName> {
        &self.root_public_methods
    }

    pub fn root_class_has_instances(&self) -> bool {
        self.classes
            .get(&ClassName::root())
            .is_some_and(|info| info.has_instances)
    }

    /// Version of the cross-class facts generated code for `classes` reads
    ///
    /// Changes when one of them moves to another module, changes kind, gains
    /// or loses an inlined init, or when the root module changes.
    pub fn linkage_version<'a>(&self, classes: impl IntoIterator<Item = &'a ClassName>) -> Version {
        let root = self.root_module.as_ref().map(|id| id.as_str()).unwrap_or_default();
        let parts = std::iter::once(format!("root:{}", root)).chain(classes.into_iter().map(
            |class| match self.classes.get(class) {
                Some(info) => format!(
                    "{}@{}:{:?}:{}",
                    class, info.module, info.kind, info.has_inlineable_init
                ),
                None => format!("{}@", class),
            },
        ));
        Version::fingerprint_parts(parts)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// A class whose only constructor can become the body of its JS constructor
///
/// Only leaf classes qualify: a subclass would have to call the parent
/// constructor explicitly.
fn is_inlineable(class: &LinkedClass, parents: &HashSet<&ClassName>) -> bool {
    class.kind.is_class()
        && class.constructors().count() == 1
        && !parents.contains(&class.name)
}
