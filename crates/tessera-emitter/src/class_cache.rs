//! Per-class caches
//!
//! All caches are flat maps keyed by [`ClassKey`] plus a member discriminator,
//! so a class can be invalidated without touching its member caches: a method
//! whose own version is unchanged is reused even when the class around it
//! changed.

use std::collections::HashMap;
use std::sync::Arc;

use tessera_core::ir::MemberNamespace;
use tessera_core::{ClassName, LinkedClass, MethodName, ModuleId, Version};

use crate::cache::{Artifact, CacheCounters, GenToken, KeyedCache, OneTimeSlot};
use crate::codegen::GeneratedCtor;
use crate::globals::WithGlobals;
use crate::tree::Tree;

/// Identity of a class across runs
///
/// Two classes are the same cache subject when they have the same ancestor
/// chain and live in the same module. Moving a class to another module changes
/// how other modules reach it, so it starts from a cold cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassKey {
    pub module: ModuleId,
    pub ancestors: Vec<ClassName>,
}

impl ClassKey {
    pub fn of(module: &ModuleId, class: &LinkedClass) -> Self {
        Self {
            module: module.clone(),
            ancestors: class.ancestors.clone(),
        }
    }

    pub fn class_name(&self) -> Option<&ClassName> {
        self.ancestors.first()
    }
}

/// Single-shot pieces that only depend on the class itself
#[derive(Debug)]
pub struct ClassShell {
    version: Version,
    used: bool,
    pub instance_tests: OneTimeSlot<Vec<Tree>>,
    pub type_data: OneTimeSlot<Vec<Tree>>,
    pub module_accessor: OneTimeSlot<Vec<Tree>>,
    pub static_fields: OneTimeSlot<Vec<Tree>>,
    pub static_initializers: OneTimeSlot<Vec<Tree>>,
}

impl ClassShell {
    fn new(version: Version) -> Self {
        Self {
            version,
            used: true,
            instance_tests: OneTimeSlot::default(),
            type_data: OneTimeSlot::default(),
            module_accessor: OneTimeSlot::default(),
            static_fields: OneTimeSlot::default(),
            static_initializers: OneTimeSlot::default(),
        }
    }
}

#[derive(Debug)]
struct FullClassEntry {
    version: Version,
    ctor: Option<GenToken>,
    members: Vec<GenToken>,
    exported: Vec<GenToken>,
    artifact: Arc<Artifact<Vec<Tree>>>,
    used: bool,
}

/// Cache of assembled class definitions
///
/// Besides the class version, an entry is only reused when it was built from
/// exactly the same constructor, member and exported-member artifacts.
#[derive(Debug, Default)]
pub struct FullClassCache {
    entries: HashMap<ClassKey, FullClassEntry>,
    counters: CacheCounters,
}

/// Artifacts a full class definition is assembled from
pub struct FullClassParts<'a> {
    pub ctor: Option<&'a Arc<Artifact<GeneratedCtor>>>,
    pub members: &'a [Arc<Artifact<Tree>>],
    pub exported: &'a [Arc<Artifact<Vec<Tree>>>],
}

impl FullClassParts<'_> {
    fn ctor_token(&self) -> Option<GenToken> {
        self.ctor.map(|c| c.token())
    }

    fn member_tokens(&self) -> Vec<GenToken> {
        self.members.iter().map(|m| m.token()).collect()
    }

    fn exported_tokens(&self) -> Vec<GenToken> {
        self.exported.iter().map(|m| m.token()).collect()
    }
}

impl FullClassCache {
    pub fn get_or_else_update<E>(
        &mut self,
        key: ClassKey,
        version: &Version,
        parts: &FullClassParts<'_>,
        compute: impl FnOnce() -> Result<WithGlobals<Vec<Tree>>, E>,
    ) -> Result<Arc<Artifact<Vec<Tree>>>, E> {
        let ctor = parts.ctor_token();
        let members = parts.member_tokens();
        let exported = parts.exported_tokens();

        if let Some(entry) = self.entries.get_mut(&key) {
            entry.used = true;
            if entry.version.same_version(version)
                && entry.ctor == ctor
                && entry.members == members
                && entry.exported == exported
            {
                self.counters.reused += 1;
                return Ok(Arc::clone(&entry.artifact));
            }
        }

        let artifact = Artifact::new(compute()?);
        self.counters.invalidated += 1;
        self.entries.insert(
            key,
            FullClassEntry {
                version: version.clone(),
                ctor,
                members,
                exported,
                artifact: Arc::clone(&artifact),
                used: true,
            },
        );
        Ok(artifact)
    }

    fn start_run(&mut self) {
        self.counters = CacheCounters::default();
        for entry in self.entries.values_mut() {
            entry.used = false;
        }
    }

    fn end_run(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.used);
        before - self.entries.len()
    }

    pub fn counters(&self) -> CacheCounters {
        self.counters
    }

    /// Identity of the definition currently cached for `key`
    pub fn token(&self, key: &ClassKey) -> Option<GenToken> {
        self.entries.get(key).map(|entry| entry.artifact.token())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub type MethodKey = (ClassKey, MemberNamespace, MethodName);
pub type MemberKey = (ClassKey, MethodName);

/// Arena of every class-level cache of a session
#[derive(Debug, Default)]
pub struct ClassCaches {
    shells: HashMap<ClassKey, ClassShell>,
    class_counters: CacheCounters,
    /// Methods emitted as free functions
    pub methods: KeyedCache<MethodKey, Tree>,
    /// Methods emitted inside the class body or on its prototype
    pub member_methods: KeyedCache<MemberKey, Tree>,
    pub bridges: KeyedCache<MemberKey, Tree>,
    pub constructors: KeyedCache<ClassKey, GeneratedCtor>,
    pub exported_members: KeyedCache<(ClassKey, usize), Vec<Tree>>,
    pub full_classes: FullClassCache,
}

impl ClassCaches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shell for `key`, replaced by an empty one when the class version changed
    pub fn shell(&mut self, key: &ClassKey, version: &Version) -> &mut ClassShell {
        let counters = &mut self.class_counters;
        let shell = self
            .shells
            .entry(key.clone())
            .and_modify(|shell| {
                if shell.version.same_version(version) {
                    counters.reused += 1;
                } else {
                    counters.invalidated += 1;
                    *shell = ClassShell::new(version.clone());
                }
            })
            .or_insert_with(|| {
                counters.invalidated += 1;
                ClassShell::new(version.clone())
            });
        shell.used = true;
        shell
    }

    pub fn start_run(&mut self) {
        self.class_counters = CacheCounters::default();
        for shell in self.shells.values_mut() {
            shell.used = false;
        }
        self.methods.start_run();
        self.member_methods.start_run();
        self.bridges.start_run();
        self.constructors.start_run();
        self.exported_members.start_run();
        self.full_classes.start_run();
    }

    /// Evict everything not requested during this run
    ///
    /// Returns the number of evicted entries over all caches.
    pub fn end_run(&mut self) -> usize {
        let before = self.shells.len();
        self.shells.retain(|_, shell| shell.used);
        let evicted_shells = before - self.shells.len();
        evicted_shells
            + self.methods.end_run()
            + self.member_methods.end_run()
            + self.bridges.end_run()
            + self.constructors.end_run()
            + self.exported_members.end_run()
            + self.full_classes.end_run()
    }

    pub fn class_counters(&self) -> CacheCounters {
        self.class_counters
    }

    /// Counters over all method caches (free functions and members)
    pub fn method_counters(&self) -> CacheCounters {
        let mut counters = self.methods.counters();
        counters.add(self.member_methods.counters());
        counters
    }

    pub fn class_count(&self) -> usize {
        self.shells.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use tessera_core::builder::ClassBuilder;
    use tessera_core::ir::ClassKind;

    fn key(name: &str) -> ClassKey {
        let class = ClassBuilder::new(name, ClassKind::Class)
            .extends("lang.Object")
            .build();
        ClassKey::of(&"main".into(), &class)
    }

    fn tree(value: i32) -> Result<WithGlobals<Tree>, Infallible> {
        Ok(WithGlobals::new(Tree::Int(value)))
    }

    fn fragments() -> Result<WithGlobals<Vec<Tree>>, Infallible> {
        Ok(WithGlobals::new(vec![Tree::Skip]))
    }

    #[test]
    fn test_class_key_includes_module() {
        let class = ClassBuilder::new("A", ClassKind::Class).build();
        assert_ne!(
            ClassKey::of(&"a".into(), &class),
            ClassKey::of(&"b".into(), &class)
        );
        assert_eq!(key("A").class_name(), Some(&ClassName::from("A")));
    }

    #[test]
    fn test_shell_reset_on_new_version() {
        let mut caches = ClassCaches::new();
        let k = key("A");
        caches
            .shell(&k, &Version::from_int(1))
            .type_data
            .get_or_init(fragments)
            .unwrap();
        assert!(caches.shell(&k, &Version::from_int(1)).type_data.is_filled());
        assert!(!caches.shell(&k, &Version::from_int(2)).type_data.is_filled());
        assert_eq!(
            caches.class_counters(),
            CacheCounters {
                reused: 1,
                invalidated: 2
            }
        );
    }

    #[test]
    fn test_class_invalidation_keeps_member_caches() {
        let mut caches = ClassCaches::new();
        let k = key("A");
        let v = Version::from_int(1);
        caches.shell(&k, &Version::from_int(1));
        let first = caches
            .member_methods
            .get_or_else_update((k.clone(), "m".into()), &v, || tree(1))
            .unwrap();
        caches.shell(&k, &Version::from_int(2));
        let second = caches
            .member_methods
            .get_or_else_update((k.clone(), "m".into()), &v, || tree(2))
            .unwrap();
        assert_eq!(first.token(), second.token());
    }

    #[test]
    fn test_full_class_sensitive_to_member_identity() {
        let mut caches = ClassCaches::new();
        let k = key("A");
        let v = Version::from_int(1);
        let m1 = Artifact::new(WithGlobals::new(Tree::Int(1)));
        let m1_again = Artifact::new(WithGlobals::new(Tree::Int(1)));

        let members = vec![Arc::clone(&m1)];
        let parts = FullClassParts {
            ctor: None,
            members: &members,
            exported: &[],
        };
        let first = caches
            .full_classes
            .get_or_else_update(k.clone(), &v, &parts, fragments)
            .unwrap();
        let second = caches
            .full_classes
            .get_or_else_update(k.clone(), &v, &parts, fragments)
            .unwrap();
        assert_eq!(first.token(), second.token());

        // Equal content, different artifact
        let members = vec![m1_again];
        let parts = FullClassParts {
            ctor: None,
            members: &members,
            exported: &[],
        };
        let third = caches
            .full_classes
            .get_or_else_update(k, &v, &parts, fragments)
            .unwrap();
        assert_ne!(first.token(), third.token());
        assert_eq!(caches.full_classes.counters().invalidated, 2);
    }

    #[test]
    fn test_end_run_evicts_all_levels() {
        let mut caches = ClassCaches::new();
        let (a, b) = (key("A"), key("B"));
        let v = Version::from_int(1);
        for k in [&a, &b] {
            caches.shell(k, &v);
            caches
                .methods
                .get_or_else_update(
                    (k.clone(), MemberNamespace::PublicStatic, "s".into()),
                    &v,
                    || tree(0),
                )
                .unwrap();
        }
        assert_eq!(caches.end_run(), 0);

        caches.start_run();
        caches.shell(&a, &v);
        caches
            .methods
            .get_or_else_update(
                (a.clone(), MemberNamespace::PublicStatic, "s".into()),
                &v,
                || tree(0),
            )
            .unwrap();
        assert_eq!(caches.end_run(), 2);
        assert_eq!(caches.class_count(), 1);
        assert!(caches
            .methods
            .contains_key(&(a, MemberNamespace::PublicStatic, "s".into())));
    }
}
