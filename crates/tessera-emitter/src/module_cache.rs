//! Per-module caches for imports, top-level exports and initializers

use std::collections::HashMap;
use std::sync::Arc;

use tessera_core::{Module, ModuleId, Version};

use crate::cache::{Artifact, CacheCounters, CacheEntry};
use crate::globals::WithGlobals;
use crate::knowledge::ClassIndex;
use crate::tree::Tree;

#[derive(Debug, Default)]
struct ModuleEntries {
    imports: CacheEntry<Vec<Tree>>,
    top_level_exports: CacheEntry<Vec<Tree>>,
    initializers: CacheEntry<Vec<Tree>>,
}

impl ModuleEntries {
    fn is_used(&self) -> bool {
        self.imports.is_used() || self.top_level_exports.is_used() || self.initializers.is_used()
    }

    fn reset_used(&mut self) {
        self.imports.reset_used();
        self.top_level_exports.reset_used();
        self.initializers.reset_used();
    }
}

#[derive(Debug, Default)]
pub struct ModuleCaches {
    modules: HashMap<ModuleId, ModuleEntries>,
    counters: CacheCounters,
}

type Fragments<E> = Result<Arc<Artifact<Vec<Tree>>>, E>;

impl ModuleCaches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn imports<E>(
        &mut self,
        module: &ModuleId,
        version: &Version,
        compute: impl FnOnce() -> Result<WithGlobals<Vec<Tree>>, E>,
    ) -> Fragments<E> {
        let entries = self.modules.entry(module.clone()).or_default();
        entries
            .imports
            .get_or_else_update(version, &mut self.counters, compute)
    }

    pub fn top_level_exports<E>(
        &mut self,
        module: &ModuleId,
        version: &Version,
        compute: impl FnOnce() -> Result<WithGlobals<Vec<Tree>>, E>,
    ) -> Fragments<E> {
        let entries = self.modules.entry(module.clone()).or_default();
        entries
            .top_level_exports
            .get_or_else_update(version, &mut self.counters, compute)
    }

    pub fn initializers<E>(
        &mut self,
        module: &ModuleId,
        version: &Version,
        compute: impl FnOnce() -> Result<WithGlobals<Vec<Tree>>, E>,
    ) -> Fragments<E> {
        let entries = self.modules.entry(module.clone()).or_default();
        entries
            .initializers
            .get_or_else_update(version, &mut self.counters, compute)
    }

    pub fn start_run(&mut self) {
        self.counters = CacheCounters::default();
        for entries in self.modules.values_mut() {
            entries.reset_used();
        }
    }

    /// Forget modules that were not emitted during this run
    pub fn end_run(&mut self) -> usize {
        let before = self.modules.len();
        self.modules.retain(|_, entries| entries.is_used());
        before - self.modules.len()
    }

    pub fn counters(&self) -> CacheCounters {
        self.counters
    }

    pub fn contains(&self, module: &ModuleId) -> bool {
        self.modules.contains_key(module)
    }
}

/// Imports depend on the dependency lists and on which module is the root
pub fn imports_version(module: &Module, index: &ClassIndex) -> Version {
    let root = index.root_module().map(|id| id.as_str()).unwrap_or_default();
    let parts = std::iter::once(format!("root:{}", root))
        .chain(
            module
                .internal_dependencies
                .iter()
                .map(|id| format!("int:{}", id)),
        )
        .chain(
            module
                .external_dependencies
                .iter()
                .map(|ext| format!("ext:{}", ext)),
        );
    Version::fingerprint_parts(parts)
}

/// Owners of the given classes, so moving a class to another module
/// invalidates the code that reaches it
fn owners_version<'a>(
    classes: impl Iterator<Item = &'a tessera_core::ClassName>,
    index: &ClassIndex,
) -> Version {
    Version::fingerprint_parts(classes.map(|class| {
        let owner = index.owner(class).map(|id| id.as_str()).unwrap_or_default();
        format!("{}@{}", class, owner)
    }))
}

pub fn top_level_exports_version(module: &Module, index: &ClassIndex) -> Version {
    let owners = owners_version(
        module
            .top_level_exports
            .iter()
            .filter_map(|export| export.referenced_class()),
        index,
    );
    let names = Version::fingerprint_parts(
        module
            .top_level_exports
            .iter()
            .map(|export| export.export_name.as_str()),
    );
    Version::combine(
        module
            .top_level_exports
            .iter()
            .map(|export| &export.version)
            .chain([&names, &owners]),
    )
}

pub fn initializers_version(module: &Module, index: &ClassIndex) -> Version {
    let owners = owners_version(module.initializers.iter().map(|init| &init.class), index);
    Version::combine([&module.initializers_version, &owners])
}
