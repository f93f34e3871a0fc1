//! Versioned caches with per-run liveness tracking
//!
//! A cached artifact is returned as long as the version it was computed for is
//! the [same version](Version::same_version) as the requested one. Entries
//! that were not requested during a run are evicted when the run ends.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tessera_core::Version;

use crate::globals::{GlobalRefs, WithGlobals};

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Identity of one computed artifact
///
/// Two artifacts with the same token are the same computation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GenToken(u64);

impl GenToken {
    pub fn fresh() -> Self {
        GenToken(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }
}

/// Immutable result of one computation, shared between caches
#[derive(Debug)]
pub struct Artifact<T> {
    token: GenToken,
    value: T,
    globals: GlobalRefs,
}

impl<T> Artifact<T> {
    pub fn new(generated: WithGlobals<T>) -> Arc<Self> {
        Arc::new(Artifact {
            token: GenToken::fresh(),
            value: generated.value,
            globals: generated.globals,
        })
    }

    pub fn token(&self) -> GenToken {
        self.token
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn globals(&self) -> &GlobalRefs {
        &self.globals
    }
}

impl<T: Clone> Artifact<T> {
    pub fn to_with_globals(&self) -> WithGlobals<T> {
        WithGlobals::with(self.value.clone(), self.globals.clone())
    }
}

/// Reuse statistics of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheCounters {
    pub reused: usize,
    pub invalidated: usize,
}

impl CacheCounters {
    pub fn add(&mut self, other: CacheCounters) {
        self.reused += other.reused;
        self.invalidated += other.invalidated;
    }
}

/// Last computed artifact for one key
#[derive(Debug)]
pub struct CacheEntry<T> {
    version: Version,
    artifact: Option<Arc<Artifact<T>>>,
    used: bool,
}

impl<T> Default for CacheEntry<T> {
    fn default() -> Self {
        Self {
            version: Version::UNVERSIONED,
            artifact: None,
            used: false,
        }
    }
}

impl<T> CacheEntry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored artifact if still valid for `version`, otherwise recompute
    ///
    /// Marks the entry used either way. The compute closure is not called on
    /// a hit.
    pub fn get_or_else_update<E>(
        &mut self,
        version: &Version,
        counters: &mut CacheCounters,
        compute: impl FnOnce() -> Result<WithGlobals<T>, E>,
    ) -> Result<Arc<Artifact<T>>, E> {
        self.used = true;
        if let Some(artifact) = &self.artifact {
            if self.version.same_version(version) {
                counters.reused += 1;
                return Ok(Arc::clone(artifact));
            }
        }
        let artifact = Artifact::new(compute()?);
        counters.invalidated += 1;
        self.version = version.clone();
        self.artifact = Some(Arc::clone(&artifact));
        Ok(artifact)
    }

    pub fn is_used(&self) -> bool {
        self.used
    }

    pub fn reset_used(&mut self) {
        self.used = false;
    }

    pub fn version(&self) -> &Version {
        &self.version
    }
}

/// Map of cache entries with shared counters
#[derive(Debug)]
pub struct KeyedCache<K, T> {
    entries: HashMap<K, CacheEntry<T>>,
    counters: CacheCounters,
}

impl<K, T> Default for KeyedCache<K, T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            counters: CacheCounters::default(),
        }
    }
}

impl<K: Eq + Hash, T> KeyedCache<K, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_else_update<E>(
        &mut self,
        key: K,
        version: &Version,
        compute: impl FnOnce() -> Result<WithGlobals<T>, E>,
    ) -> Result<Arc<Artifact<T>>, E> {
        self.entries
            .entry(key)
            .or_default()
            .get_or_else_update(version, &mut self.counters, compute)
    }

    /// Reset counters and liveness flags
    pub fn start_run(&mut self) {
        self.counters = CacheCounters::default();
        for entry in self.entries.values_mut() {
            entry.reset_used();
        }
    }

    /// Drop entries not requested since the run started
    ///
    /// Returns how many entries were evicted.
    pub fn end_run(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_used());
        before - self.entries.len()
    }

    pub fn counters(&self) -> CacheCounters {
        self.counters
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Slot computed at most once during its lifetime
#[derive(Debug)]
pub struct OneTimeSlot<T> {
    artifact: Option<Arc<Artifact<T>>>,
}

impl<T> Default for OneTimeSlot<T> {
    fn default() -> Self {
        Self { artifact: None }
    }
}

impl<T> OneTimeSlot<T> {
    pub fn get_or_init<E>(
        &mut self,
        compute: impl FnOnce() -> Result<WithGlobals<T>, E>,
    ) -> Result<Arc<Artifact<T>>, E> {
        if let Some(artifact) = &self.artifact {
            return Ok(Arc::clone(artifact));
        }
        let artifact = Artifact::new(compute()?);
        self.artifact = Some(Arc::clone(&artifact));
        Ok(artifact)
    }

    pub fn is_filled(&self) -> bool {
        self.artifact.is_some()
    }
}
