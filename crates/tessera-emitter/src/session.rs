//! Cache session
//!
//! Everything cached is only valid for one assumed set of dangerous global
//! refs, because generated names avoid that set. A session bundles the
//! assumption with the caches built under it; changing the assumption means
//! starting a new session.

use std::sync::Arc;

use crate::cache::OneTimeSlot;
use crate::class_cache::ClassCaches;
use crate::core_lib::CoreLib;
use crate::globals::GlobalRefs;
use crate::module_cache::ModuleCaches;
use crate::naming::NameGen;

#[derive(Debug, Default)]
pub struct Session {
    assumed: Arc<GlobalRefs>,
    pub(crate) names: NameGen,
    pub(crate) class_caches: ClassCaches,
    pub(crate) module_caches: ModuleCaches,
    pub(crate) core_lib: OneTimeSlot<CoreLib>,
}

impl Session {
    pub fn new(assumed: GlobalRefs) -> Self {
        let assumed = Arc::new(assumed);
        Self {
            names: NameGen::new(Arc::clone(&assumed)),
            assumed,
            class_caches: ClassCaches::new(),
            module_caches: ModuleCaches::new(),
            core_lib: OneTimeSlot::default(),
        }
    }

    /// Dangerous global refs generated names currently avoid
    pub fn assumed(&self) -> &GlobalRefs {
        &self.assumed
    }

    pub(crate) fn start_run(&mut self) {
        self.class_caches.start_run();
        self.module_caches.start_run();
    }

    /// Evict what the run did not use, returning the number of evictions
    pub(crate) fn end_run(&mut self) -> usize {
        self.class_caches.end_run() + self.module_caches.end_run()
    }

    /// Number of classes with live cache entries
    pub fn cached_classes(&self) -> usize {
        self.class_caches.class_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_follow_assumption() {
        let session = Session::new(GlobalRefs::single("$c_A"));
        assert_eq!(session.names.class_ctor(&"A".into()), "$c_A$1");
        assert!(session.assumed().contains("$c_A"));
        assert_eq!(session.cached_classes(), 0);
    }
}
