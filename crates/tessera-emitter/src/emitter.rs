//! Incremental emitter entry point
//!
//! A run emits every module of a [`ModuleSet`] through the session caches.
//! Generated names avoid the dangerous global refs assumed by the session, but
//! which refs are dangerous is only known once the code is generated. When a
//! run observes a different dangerous set than it assumed, the session is
//! dropped and the run is repeated once under the observed set. Names only
//! depend on the assumed set, so the second pass is expected to observe the
//! same refs again; if it does not, the run fails.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, info, instrument};

use tessera_core::{ModuleId, ModuleSet};

use crate::codegen::CodegenCtx;
use crate::config::EmitterConfig;
use crate::core_lib;
use crate::error::{EmitError, Result};
use crate::globals::{DangerousFilter, GlobalRefs};
use crate::knowledge::ClassIndex;
use crate::module_emitter::{emit_module, ModuleEmitCaches, ModuleOutput};
use crate::session::Session;

/// Cache statistics of the last pass of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EmitterStats {
    pub classes_reused: usize,
    pub classes_invalidated: usize,
    pub methods_reused: usize,
    pub methods_invalidated: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmitterResult {
    /// Configured header, for whoever writes the modules out
    pub header: String,
    pub modules: BTreeMap<ModuleId, ModuleOutput>,
    /// Every tracked global ref of the emitted code
    pub global_refs: GlobalRefs,
    pub dangerous_global_refs: GlobalRefs,
    pub stats: EmitterStats,
    /// 1, or 2 when the dangerous refs had to be re-assumed
    pub passes: usize,
}

struct Pass {
    modules: BTreeMap<ModuleId, ModuleOutput>,
    global_refs: GlobalRefs,
    stats: EmitterStats,
}

pub struct Emitter {
    config: EmitterConfig,
    filter: DangerousFilter,
    session: Session,
}

impl Emitter {
    pub fn new(config: EmitterConfig) -> Self {
        Self {
            config,
            filter: DangerousFilter::default(),
            session: Session::default(),
        }
    }

    /// Replace the predicate deciding which global refs are dangerous
    pub fn with_dangerous_filter(mut self, filter: DangerousFilter) -> Self {
        self.filter = filter;
        self.session = Session::default();
        self
    }

    pub fn config(&self) -> &EmitterConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Emit all modules, reusing whatever the previous runs cached
    #[instrument(level = "debug", skip_all, fields(modules = modules.modules.len()))]
    pub fn emit(&mut self, modules: &ModuleSet) -> Result<EmitterResult> {
        self.config.validate()?;
        self.config.validate_module_count(modules.modules.len())?;
        modules.validate()?;
        let index = ClassIndex::build(modules);
        debug!("Indexed {} classes", index.len());

        let mut pass = self.emit_once(modules, &index)?;
        let mut dangerous = pass.global_refs.dangerous(&self.filter);
        let mut passes = 1;

        if dangerous != *self.session.assumed() {
            info!(
                "Dangerous global refs changed from {} to {}, emitting again",
                self.session.assumed(),
                dangerous
            );
            self.session = Session::new(dangerous.clone());
            pass = self.emit_once(modules, &index)?;
            passes = 2;

            let observed = pass.global_refs.dangerous(&self.filter);
            if observed != dangerous {
                return Err(EmitError::GlobalRefsDiverged {
                    assumed: dangerous,
                    observed,
                });
            }
            dangerous = observed;
        }

        info!("Emitted {} modules in {} pass(es)", pass.modules.len(), passes);
        debug!(
            classes_reused = pass.stats.classes_reused,
            classes_invalidated = pass.stats.classes_invalidated,
            methods_reused = pass.stats.methods_reused,
            methods_invalidated = pass.stats.methods_invalidated,
            "cache statistics"
        );

        Ok(EmitterResult {
            header: self.config.header.clone(),
            modules: pass.modules,
            global_refs: pass.global_refs,
            dangerous_global_refs: dangerous,
            stats: pass.stats,
            passes,
        })
    }

    fn emit_once(&mut self, modules: &ModuleSet, index: &ClassIndex) -> Result<Pass> {
        self.session.start_run();

        // Modules other modules import from need to export their definitions
        let mut imported: BTreeSet<&ModuleId> = modules
            .modules
            .iter()
            .flat_map(|m| m.internal_dependencies.iter())
            .collect();
        if modules.modules.len() > 1 {
            imported.extend(index.root_module());
        }

        let names = &self.session.names;
        let class_caches = &mut self.session.class_caches;
        let module_caches = &mut self.session.module_caches;
        let core_slot = &mut self.session.core_lib;

        let mut outputs = BTreeMap::new();
        let mut global_refs = GlobalRefs::new();
        for module in modules.dependency_order() {
            let ctx = CodegenCtx {
                config: &self.config,
                names,
                index,
                filter: &self.filter,
                module: &module.id,
            };
            let core = if module.is_root {
                Some(core_slot.get_or_init(|| Ok::<_, EmitError>(core_lib::generate(&ctx)))?)
            } else {
                None
            };
            let output = emit_module(
                &ctx,
                ModuleEmitCaches {
                    classes: &mut *class_caches,
                    modules: &mut *module_caches,
                },
                core.as_ref(),
                module,
                imported.contains(&module.id),
            )?;
            global_refs.extend(&output.globals);
            outputs.insert(module.id.clone(), output);
        }

        let class_counters = self.session.class_caches.class_counters();
        let method_counters = self.session.class_caches.method_counters();
        let stats = EmitterStats {
            classes_reused: class_counters.reused,
            classes_invalidated: class_counters.invalidated,
            methods_reused: method_counters.reused,
            methods_invalidated: method_counters.invalidated,
        };
        let evicted = self.session.end_run();
        debug!(
            "Pass done: {} methods reused, {} invalidated, {} cache entries evicted",
            stats.methods_reused, stats.methods_invalidated, evicted
        );

        Ok(Pass {
            modules: outputs,
            global_refs,
            stats,
        })
    }
}
