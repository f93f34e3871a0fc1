//! Incremental emitter for linked class IR
//!
//! The emitter turns a [`ModuleSet`](tessera_core::ModuleSet) into target
//! syntax trees, one list of statements per module. It is meant to be run
//! repeatedly on successive versions of the same program: every generated
//! fragment is cached under the version of the input it came from, and is
//! reused as long as that version does not change.
//!
//! ```no_run
//! use tessera_core::ModuleSet;
//! use tessera_emitter::{Emitter, EmitterConfig};
//!
//! # fn load() -> ModuleSet { unimplemented!() }
//! let mut emitter = Emitter::new(EmitterConfig::default());
//! let first = emitter.emit(&load())?;
//! let second = emitter.emit(&load())?; // mostly served from the caches
//! assert_eq!(first.passes, 1);
//! # let _ = second;
//! # Ok::<(), tessera_emitter::EmitError>(())
//! ```

pub mod cache;
pub mod class_cache;
pub mod class_emitter;
pub mod codegen;
pub mod config;
pub mod core_lib;
pub mod emitter;
pub mod error;
pub mod globals;
pub mod knowledge;
pub mod module_cache;
pub mod module_emitter;
pub mod naming;
pub mod session;
pub mod tree;

pub use config::{EmitterConfig, ModuleKind};
pub use emitter::{Emitter, EmitterResult, EmitterStats};
pub use error::{ConfigError, EmitError, Result};
pub use globals::{DangerousFilter, GlobalRefTracking, GlobalRefs, WithGlobals};
pub use module_emitter::ModuleOutput;
pub use tree::Tree;
