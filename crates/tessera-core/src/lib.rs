//! Linked class IR and versioning for the tessera emitter

pub mod builder;
pub mod error;
pub mod ir;
pub mod names;
pub mod version;

pub use error::CoreError;
pub use ir::{LinkedClass, Module, ModuleSet};
pub use names::{ClassName, FieldName, MethodName, ModuleId};
pub use version::Version;
