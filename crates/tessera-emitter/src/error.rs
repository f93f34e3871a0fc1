use tessera_core::CoreError;
use thiserror::Error;

use crate::globals::GlobalRefs;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Header must only contain comments and whitespace, found: {0}")]
    InvalidHeader(String),

    #[error("Header ends inside an unterminated block comment")]
    UnterminatedHeaderComment,

    #[error("Header ends with a line comment that is not followed by a newline")]
    MissingHeaderNewline,

    #[error("Module path pattern is empty")]
    EmptyPathPattern,

    #[error("Module path pattern '{0}' does not contain the {{module}} placeholder")]
    MissingModulePlaceholder(String),

    #[error("Module kind 'none' supports a single module, got {0}")]
    TooManyModules(usize),
}

/// Fatal errors aborting an emitter run
///
/// No partial output is returned when one of these is raised.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmitError {
    #[error("Module '{module}' generated no content (classes: {classes:?})")]
    EmptyModule {
        module: String,
        classes: Vec<String>,
    },

    #[error("JS class '{class}' has instances but no JS constructor")]
    MissingJsConstructor { class: String },

    #[error("Dangerous global refs changed in the second pass: assumed {assumed}, observed {observed}")]
    GlobalRefsDiverged {
        assumed: GlobalRefs,
        observed: GlobalRefs,
    },

    #[error("Invalid module set: {0}")]
    InvalidModuleSet(#[from] CoreError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, EmitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = EmitError::EmptyModule {
            module: "util".to_string(),
            classes: vec!["app.Empty".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Module 'util' generated no content (classes: [\"app.Empty\"])"
        );

        let err = EmitError::GlobalRefsDiverged {
            assumed: GlobalRefs::single("$c_A"),
            observed: GlobalRefs::new(),
        };
        assert!(err.to_string().contains("assumed {$c_A}, observed {}"));
    }

    #[test]
    fn test_from_conversions() {
        let err: EmitError = CoreError::MissingRootModule.into();
        assert!(matches!(err, EmitError::InvalidModuleSet(_)));
        let err: EmitError = ConfigError::TooManyModules(2).into();
        assert_eq!(
            err.to_string(),
            "Invalid configuration: Module kind 'none' supports a single module, got 2"
        );
    }
}
