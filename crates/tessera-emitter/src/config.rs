//! Emitter configuration

use serde::{Deserialize, Serialize};
use tessera_core::ModuleId;

use crate::error::ConfigError;
use crate::globals::GlobalRefTracking;

const MODULE_PLACEHOLDER: &str = "{module}";

/// How generated modules reference each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    /// A single script without imports or exports
    #[default]
    None,
    EsModule,
    CommonJs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    pub module_kind: ModuleKind,
    /// Emit `class` definitions instead of constructor functions and prototypes
    pub use_class_syntax: bool,
    /// Import path of an internal module, `{module}` is replaced by its id
    pub module_path_pattern: String,
    /// Text downstream tools put in front of every module
    pub header: String,
    pub global_ref_tracking: GlobalRefTracking,
    /// Use `a.b` instead of `a["b"]` when `b` is a valid identifier
    pub optimize_bracket_selects: bool,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            module_kind: ModuleKind::None,
            use_class_syntax: true,
            module_path_pattern: format!("./{}.js", MODULE_PLACEHOLDER),
            header: String::new(),
            global_ref_tracking: GlobalRefTracking::Dangerous,
            optimize_bracket_selects: true,
        }
    }
}

impl EmitterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module_kind(mut self, module_kind: ModuleKind) -> Self {
        self.module_kind = module_kind;
        self
    }

    pub fn with_class_syntax(mut self, use_class_syntax: bool) -> Self {
        self.use_class_syntax = use_class_syntax;
        self
    }

    pub fn with_module_path_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.module_path_pattern = pattern.into();
        self
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    pub fn with_global_ref_tracking(mut self, tracking: GlobalRefTracking) -> Self {
        self.global_ref_tracking = tracking;
        self
    }

    pub fn with_bracket_select_optimization(mut self, enabled: bool) -> Self {
        self.optimize_bracket_selects = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_header(&self.header)?;
        if self.module_path_pattern.is_empty() {
            return Err(ConfigError::EmptyPathPattern);
        }
        if !self.module_path_pattern.contains(MODULE_PLACEHOLDER) {
            return Err(ConfigError::MissingModulePlaceholder(
                self.module_path_pattern.clone(),
            ));
        }
        Ok(())
    }

    /// Checks that depend on the module set being emitted
    pub fn validate_module_count(&self, count: usize) -> Result<(), ConfigError> {
        if self.module_kind == ModuleKind::None && count > 1 {
            return Err(ConfigError::TooManyModules(count));
        }
        Ok(())
    }

    /// Import path of an internal module
    pub fn module_path(&self, module: &ModuleId) -> String {
        self.module_path_pattern
            .replace(MODULE_PLACEHOLDER, module.as_str())
    }
}

/// A header may only contain whitespace and comments, and a trailing line
/// comment must be closed by a newline.
fn validate_header(header: &str) -> Result<(), ConfigError> {
    let mut rest = header;
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return Ok(());
        }
        if let Some(comment) = rest.strip_prefix("//") {
            match comment.find('\n') {
                Some(end) => rest = &comment[end + 1..],
                None => return Err(ConfigError::MissingHeaderNewline),
            }
        } else if let Some(comment) = rest.strip_prefix("/*") {
            match comment.find("*/") {
                Some(end) => rest = &comment[end + 2..],
                None => return Err(ConfigError::UnterminatedHeaderComment),
            }
        } else {
            let line = rest.lines().next().unwrap_or_default();
            return Err(ConfigError::InvalidHeader(line.to_string()));
        }
    }
}
