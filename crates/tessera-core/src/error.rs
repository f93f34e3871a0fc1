use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Duplicate module id: {0}")]
    DuplicateModule(String),

    #[error("Module set has no root module")]
    MissingRootModule,

    #[error("Module set has several root modules: {0}")]
    MultipleRootModules(String),

    #[error("Module '{module}' depends on unknown module '{dependency}'")]
    UnknownDependency { module: String, dependency: String },

    #[error("Class '{class}' appears in both '{first}' and '{second}'")]
    DuplicateClass {
        class: String,
        first: String,
        second: String,
    },

    #[error("Ancestors of class '{class}' must start with the class itself")]
    MalformedAncestors { class: String },
}
