//! Module manager error type.

use machine_graph::{Api, ResourceName};

#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    #[error("module {0} already added")]
    AlreadyExists(String),

    #[error("module {0} not found")]
    NotFound(String),

    #[error("module {module} first-run failed: {cause}")]
    FirstRunFailed { module: String, cause: String },

    #[error("no plug-in claims {api} model {model}")]
    NotClaimed { api: Api, model: String },

    #[error("resource {0} not hosted by any module")]
    ResourceNotFound(ResourceName),

    #[error("constructor for {name} panicked during construction")]
    PanicDuringConstruction { name: ResourceName },

    #[error("{0}")]
    ValidationFailed(String),
}
