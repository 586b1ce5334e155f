//! Resource manager error type.

use machine_graph::ResourceName;

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("resource {0} not found")]
    NotFound(ResourceName),

    #[error("resource {name} not ready: {reason}")]
    NotReady { name: ResourceName, reason: String },

    #[error("no constructor or plug-in claims model {model} for {api}")]
    UnknownModel { api: machine_graph::Api, model: String },

    #[error("dependency {0} is not yet configured")]
    DependencyNotReady(ResourceName),

    #[error("dependency {0} could not be resolved")]
    DependencyNotResolved(ResourceName),

    #[error(transparent)]
    Registry(#[from] machine_registry::RegistryError),

    #[error(transparent)]
    Module(#[from] machine_modules::ModuleError),

    #[error(transparent)]
    Process(#[from] machine_process::ProcessError),

    #[error(transparent)]
    Remote(#[from] machine_remote::RemoteError),

    #[error(transparent)]
    Graph(#[from] machine_graph::GraphError),

    #[error("resource {0} construction timed out")]
    ResourceConfigureTimeout(ResourceName),

    #[error("constructor for {0} panicked during construction")]
    PanicDuringConstruction(ResourceName),
}
