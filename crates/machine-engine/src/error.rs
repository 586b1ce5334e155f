//! Reconfiguration engine error type.

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("plug-in {module} first-run failed: {cause}")]
    FirstRunFailed { module: String, cause: String },

    #[error("failed to synchronize packages: {0}")]
    PackageSyncFailed(String),

    #[error(transparent)]
    Module(#[from] machine_modules::ModuleError),

    #[error(transparent)]
    Process(#[from] machine_process::ProcessError),

    #[error(transparent)]
    Resource(#[from] machine_resources::ResourceError),

    #[error(transparent)]
    Graph(#[from] machine_graph::GraphError),

    #[error("maintenance sensor read timed out")]
    MaintenanceSensorTimeout,
}
