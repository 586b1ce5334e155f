//! Façade-level error type: wraps every collaborator's error plus the
//! persisted-config cache's I/O failures.

#[derive(Debug, thiserror::Error)]
pub enum FacadeError {
    #[error(transparent)]
    Engine(#[from] machine_engine::EngineError),

    #[error(transparent)]
    Resource(#[from] machine_resources::ResourceError),

    #[error("failed to read persisted config at {path}: {cause}")]
    PersistRead { path: String, cause: String },

    #[error("failed to write persisted config at {path}: {cause}")]
    PersistWrite { path: String, cause: String },

    #[error("no cache directory available for this platform")]
    NoCacheDir,
}
