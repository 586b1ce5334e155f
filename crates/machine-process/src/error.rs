//! Process supervisor error type.

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("process {0} already registered")]
    AlreadyExists(String),

    #[error("process {0} not found")]
    NotFound(String),

    #[error("failed to spawn process {id}: {cause}")]
    SpawnFailed { id: String, cause: String },

    #[error("processes are disabled in untrusted mode")]
    ProcessesDisabled,
}
