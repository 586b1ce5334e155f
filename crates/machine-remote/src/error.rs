//! Remote client error type.

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("remote {0} is unavailable")]
    RemoteUnavailable(String),

    #[error("remote {0} requires authentication")]
    RemoteAuthRequired(String),

    #[error("transport error talking to remote {remote}: {cause}")]
    Transport { remote: String, cause: String },
}
