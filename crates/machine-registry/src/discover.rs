//! Optional discovery probes for `DiscoverComponents`.

use crate::error::RegistryError;
use async_trait::async_trait;
use serde_json::Value;

/// Probes for physically-present instances of a model (e.g. USB scan).
/// Entries without a `Discover` are silently skipped by `DiscoverComponents`
/// rather than treated as an error.
#[async_trait]
pub trait Discover: Send + Sync {
    async fn discover(&self, extra: &Value) -> Result<Value, RegistryError>;
}
