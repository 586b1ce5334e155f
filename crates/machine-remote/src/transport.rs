//! The abstract wire transport a remote client drives.
//!
//! The actual RPC protocol is out of scope; this trait is the seam a real
//! transport (and, in tests, a fake one) plugs into.

use crate::error::RemoteError;
use async_trait::async_trait;
use machine_graph::{Resource, ResourceName};
use std::sync::Arc;

#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Establish (or re-establish) the connection. Called by the
    /// reconnect loop; should be cheap to retry.
    async fn connect(&self) -> Result<(), RemoteError>;

    /// Current resource names exposed by the remote, unprefixed.
    async fn list_resources(&self) -> Result<Vec<ResourceName>, RemoteError>;

    /// A proxy implementing the same API surface as a local resource.
    async fn resource_proxy(&self, name: &ResourceName) -> Result<Arc<dyn Resource>, RemoteError>;
}
