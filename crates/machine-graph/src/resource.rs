//! The minimal capability every constructed resource must expose to the graph.

use crate::name::ResourceName;
use std::any::Any;
use std::fmt;

/// A live, constructed object satisfying one API.
///
/// The graph only needs to know a resource's name and be able to downcast it
/// back to its concrete type for callers; everything else (motor, arm,
/// vision...) is a capability the concrete type adds on top via `as_any`.
pub trait Resource: Send + Sync + fmt::Debug {
    /// The name this resource was constructed under.
    fn resource_name(&self) -> &ResourceName;

    /// Downcast support, so a caller that knows the concrete resource type
    /// can recover it from the graph's `Arc<dyn Resource>` handle.
    fn as_any(&self) -> &dyn Any;

    /// Best-effort shutdown. Errors are logged and accumulated by the
    /// caller, never allowed to abort a close sweep.
    fn close(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }

    /// Optional long-running-operation stop hook. Resources that don't
    /// support cancellable operations can leave this as a no-op.
    fn stop(&self, _extra: &serde_json::Value) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }

    /// Called with the current snapshot of weakly-matched peers whenever
    /// the set changes. Resources that don't subscribe to weak matching
    /// can leave this as a no-op.
    fn update_weak_peers(&self, _peers: &[std::sync::Arc<dyn Resource>]) {}
}
