//! Graph-level error type.

use crate::name::ResourceName;

/// Errors raised by [`crate::ResourceGraph`] operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// `AddNode` called with a name already present in the graph.
    #[error("resource {0} already exists")]
    AlreadyExists(ResourceName),

    /// No node with this name.
    #[error("resource {0} not found")]
    NotFound(ResourceName),

    /// Adding this edge would create a cycle among configured nodes.
    #[error("cycle detected: {child} depends on {parent}, which already (transitively) depends on {child}")]
    CycleDetected {
        child: ResourceName,
        parent: ResourceName,
    },

    /// `ResolveDependencies` found a circular dependency naming both
    /// endpoints.
    #[error("circular dependency between {a} and {b}")]
    CircularDependency { a: ResourceName, b: ResourceName },

    /// An edge would connect a node to itself.
    #[error("resource {0} cannot depend on itself")]
    SelfDependency(ResourceName),
}
