//! Registry and constructor error types.

use machine_graph::{Api, ResourceName};

/// Errors raised by [`crate::Registry`] and by constructor invocation.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// `register` called for an `(API, Model)` that is already registered.
    #[error("constructor for {api} model {model} is already registered")]
    AlreadyRegistered { api: Api, model: String },

    /// No constructor, attribute converter, or discover probe registered
    /// for this `(API, Model)`.
    #[error("no constructor registered for {api} model {model}")]
    UnknownModel { api: Api, model: String },

    /// `MaxInstance` would be exceeded by building one more of this API.
    #[error("max instance count reached for {api}")]
    MaxInstanceReached { api: Api },

    /// `AttributeMapConverter::validate` rejected the attribute map.
    #[error("invalid attributes for {name}: {cause}")]
    InvalidAttributes { name: ResourceName, cause: String },

    /// A declared dependency could not be resolved to a live resource handle
    /// at construction time (distinct from `DependencyNotReady`, which means
    /// "not yet" — this means "never will be", e.g. wrong concrete type).
    #[error("dependency {0} could not be resolved")]
    DependencyNotResolved(ResourceName),

    /// A required dependency is registered but not yet `configured`.
    #[error("dependency {0} is not ready")]
    DependencyNotReady(ResourceName),

    /// The constructor panicked; caught at the call boundary.
    #[error("constructor for {0} panicked during construction")]
    PanicDuringConstruction(ResourceName),

    /// `Discover` probe failed.
    #[error("discovery for {api} model {model} failed: {cause}")]
    DiscoverError {
        api: Api,
        model: String,
        cause: String,
    },
}
