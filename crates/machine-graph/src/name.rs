//! Resource names and the API tuple that classifies them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of capability surface an [`Api`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ApiType {
    /// A physical or simulated component (motor, arm, camera, ...).
    Component,
    /// A higher-level service built on top of components (vision, motion, ...).
    Service,
    /// A resource internal to the runtime itself (framesystem, web router, ...).
    Internal,
}

impl fmt::Display for ApiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiType::Component => write!(f, "component"),
            ApiType::Service => write!(f, "service"),
            ApiType::Internal => write!(f, "internal"),
        }
    }
}

/// Capability surface tuple: `(namespace, type, subtype)`.
///
/// Distinguishes components, services, and internal services, and within
/// each, the specific subtype (`motor`, `arm`, `vision`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Api {
    /// Namespace the API was declared under (e.g. `rdk`, `acme`).
    pub namespace: String,
    /// Broad kind of resource.
    pub r#type: ApiType,
    /// Specific capability subtype (e.g. `motor`, `arm`, `anvil`).
    pub subtype: String,
}

impl Api {
    /// Construct a new API tuple.
    pub fn new(namespace: impl Into<String>, r#type: ApiType, subtype: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            r#type,
            subtype: subtype.into(),
        }
    }

    /// Shorthand for a `component` API.
    pub fn component(namespace: impl Into<String>, subtype: impl Into<String>) -> Self {
        Self::new(namespace, ApiType::Component, subtype)
    }

    /// Shorthand for a `service` API.
    pub fn service(namespace: impl Into<String>, subtype: impl Into<String>) -> Self {
        Self::new(namespace, ApiType::Service, subtype)
    }

    /// Shorthand for an `internal` API.
    pub fn internal(namespace: impl Into<String>, subtype: impl Into<String>) -> Self {
        Self::new(namespace, ApiType::Internal, subtype)
    }
}

impl fmt::Display for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.namespace, self.r#type, self.subtype)
    }
}

/// Identifies one resource: its API, its local name, and — when the
/// resource was surfaced through remote inclusion — the chain of remote
/// names it was reached through.
///
/// Two names compare equal iff all three fields match; the `remote_path` is
/// part of identity so a resource `m1` owned locally never collides with the
/// same name `m1` surfaced from a remote called `r`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceName {
    /// Capability surface.
    pub api: Api,
    /// Local name within that surface.
    pub name: String,
    /// Ordered chain of remote names this resource was surfaced through,
    /// outermost first. Empty for a locally-owned resource.
    pub remote_path: Vec<String>,
}

impl ResourceName {
    /// Construct a locally-owned resource name.
    pub fn new(api: Api, name: impl Into<String>) -> Self {
        Self {
            api,
            name: name.into(),
            remote_path: Vec::new(),
        }
    }

    /// Returns a copy of this name with `remote` prepended to the remote
    /// path, as happens when a resource is surfaced through remote
    /// inclusion.
    #[must_use]
    pub fn prefixed_with(&self, remote: &str) -> Self {
        let mut remote_path = Vec::with_capacity(self.remote_path.len() + 1);
        remote_path.push(remote.to_string());
        remote_path.extend(self.remote_path.iter().cloned());
        Self {
            api: self.api.clone(),
            name: self.name.clone(),
            remote_path,
        }
    }

    /// True if this name was surfaced through one or more remotes.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        !self.remote_path.is_empty()
    }

    /// The owning remote-client internal node name, if this is a remote
    /// resource (the outermost remote in the path).
    #[must_use]
    pub fn owning_remote(&self) -> Option<&str> {
        self.remote_path.first().map(String::as_str)
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for remote in &self.remote_path {
            write!(f, "{remote}:")?;
        }
        write!(f, "{}/{}", self.api, self.name)
    }
}
