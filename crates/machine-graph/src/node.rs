//! Graph node: lifecycle state, applied config, and constructed handle.

use crate::config::ResourceConfig;
use crate::name::ResourceName;
use crate::resource::Resource;
use serde::Serialize;
use std::sync::Arc;

/// Lifecycle state of a graph node.
///
/// A `Configured` node always has a non-nil resource handle and an empty
/// `unresolved_dependencies` list; every other state implies at least one
/// of those is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeState {
    /// Registered but construction has not started.
    Uninitialized,
    /// Construction in progress or pending (dependencies not all satisfied).
    Configuring,
    /// Built, wired, and healthy.
    Configured,
    /// Build failed or a dependency became unavailable; retried next pass.
    Unhealthy,
    /// Marked by a mark-and-sweep pass; not yet closed.
    MarkedForRemoval,
    /// Close in progress.
    Removing,
    /// Closed and no longer part of the graph's live surface.
    Removed,
}

impl NodeState {
    /// A node in this state has a non-nil resource handle and empty
    /// `unresolved_dependencies`.
    #[must_use]
    pub fn is_configured(self) -> bool {
        matches!(self, NodeState::Configured)
    }

    #[must_use]
    pub fn is_terminal_removal(self) -> bool {
        matches!(self, NodeState::Removed)
    }
}

/// One node in the resource graph.
#[derive(Clone)]
pub struct GraphNode {
    name: ResourceName,
    state: NodeState,
    config: ResourceConfig,
    resource: Option<Arc<dyn Resource>>,
    unresolved_dependencies: Vec<ResourceName>,
    updated_at: i64,
    last_error: Option<String>,
    /// Owning remote-client node name, for resources surfaced via remote
    /// inclusion. Every remote resource has a corresponding remote-client
    /// internal node that owns its lifetime.
    owner_remote: Option<ResourceName>,
}

impl std::fmt::Debug for GraphNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphNode")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("unresolved_dependencies", &self.unresolved_dependencies)
            .field("updated_at", &self.updated_at)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

impl GraphNode {
    /// Construct a fresh, `Uninitialized` node for `config`.
    pub fn new(config: ResourceConfig, logical_clock: i64) -> Self {
        Self {
            name: config.name.clone(),
            state: NodeState::Uninitialized,
            config,
            resource: None,
            unresolved_dependencies: Vec::new(),
            updated_at: logical_clock,
            last_error: None,
            owner_remote: None,
        }
    }

    /// Construct a node owned by a remote client, surfaced without a local
    /// config of its own yet.
    pub fn new_remote(name: ResourceName, owner_remote: ResourceName, logical_clock: i64) -> Self {
        Self {
            name: name.clone(),
            state: NodeState::Uninitialized,
            config: ResourceConfig {
                name,
                api: owner_remote.api.clone(),
                model: String::new(),
                attributes: serde_json::Value::Null,
                converted_attributes: serde_json::Value::Null,
                depends_on: Vec::new(),
                implicit_depends_on: Vec::new(),
                frame: None,
                log_level: None,
            },
            resource: None,
            unresolved_dependencies: Vec::new(),
            updated_at: logical_clock,
            last_error: None,
            owner_remote: Some(owner_remote),
        }
    }

    pub fn name(&self) -> &ResourceName {
        &self.name
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }

    pub fn resource(&self) -> Option<&Arc<dyn Resource>> {
        self.resource.as_ref()
    }

    pub fn unresolved_dependencies(&self) -> &[ResourceName] {
        &self.unresolved_dependencies
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn updated_at(&self) -> i64 {
        self.updated_at
    }

    pub fn owner_remote(&self) -> Option<&ResourceName> {
        self.owner_remote.as_ref()
    }

    /// Re-stage this node to `Configuring` with a new config (used for
    /// `Modified` resources and for dependency re-resolution).
    pub fn restage(&mut self, config: ResourceConfig, logical_clock: i64) {
        self.config = config;
        self.state = NodeState::Configuring;
        self.unresolved_dependencies.clear();
        self.last_error = None;
        self.updated_at = logical_clock;
    }

    pub fn set_state(&mut self, state: NodeState, logical_clock: i64) {
        self.state = state;
        self.updated_at = logical_clock;
    }

    pub fn set_unresolved(&mut self, names: Vec<ResourceName>, logical_clock: i64) {
        self.unresolved_dependencies = names;
        self.updated_at = logical_clock;
    }

    pub fn set_resource(&mut self, resource: Arc<dyn Resource>, logical_clock: i64) {
        self.resource = Some(resource);
        self.state = NodeState::Configured;
        self.last_error = None;
        self.updated_at = logical_clock;
    }

    pub fn take_resource(&mut self) -> Option<Arc<dyn Resource>> {
        self.resource.take()
    }

    pub fn set_unhealthy(&mut self, error: impl Into<String>, logical_clock: i64) {
        self.state = NodeState::Unhealthy;
        self.last_error = Some(error.into());
        self.updated_at = logical_clock;
    }
}

/// Read-only snapshot of a node's status, for `ResourceGraph::status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeStatus {
    pub name: ResourceName,
    pub state: NodeState,
    pub updated_at: i64,
    pub last_error: Option<String>,
}

impl From<&GraphNode> for NodeStatus {
    fn from(n: &GraphNode) -> Self {
        Self {
            name: n.name.clone(),
            state: n.state,
            updated_at: n.updated_at,
            last_error: n.last_error.clone(),
        }
    }
}
