//! Resource graph core: named nodes, dependency edges, lifecycle state, and
//! config diffing.
//!
//! This crate owns no construction or process-supervision logic — it is the
//! data structure the reconfiguration engine and resource manager mutate.

mod config;
mod dot;
mod error;
mod graph;
mod name;
mod node;
mod resource;

pub use config::{diff, ConfigDiff, ResourceConfig};
pub use dot::export_as_dot;
pub use error::GraphError;
pub use graph::{graphs_equal, ResourceGraph};
pub use name::{Api, ApiType, ResourceName};
pub use node::{GraphNode, NodeState, NodeStatus};
pub use resource::Resource;

/// Re-exports for call sites that want everything with one `use`.
pub mod prelude {
    pub use crate::{
        diff, export_as_dot, graphs_equal, Api, ApiType, ConfigDiff, GraphError, GraphNode,
        NodeState, NodeStatus, Resource, ResourceConfig, ResourceGraph, ResourceName,
    };
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
