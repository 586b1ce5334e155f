//! Graphviz export of the resource graph, for `ExportResourcesAsDot`.

use crate::graph::ResourceGraph;
use crate::node::NodeState;
use std::fmt::Write as _;

fn color_for(state: NodeState) -> &'static str {
    match state {
        NodeState::Uninitialized => "lightgray",
        NodeState::Configuring => "lightyellow",
        NodeState::Configured => "palegreen",
        NodeState::Unhealthy => "lightcoral",
        NodeState::MarkedForRemoval => "orange",
        NodeState::Removing => "orange",
        NodeState::Removed => "gray",
    }
}

/// Render the graph as a Graphviz `digraph`, one node per resource colored
/// by state, one edge per `child -> parent` dependency.
pub fn export_as_dot(graph: &ResourceGraph) -> String {
    let mut out = String::new();
    out.push_str("digraph machine {\n");
    out.push_str("  rankdir=LR;\n");

    for status in graph.status() {
        let _ = writeln!(
            out,
            "  \"{}\" [style=filled, fillcolor={}];",
            status.name,
            color_for(status.state)
        );
    }
    for (child, parent) in graph.edges() {
        let _ = writeln!(out, "  \"{child}\" -> \"{parent}\";");
    }
    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResourceConfig;
    use crate::name::{Api, ApiType};
    use crate::node::GraphNode;

    #[test]
    fn renders_nodes_and_edges() {
        let g = ResourceGraph::new();
        let api = Api::new("rdk", ApiType::Component, "motor");
        let name1 = crate::name::ResourceName::new(api.clone(), "arm1");
        let name2 = crate::name::ResourceName::new(api.clone(), "board1");
        g.add_node(GraphNode::new(
            ResourceConfig {
                name: name1.clone(),
                api: api.clone(),
                model: "fake".into(),
                attributes: serde_json::Value::Null,
                converted_attributes: serde_json::Value::Null,
                depends_on: vec![],
                implicit_depends_on: vec![],
                frame: None,
                log_level: None,
            },
            0,
        ))
        .unwrap();
        g.add_node(GraphNode::new(
            ResourceConfig {
                name: name2.clone(),
                api,
                model: "fake".into(),
                attributes: serde_json::Value::Null,
                converted_attributes: serde_json::Value::Null,
                depends_on: vec![],
                implicit_depends_on: vec![],
                frame: None,
                log_level: None,
            },
            0,
        ))
        .unwrap();
        g.add_child(&name1, &name2).unwrap();

        let dot = export_as_dot(&g);
        assert!(dot.starts_with("digraph machine {"));
        assert!(dot.contains("arm1"));
        assert!(dot.contains("board1"));
        assert!(dot.contains("->"));
    }
}
