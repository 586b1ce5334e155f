//! Weak-dependency rewiring: resources can subscribe to a predicate over
//! every other configured resource instead of a declared graph edge, and
//! get re-notified whenever the matched set changes.

use machine_graph::{NodeState, ResourceGraph, ResourceName};
use machine_registry::Registry;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::warn;

/// Recompute every registration's weak-dependency match set against the
/// currently configured resources and push updates to any resource whose
/// peer set changed. Best-effort: a panicking `update_weak_peers` is caught
/// and logged rather than aborting the pass.
pub fn update_weak_dependents(graph: &ResourceGraph, registry: &Registry) {
    let configured: Vec<Arc<dyn machine_graph::Resource>> = graph
        .status()
        .into_iter()
        .filter(|s| s.state == NodeState::Configured)
        .filter_map(|s| graph.node(&s.name).and_then(|n| n.resource().cloned()))
        .collect();

    for name in graph.names() {
        let Some(node) = graph.node(&name) else { continue };
        if node.state() != NodeState::Configured {
            continue;
        }
        let Some(resource) = node.resource().cloned() else { continue };
        let Some(registration) = registry.lookup(&node.config().api, &node.config().model) else {
            continue;
        };
        if registration.weak_dependencies.is_empty() {
            continue;
        }

        let peers: Vec<Arc<dyn machine_graph::Resource>> = configured
            .iter()
            .filter(|peer| peer.resource_name() != &name)
            .filter(|peer| registration.weak_dependencies.iter().any(|m| m.matches(peer.as_ref())))
            .cloned()
            .collect();

        if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(|| resource.update_weak_peers(&peers))) {
            warn!(resource = %name, ?panic, "panic while delivering weak-dependency peers, skipping");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use machine_graph::{Api, ApiType, GraphNode, Resource, ResourceConfig};
    use machine_registry::{Constructor, Dependencies, Registration, RegistryError, WeakMatcher};
    use std::any::Any;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct Sensor {
        name: ResourceName,
    }
    impl Resource for Sensor {
        fn resource_name(&self) -> &ResourceName {
            &self.name
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Debug)]
    struct Aggregator {
        name: ResourceName,
        seen: Mutex<Vec<ResourceName>>,
    }
    impl Resource for Aggregator {
        fn resource_name(&self) -> &ResourceName {
            &self.name
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn update_weak_peers(&self, peers: &[Arc<dyn Resource>]) {
            *self.seen.lock().unwrap() = peers.iter().map(|p| p.resource_name().clone()).collect();
        }
    }

    struct FakeConstructor;
    #[async_trait]
    impl Constructor for FakeConstructor {
        async fn construct(&self, _d: &Dependencies, cfg: &ResourceConfig) -> Result<Arc<dyn Resource>, RegistryError> {
            Ok(Arc::new(Sensor { name: cfg.name.clone() }))
        }
    }

    fn sensor_api() -> Api {
        Api::new("rdk", ApiType::Component, "sensor")
    }
    fn agg_api() -> Api {
        Api::new("rdk", ApiType::Component, "aggregator")
    }

    fn cfg(api: Api, name: &str) -> ResourceConfig {
        ResourceConfig {
            name: ResourceName::new(api.clone(), name),
            api,
            model: "fake".into(),
            attributes: serde_json::Value::Null,
            converted_attributes: serde_json::Value::Null,
            depends_on: vec![],
            implicit_depends_on: vec![],
            frame: None,
            log_level: None,
        }
    }

    #[test]
    fn delivers_matching_peers_and_skips_self() {
        let graph = ResourceGraph::new();
        let registry = Registry::new();
        registry
            .register(sensor_api(), "fake", Registration::new(Arc::new(FakeConstructor)))
            .unwrap();
        registry
            .register(
                agg_api(),
                "fake",
                Registration::new(Arc::new(FakeConstructor))
                    .with_weak_dependencies(vec![WeakMatcher::new(|r| r.resource_name().api.subtype == "sensor")]),
            )
            .unwrap();

        let sensor_name = ResourceName::new(sensor_api(), "s1");
        let agg_name = ResourceName::new(agg_api(), "agg1");

        graph.add_node(GraphNode::new(cfg(sensor_api(), "s1"), 0)).unwrap();
        graph.with_node_mut(&sensor_name, |n| {
            n.set_resource(Arc::new(Sensor { name: sensor_name.clone() }), 0)
        });

        let agg = Arc::new(Aggregator {
            name: agg_name.clone(),
            seen: Mutex::new(Vec::new()),
        });
        graph.add_node(GraphNode::new(cfg(agg_api(), "agg1"), 0)).unwrap();
        graph.with_node_mut(&agg_name, |n| n.set_resource(agg.clone() as Arc<dyn Resource>, 0));

        update_weak_dependents(&graph, &registry);

        assert_eq!(agg.seen.lock().unwrap().as_slice(), &[sensor_name]);
    }
}
