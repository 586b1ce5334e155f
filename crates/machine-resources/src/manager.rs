//! The Resource Manager: owns the graph, registry, process supervisor,
//! module manager, and remote-client set under one reconfiguration lock.

use crate::error::ResourceError;
use futures::FutureExt;
use machine_graph::{
    Api, ConfigDiff, GraphNode, NodeState, Resource, ResourceConfig, ResourceGraph, ResourceName,
};
use machine_modules::ModuleManager;
use machine_process::ProcessManager;
use machine_registry::{Dependencies, Registry};
use machine_remote::{ConnectionState, RemoteClient};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Duration;
use tracing::{error, warn};

fn remote_owner_name(remote: &str) -> ResourceName {
    ResourceName::new(Api::internal("rdk", "remote"), remote)
}

/// Owns one [`ResourceGraph`], one [`Registry`], one process supervisor,
/// one module manager, and the set of remote clients.
///
/// `reconfiguration_lock` is exposed for the reconfiguration engine and
/// completion worker to hold across an entire pass — individual read
/// operations here (`resource_by_name`, `resource_names`) are lock-free
/// against the graph's own internal lock and don't need it.
pub struct ResourceManager {
    graph: Arc<ResourceGraph>,
    registry: Arc<Registry>,
    processes: Arc<dyn ProcessManager>,
    modules: Arc<dyn ModuleManager>,
    remotes: RwLock<HashMap<String, Arc<RemoteClient>>>,
    reconfiguration_lock: AsyncMutex<()>,
    resource_timeout: Duration,
}

impl ResourceManager {
    pub fn new(
        graph: Arc<ResourceGraph>,
        registry: Arc<Registry>,
        processes: Arc<dyn ProcessManager>,
        modules: Arc<dyn ModuleManager>,
    ) -> Self {
        Self {
            graph,
            registry,
            processes,
            modules,
            remotes: RwLock::new(HashMap::new()),
            reconfiguration_lock: AsyncMutex::new(()),
            resource_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_resource_timeout(mut self, timeout: Duration) -> Self {
        self.resource_timeout = timeout;
        self
    }

    pub fn graph(&self) -> &Arc<ResourceGraph> {
        &self.graph
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Hold for the duration of one `Reconfigure` pass or one completion
    /// worker tick; serializes the two against each other.
    pub async fn reconfiguration_lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.reconfiguration_lock.lock().await
    }

    pub fn add_remote(&self, client: Arc<RemoteClient>) {
        self.remotes.write().insert(client.name().to_string(), client);
    }

    pub fn remove_remote(&self, name: &str) -> Option<Arc<RemoteClient>> {
        let client = self.remotes.write().remove(name);
        if let Some(c) = &client {
            c.close();
        }
        client
    }

    /// Returns the resource only if its node is `Configured` with no
    /// recorded error; otherwise `NotReady` or `NotFound`.
    pub async fn resource_by_name(&self, name: &ResourceName) -> Result<Arc<dyn Resource>, ResourceError> {
        if let Some(owner) = name.owning_remote() {
            let client = self
                .remotes
                .read()
                .get(owner)
                .cloned()
                .ok_or_else(|| ResourceError::NotFound(name.clone()))?;
            return client.resource_by_name(name).await.map_err(Into::into);
        }

        let node = self
            .graph
            .node(name)
            .ok_or_else(|| ResourceError::NotFound(name.clone()))?;
        match node.state() {
            NodeState::Configured => match node.resource() {
                Some(r) => Ok(r.clone()),
                None => Err(ResourceError::NotReady {
                    name: name.clone(),
                    reason: "configured but no resource handle".into(),
                }),
            },
            NodeState::Removed => Err(ResourceError::NotFound(name.clone())),
            other => Err(ResourceError::NotReady {
                name: name.clone(),
                reason: node
                    .last_error()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{other:?}")),
            }),
        }
    }

    /// Union of local graph names and every remote's cached (prefixed)
    /// names — remote resources are represented as graph nodes once
    /// discovered, so this is just the graph's name list.
    pub fn resource_names(&self) -> Vec<ResourceName> {
        self.graph.names()
    }

    /// Apply `Added` resources as fresh `Configuring` nodes and `Modified`
    /// resources as re-staged `Configuring` nodes, so both are picked up by
    /// the next `complete_config` pass.
    pub fn update_resources(&self, diff: &ConfigDiff) -> Result<(), ResourceError> {
        let clock = self.graph.logical_clock();
        for cfg in &diff.added {
            let name = cfg.name.clone();
            self.graph.add_node(GraphNode::new(cfg.clone(), clock))?;
            self.graph
                .with_node_mut(&name, |n| n.set_state(NodeState::Configuring, clock));
        }
        for cfg in &diff.modified {
            self.graph
                .with_node_mut(&cfg.name, |n| n.restage(cfg.clone(), clock));
        }
        Ok(())
    }

    /// Transitively mark `diff.removed` (and all dependents), returning the
    /// full set in child-first close order.
    pub fn mark_removed(&self, diff: &ConfigDiff) -> Vec<ResourceName> {
        self.graph.mark_removed(&diff.removed)
    }

    /// Close one resource; idempotent against nodes already removed.
    pub async fn close_resource(&self, name: &ResourceName) -> Result<(), ResourceError> {
        let Some(node) = self.graph.node(name) else {
            return Ok(());
        };
        if node.state() == NodeState::Removed {
            return Ok(());
        }
        if let Some(resource) = node.resource() {
            if let Err(e) = resource.close() {
                warn!(resource = %name, error = %e, "error closing resource, continuing sweep");
            }
        }
        self.graph
            .with_node_mut(name, |n| n.set_state(NodeState::Removed, 0));
        Ok(())
    }

    /// Child-first close sweep over a set already produced by
    /// `mark_removed` (or `Close`'s full-graph mark).
    pub async fn remove_marked_and_close(&self, ordered_names: &[ResourceName]) -> Result<(), ResourceError> {
        for name in ordered_names {
            self.close_resource(name).await?;
            let _ = self.modules.remove_resource(name).await;
            self.graph.remove_node(name);
        }
        Ok(())
    }

    /// Drive one completion pass: resolve dependency names, then attempt
    /// construction for every `Configuring` node whose parents are all
    /// `Configured`.
    pub async fn complete_config(&self) -> Vec<(ResourceName, ResourceError)> {
        let _ = self.graph.resolve_dependencies();

        let mut failures = Vec::new();
        let pending: Vec<ResourceName> = self
            .graph
            .status()
            .into_iter()
            .filter(|s| s.state == NodeState::Configuring)
            .map(|s| s.name)
            .collect();

        for name in pending {
            if let Err(e) = self.complete_one(&name).await {
                failures.push((name, e));
            }
        }
        failures
    }

    async fn complete_one(&self, name: &ResourceName) -> Result<(), ResourceError> {
        let Some(node) = self.graph.node(name) else {
            return Ok(());
        };
        if !node.unresolved_dependencies().is_empty() {
            return Err(ResourceError::DependencyNotReady(name.clone()));
        }

        let mut deps = Dependencies::new();
        for parent_name in self.graph.get_all_parents_of(name) {
            let parent = self
                .graph
                .node(&parent_name)
                .ok_or_else(|| ResourceError::DependencyNotResolved(parent_name.clone()))?;
            match (parent.state(), parent.resource()) {
                (NodeState::Configured, Some(r)) => deps.insert(parent_name, r.clone()),
                _ => return Err(ResourceError::DependencyNotReady(parent_name)),
            }
        }

        let cfg = node.config().clone();

        if self.modules.provides(&cfg) {
            return self.complete_via_module(name, &cfg, &deps).await;
        }

        let Some(registration) = self.registry.lookup(&cfg.api, &cfg.model) else {
            let err = ResourceError::UnknownModel {
                api: cfg.api.clone(),
                model: cfg.model.clone(),
            };
            self.graph.with_node_mut(name, |n| n.set_unhealthy(err.to_string(), 0));
            return Err(err);
        };

        let configured_count = self
            .graph
            .status()
            .into_iter()
            .filter(|s| s.state == NodeState::Configured && s.name.api == cfg.api)
            .count();
        self.registry
            .check_instance_cap(&cfg.api, &cfg.model, configured_count)?;

        let build = AssertUnwindSafe(registration.constructor.construct(&deps, &cfg)).catch_unwind();
        let result = tokio::time::timeout(self.resource_timeout, build).await;

        match result {
            Err(_) => {
                let err = ResourceError::ResourceConfigureTimeout(name.clone());
                self.graph.with_node_mut(name, |n| n.set_unhealthy(err.to_string(), 0));
                Err(err)
            }
            Ok(Err(_panic)) => {
                let err = ResourceError::PanicDuringConstruction(name.clone());
                self.graph.with_node_mut(name, |n| n.set_unhealthy(err.to_string(), 0));
                Err(err)
            }
            Ok(Ok(Err(e))) => {
                self.graph.with_node_mut(name, |n| n.set_unhealthy(e.to_string(), 0));
                Err(e.into())
            }
            Ok(Ok(Ok(resource))) => {
                let clock = self.graph.logical_clock();
                self.graph.with_node_mut(name, |n| n.set_resource(resource, clock));
                Ok(())
            }
        }
    }

    async fn complete_via_module(
        &self,
        name: &ResourceName,
        cfg: &ResourceConfig,
        deps: &Dependencies,
    ) -> Result<(), ResourceError> {
        match self.modules.add_resource(cfg, deps).await {
            Ok(resource) => {
                let clock = self.graph.logical_clock();
                self.graph.with_node_mut(name, |n| n.set_resource(resource, clock));
                Ok(())
            }
            Err(e) => {
                self.graph.with_node_mut(name, |n| n.set_unhealthy(e.to_string(), 0));
                Err(e.into())
            }
        }
    }

    /// Poll every remote client's cached resource list; add graph nodes for
    /// newly visible names (owned by that remote's internal node) and mark
    /// now-missing ones for removal. Returns whether anything changed.
    pub fn update_remotes_resource_names(&self) -> bool {
        let mut changed = false;
        let remotes: Vec<Arc<RemoteClient>> = self.remotes.read().values().cloned().collect();
        for client in remotes {
            let live: Vec<ResourceName> = client.resource_names();
            let owner = remote_owner_name(client.name());
            let existing: Vec<ResourceName> = self
                .graph
                .names()
                .into_iter()
                .filter(|n| n.owning_remote() == Some(client.name()))
                .collect();

            for name in &live {
                if !existing.contains(name) {
                    let clock = self.graph.logical_clock();
                    if self
                        .graph
                        .add_node(GraphNode::new_remote(name.clone(), owner.clone(), clock))
                        .is_ok()
                    {
                        changed = true;
                    }
                }
            }
            for name in &existing {
                if !live.contains(name) {
                    self.graph.mark_removed(std::slice::from_ref(name));
                    changed = true;
                }
            }
        }
        changed
    }

    /// Marks the entire graph for removal, sweeps it child-first, closes
    /// every remote client, then stops the process supervisor.
    pub async fn close(&self) -> Result<(), ResourceError> {
        let names = self.graph.names();
        let order = self.graph.mark_removed(&names);
        self.remove_marked_and_close(&order).await?;

        for client in self.remotes.write().drain().map(|(_, c)| c) {
            client.close();
        }
        self.processes.stop_all().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use machine_graph::ApiType;
    use machine_modules::PluginModuleManager;
    use machine_process::ProcessSupervisor;
    use machine_registry::{Constructor, Registration, RegistryError};
    use std::any::Any;

    #[derive(Debug)]
    struct FakeMotor {
        name: ResourceName,
    }
    impl Resource for FakeMotor {
        fn resource_name(&self) -> &ResourceName {
            &self.name
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct FakeConstructor;
    #[async_trait]
    impl Constructor for FakeConstructor {
        async fn construct(
            &self,
            _deps: &Dependencies,
            cfg: &ResourceConfig,
        ) -> Result<Arc<dyn Resource>, RegistryError> {
            Ok(Arc::new(FakeMotor {
                name: cfg.name.clone(),
            }))
        }
    }

    fn motor_api() -> Api {
        Api::new("rdk", ApiType::Component, "motor")
    }

    fn board_api() -> Api {
        Api::new("rdk", ApiType::Component, "board")
    }

    fn cfg(api: Api, name: &str, deps: Vec<ResourceName>) -> ResourceConfig {
        ResourceConfig {
            name: ResourceName::new(api.clone(), name),
            api,
            model: "fake".into(),
            attributes: serde_json::Value::Null,
            converted_attributes: serde_json::Value::Null,
            depends_on: deps,
            implicit_depends_on: vec![],
            frame: None,
            log_level: None,
        }
    }

    fn make_manager() -> ResourceManager {
        let registry = Arc::new(Registry::new());
        registry
            .register(motor_api(), "fake", Registration::new(Arc::new(FakeConstructor)))
            .unwrap();
        registry
            .register(board_api(), "fake", Registration::new(Arc::new(FakeConstructor)))
            .unwrap();
        ResourceManager::new(
            Arc::new(ResourceGraph::new()),
            registry,
            Arc::new(ProcessSupervisor::new()),
            Arc::new(PluginModuleManager::new()),
        )
    }

    #[tokio::test]
    async fn add_then_construct_then_lookup() {
        let mgr = make_manager();
        let diff = ConfigDiff {
            added: vec![cfg(motor_api(), "m1", vec![])],
            ..Default::default()
        };
        mgr.update_resources(&diff).unwrap();
        let failures = mgr.complete_config().await;
        assert!(failures.is_empty(), "{failures:?}");

        let resource = mgr
            .resource_by_name(&ResourceName::new(motor_api(), "m1"))
            .await
            .unwrap();
        assert_eq!(resource.resource_name().name, "m1");
    }

    #[tokio::test]
    async fn dependency_built_before_dependent() {
        let mgr = make_manager();
        let board_name = ResourceName::new(board_api(), "board1");
        let arm_name = ResourceName::new(motor_api(), "arm1");
        let diff = ConfigDiff {
            added: vec![
                cfg(board_api(), "board1", vec![]),
                cfg(motor_api(), "arm1", vec![board_name.clone()]),
            ],
            ..Default::default()
        };
        mgr.update_resources(&diff).unwrap();

        // Dependency order means board1 is always constructible before
        // arm1; at most one more pass is needed to drain any deferred node.
        mgr.complete_config().await;
        mgr.complete_config().await;
        assert!(mgr.resource_by_name(&board_name).await.is_ok());
        assert!(mgr.resource_by_name(&arm_name).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_model_marks_unhealthy() {
        let mgr = make_manager();
        let unknown_api = Api::new("rdk", ApiType::Component, "camera");
        let diff = ConfigDiff {
            added: vec![cfg(unknown_api.clone(), "c1", vec![])],
            ..Default::default()
        };
        mgr.update_resources(&diff).unwrap();
        let failures = mgr.complete_config().await;
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0].1, ResourceError::UnknownModel { .. }));
    }

    #[tokio::test]
    async fn instance_cap_is_scoped_per_api() {
        let registry = Arc::new(Registry::new());
        registry
            .register(
                motor_api(),
                "fake",
                Registration::new(Arc::new(FakeConstructor)).with_max_instance(1),
            )
            .unwrap();
        registry
            .register(board_api(), "fake", Registration::new(Arc::new(FakeConstructor)))
            .unwrap();
        let mgr = ResourceManager::new(
            Arc::new(ResourceGraph::new()),
            registry,
            Arc::new(ProcessSupervisor::new()),
            Arc::new(PluginModuleManager::new()),
        );

        // Configure an unrelated board resource first; it must not count
        // against the motor API's instance cap.
        mgr.update_resources(&ConfigDiff {
            added: vec![cfg(board_api(), "board1", vec![])],
            ..Default::default()
        })
        .unwrap();
        assert!(mgr.complete_config().await.is_empty());

        mgr.update_resources(&ConfigDiff {
            added: vec![cfg(motor_api(), "m1", vec![])],
            ..Default::default()
        })
        .unwrap();
        let failures = mgr.complete_config().await;
        assert!(failures.is_empty(), "{failures:?}");
        assert!(mgr.resource_by_name(&ResourceName::new(motor_api(), "m1")).await.is_ok());
    }

    #[tokio::test]
    async fn not_found_after_close() {
        let mgr = make_manager();
        let name = ResourceName::new(motor_api(), "m1");
        let diff = ConfigDiff {
            added: vec![cfg(motor_api(), "m1", vec![])],
            ..Default::default()
        };
        mgr.update_resources(&diff).unwrap();
        mgr.complete_config().await;
        assert!(mgr.resource_by_name(&name).await.is_ok());

        mgr.close().await.unwrap();
        assert!(matches!(
            mgr.resource_by_name(&name).await,
            Err(ResourceError::NotFound(_))
        ));
    }
}
