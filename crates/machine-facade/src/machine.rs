//! `LocalMachine`: the single entry point client code talks to. Thin
//! wrapper over the reconfiguration engine and resource manager that adds
//! the read-mostly operations (status, export, discovery) and the
//! persisted-config cache.

use crate::error::FacadeError;
use crate::persist;
use machine_engine::{Config, ReconfigurationEngine};
use machine_graph::{export_as_dot, NodeStatus, Resource, ResourceName};
use machine_registry::Registry;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Cloud identity fields surfaced read-only to callers.
#[derive(Debug, Clone, Serialize)]
pub struct CloudMetadata {
    pub id: String,
    pub location_secret_present: bool,
}

/// Snapshot of the whole machine's health, for a status endpoint or CLI
/// command.
#[derive(Debug, Clone, Serialize)]
pub struct MachineStatus {
    pub initializing: bool,
    pub revision: String,
    pub resources: Vec<NodeStatus>,
}

pub struct LocalMachine {
    engine: Arc<ReconfigurationEngine>,
    registry: Arc<Registry>,
    cache_path: PathBuf,
}

impl LocalMachine {
    pub fn new(engine: Arc<ReconfigurationEngine>, registry: Arc<Registry>, cache_path: PathBuf) -> Self {
        Self {
            engine,
            registry,
            cache_path,
        }
    }

    /// Load the last persisted config (if any) and apply it, then start the
    /// background completion worker. Used for an offline/first-boot start
    /// when the cloud isn't reachable yet.
    pub async fn start_from_cache(&self) -> Result<(), FacadeError> {
        if let Some(cached) = persist::load(&self.cache_path)? {
            info!(revision = %cached.revision, "starting from cached configuration");
            self.engine.reconfigure(cached).await?;
        }
        self.engine.start_completion_worker();
        Ok(())
    }

    /// Apply `config`, then persist it to the cache on success.
    pub async fn reconfigure(&self, config: Config) -> Result<(), FacadeError> {
        self.engine.reconfigure(config.clone()).await?;
        if let Err(e) = persist::save(&self.cache_path, &config) {
            warn!(error = %e, "reconfigure applied but config cache write failed");
        }
        Ok(())
    }

    pub async fn resource_by_name(&self, name: &ResourceName) -> Result<Arc<dyn Resource>, FacadeError> {
        Ok(self.resources().resource_by_name(name).await?)
    }

    pub fn resource_names(&self) -> Vec<ResourceName> {
        self.resources().resource_names()
    }

    /// Resource names owned by a particular remote, unprefixed.
    pub fn remote_by_name(&self, remote: &str) -> Vec<ResourceName> {
        self.resource_names()
            .into_iter()
            .filter(|n| n.owning_remote() == Some(remote))
            .collect()
    }

    pub async fn stop_all(&self, extra: &Value) -> Vec<(ResourceName, String)> {
        self.engine.stop_all(extra).await
    }

    /// Close every resource and stop every supervised process, without
    /// applying a new config. Used for planned shutdown.
    pub async fn close(&self) -> Result<(), FacadeError> {
        self.engine.stop_completion_worker();
        Ok(self.resources().close().await?)
    }

    pub fn status(&self) -> MachineStatus {
        let revision = self.engine.current_config().map(|c| c.revision).unwrap_or_default();
        MachineStatus {
            initializing: self.engine.is_initializing(),
            revision,
            resources: self.resources().graph().status(),
        }
    }

    pub fn cloud_metadata(&self) -> Option<CloudMetadata> {
        self.engine.current_config().map(|c| CloudMetadata {
            id: c.cloud.id,
            location_secret_present: !c.cloud.location_secret.is_empty(),
        })
    }

    pub fn export_resources_as_dot(&self) -> String {
        export_as_dot(self.resources().graph())
    }

    pub fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Run every registered model's discovery probe (where present) and
    /// return the combined findings keyed by `(namespace:type:subtype,
    /// model)`. Entries without a `Discover` are silently skipped.
    pub async fn discover_components(&self, extra: &Value) -> Vec<(String, Value)> {
        let mut out = Vec::new();
        for key in self.registry.keys() {
            let Some(registration) = self.registry.lookup(&key.api, &key.model) else {
                continue;
            };
            let Some(discover) = &registration.discover else {
                continue;
            };
            match discover.discover(extra).await {
                Ok(value) => out.push((format!("{}/{}", key.api, key.model), value)),
                Err(e) => warn!(api = %key.api, model = %key.model, error = %e, "discovery probe failed"),
            }
        }
        out
    }

    fn resources(&self) -> &machine_resources::ResourceManager {
        self.engine.resources_handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use machine_engine::NoopPackageSyncer;
    use machine_graph::{Api, ApiType, ResourceConfig};
    use machine_modules::PluginModuleManager;
    use machine_process::ProcessSupervisor;
    use machine_registry::{Constructor, Dependencies, Registration, RegistryError};
    use machine_resources::ResourceManager;
    use std::any::Any;

    #[derive(Debug)]
    struct FakeBoard {
        name: ResourceName,
    }
    impl Resource for FakeBoard {
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
        async fn construct(&self, _deps: &Dependencies, cfg: &ResourceConfig) -> Result<Arc<dyn Resource>, RegistryError> {
            Ok(Arc::new(FakeBoard { name: cfg.name.clone() }))
        }
    }

    fn board_api() -> Api {
        Api::new("rdk", ApiType::Component, "board")
    }

    fn board_cfg(name: &str) -> ResourceConfig {
        ResourceConfig {
            name: ResourceName::new(board_api(), name),
            api: board_api(),
            model: "fake".into(),
            attributes: Value::Null,
            converted_attributes: Value::Null,
            depends_on: Vec::new(),
            implicit_depends_on: Vec::new(),
            frame: None,
            log_level: None,
        }
    }

    fn make_machine(cache_path: PathBuf) -> LocalMachine {
        let registry = Arc::new(Registry::new());
        registry
            .register(board_api(), "fake", Registration::new(Arc::new(FakeConstructor)))
            .unwrap();
        let modules = Arc::new(PluginModuleManager::new());
        let processes = Arc::new(ProcessSupervisor::new());
        let resources = Arc::new(ResourceManager::new(
            Arc::new(machine_graph::ResourceGraph::new()),
            registry.clone(),
            processes.clone(),
            modules.clone(),
        ));
        let engine = ReconfigurationEngine::new(
            resources,
            modules,
            processes,
            Arc::new(NoopPackageSyncer::default()),
            None,
        );
        LocalMachine::new(engine, registry, cache_path)
    }

    #[tokio::test]
    async fn reconfigure_updates_status_and_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("cache.yaml");
        let machine = make_machine(cache_path.clone());

        let config = Config {
            components: vec![board_cfg("board1")],
            revision: "rev-1".into(),
            initial: true,
            cloud: machine_engine::CloudConfig {
                id: "machine-1".into(),
                secret: "shh".into(),
                location_secret: "loc".into(),
            },
            ..Default::default()
        };
        machine.reconfigure(config).await.unwrap();

        let status = machine.status();
        assert_eq!(status.revision, "rev-1");
        assert_eq!(status.resources.len(), 1);
        assert!(!status.initializing);

        let cloud = machine.cloud_metadata().unwrap();
        assert_eq!(cloud.id, "machine-1");
        assert!(cloud.location_secret_present);

        assert!(cache_path.exists());
    }

    #[tokio::test]
    async fn resource_by_name_finds_configured_resource() {
        let dir = tempfile::tempdir().unwrap();
        let machine = make_machine(dir.path().join("cache.yaml"));
        let config = Config {
            components: vec![board_cfg("board1")],
            initial: true,
            ..Default::default()
        };
        machine.reconfigure(config).await.unwrap();

        let name = ResourceName::new(board_api(), "board1");
        assert!(machine.resource_by_name(&name).await.is_ok());
        assert_eq!(machine.resource_names(), vec![name]);
    }

    #[tokio::test]
    async fn export_resources_as_dot_contains_resource_name() {
        let dir = tempfile::tempdir().unwrap();
        let machine = make_machine(dir.path().join("cache.yaml"));
        let config = Config {
            components: vec![board_cfg("board1")],
            initial: true,
            ..Default::default()
        };
        machine.reconfigure(config).await.unwrap();

        let dot = machine.export_resources_as_dot();
        assert!(dot.contains("board1"));
    }

    #[tokio::test]
    async fn status_before_any_reconfigure_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let machine = make_machine(dir.path().join("cache.yaml"));
        let status = machine.status();
        assert!(status.resources.is_empty());
        assert!(status.revision.is_empty());
        assert!(machine.cloud_metadata().is_none());
    }
}
