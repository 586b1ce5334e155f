//! Shared test fixtures for the machine-runtime workspace.
//!
//! An `EchoResource`/`EchoConstructor` pair that builds a resource
//! reflecting whatever config it was given, plus recording fakes for
//! `ProcessManager` and `ModuleManager` so engine-level tests can assert on
//! what was called without spinning up real processes or plug-ins.

#![allow(missing_docs)]

use async_trait::async_trait;
use machine_engine::Config;
use machine_graph::{Api, ApiType, Resource, ResourceConfig, ResourceName};
use machine_modules::{HandlerMap, ModuleConfig, ModuleError, ModuleManager};
use machine_process::{ProcessConfig, ProcessError, ProcessManager};
use machine_registry::{Constructor, Dependencies, RegistryError};
use parking_lot::Mutex;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// A resource that does nothing but remember its own config and the names
/// of the dependencies it was wired with.
#[derive(Debug)]
pub struct EchoResource {
    name: ResourceName,
    pub config: ResourceConfig,
    pub dependency_names: Vec<ResourceName>,
}

impl Resource for EchoResource {
    fn resource_name(&self) -> &ResourceName {
        &self.name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Constructs an [`EchoResource`] for any config, never failing. The default
/// stand-in constructor for registry-level and engine-level tests.
#[derive(Debug, Default)]
pub struct EchoConstructor;

#[async_trait]
impl Constructor for EchoConstructor {
    async fn construct(
        &self,
        deps: &Dependencies,
        cfg: &ResourceConfig,
    ) -> Result<Arc<dyn Resource>, RegistryError> {
        Ok(Arc::new(EchoResource {
            name: cfg.name.clone(),
            config: cfg.clone(),
            dependency_names: deps.names().cloned().collect(),
        }))
    }
}

/// Shorthand for a `component` API under the `rdk` namespace, the one most
/// fixtures need.
pub fn component_api(subtype: &str) -> Api {
    Api::new("rdk", ApiType::Component, subtype)
}

/// Builds a [`ResourceConfig`] with an empty attribute map and no frame or
/// log-level override, the shape most graph/engine tests start from.
pub fn resource_config(api: Api, name: &str, depends_on: Vec<ResourceName>) -> ResourceConfig {
    ResourceConfig {
        name: ResourceName::new(api.clone(), name),
        api,
        model: "fake".into(),
        attributes: Value::Null,
        converted_attributes: Value::Null,
        depends_on,
        implicit_depends_on: Vec::new(),
        frame: None,
        log_level: None,
    }
}

/// An initial [`Config`] carrying just `components`, the shape most
/// engine-level reconfigure tests start from.
pub fn initial_config(components: Vec<ResourceConfig>) -> Config {
    Config {
        components,
        initial: true,
        revision: "test-rev".into(),
        ..Default::default()
    }
}

/// A call recorded against [`RecordingProcessManager`] or
/// [`RecordingModuleManager`], for assertions on call order and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    AddProcess(String),
    RemoveProcess(String),
    StartAll,
    Stop(String),
    StopAll,
    Kill(String),
    KillGroup,
    AddModule(String),
    ReconfigureModule(String),
    RemoveModule(String),
    FirstRun(String),
}

/// A [`ProcessManager`] that records every call instead of spawning
/// anything, for asserting what the reconfiguration engine asked it to do.
#[derive(Default)]
pub struct RecordingProcessManager {
    calls: Mutex<Vec<RecordedCall>>,
    ids: Mutex<Vec<String>>,
}

impl RecordingProcessManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ProcessManager for RecordingProcessManager {
    async fn add_process(&self, id: &str, _cfg: ProcessConfig, _start: bool) -> Result<(), ProcessError> {
        self.ids.lock().push(id.to_string());
        self.calls.lock().push(RecordedCall::AddProcess(id.to_string()));
        Ok(())
    }

    async fn remove_process(&self, id: &str) -> Result<(), ProcessError> {
        self.ids.lock().retain(|existing| existing != id);
        self.calls.lock().push(RecordedCall::RemoveProcess(id.to_string()));
        Ok(())
    }

    async fn start(&self) -> Result<(), ProcessError> {
        self.calls.lock().push(RecordedCall::StartAll);
        Ok(())
    }

    async fn stop(&self, id: &str) -> Result<(), ProcessError> {
        self.calls.lock().push(RecordedCall::Stop(id.to_string()));
        Ok(())
    }

    async fn stop_all(&self) -> Result<(), ProcessError> {
        self.calls.lock().push(RecordedCall::StopAll);
        Ok(())
    }

    async fn kill(&self, id: &str) -> Result<(), ProcessError> {
        self.calls.lock().push(RecordedCall::Kill(id.to_string()));
        Ok(())
    }

    async fn kill_group(&self) -> Result<(), ProcessError> {
        self.calls.lock().push(RecordedCall::KillGroup);
        Ok(())
    }

    fn process_ids(&self) -> Vec<String> {
        self.ids.lock().clone()
    }
}

/// A [`ModuleManager`] that records every call and claims nothing by
/// default, so `add_resource`/`reconfigure_resource` should never be hit in
/// a test built on top of it.
#[derive(Default)]
pub struct RecordingModuleManager {
    calls: Mutex<Vec<RecordedCall>>,
}

impl RecordingModuleManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ModuleManager for RecordingModuleManager {
    async fn add(&self, cfg: ModuleConfig) -> Result<(), ModuleError> {
        self.calls.lock().push(RecordedCall::AddModule(cfg.name));
        Ok(())
    }

    async fn reconfigure(&self, cfg: ModuleConfig) -> Result<(), ModuleError> {
        self.calls.lock().push(RecordedCall::ReconfigureModule(cfg.name));
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<(), ModuleError> {
        self.calls.lock().push(RecordedCall::RemoveModule(name.to_string()));
        Ok(())
    }

    async fn first_run(&self, cfg: &ModuleConfig) -> Result<(), ModuleError> {
        self.calls.lock().push(RecordedCall::FirstRun(cfg.name.clone()));
        Ok(())
    }

    fn provides(&self, _cfg: &ResourceConfig) -> bool {
        false
    }

    async fn add_resource(
        &self,
        cfg: &ResourceConfig,
        _deps: &Dependencies,
    ) -> Result<Arc<dyn Resource>, ModuleError> {
        Err(ModuleError::ResourceNotFound(cfg.name.clone()))
    }

    async fn reconfigure_resource(&self, cfg: &ResourceConfig, _deps: &Dependencies) -> Result<(), ModuleError> {
        Err(ModuleError::ResourceNotFound(cfg.name.clone()))
    }

    async fn remove_resource(&self, name: &ResourceName) -> Result<(), ModuleError> {
        Err(ModuleError::ResourceNotFound(name.clone()))
    }

    async fn validate_config(&self, _cfg: &ResourceConfig) -> Result<Vec<ResourceName>, ModuleError> {
        Ok(Vec::new())
    }

    fn handles(&self) -> HashMap<String, HandlerMap> {
        HashMap::new()
    }

    fn clean_module_data_directory(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_constructor_reflects_config_and_deps() {
        let api = component_api("motor");
        let cfg = resource_config(api, "m1", Vec::new());
        let mut deps = Dependencies::new();
        let board_name = ResourceName::new(component_api("board"), "b1");
        deps.insert(
            board_name.clone(),
            Arc::new(EchoResource {
                name: board_name.clone(),
                config: resource_config(component_api("board"), "b1", Vec::new()),
                dependency_names: Vec::new(),
            }),
        );

        let resource = EchoConstructor.construct(&deps, &cfg).await.unwrap();
        let echo = resource.as_any().downcast_ref::<EchoResource>().unwrap();
        assert_eq!(echo.config.name, cfg.name);
        assert_eq!(echo.dependency_names, vec![board_name]);
    }

    #[tokio::test]
    async fn recording_process_manager_tracks_ids_and_calls() {
        let manager = RecordingProcessManager::new();
        let cfg = ProcessConfig {
            id: "p1".into(),
            executable_path: "/bin/true".into(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
            one_shot: true,
            respawn_delay_secs: 1,
        };
        manager.add_process("p1", cfg, true).await.unwrap();
        manager.stop_all().await.unwrap();
        assert_eq!(manager.process_ids(), vec!["p1".to_string()]);
        assert_eq!(
            manager.calls(),
            vec![RecordedCall::AddProcess("p1".into()), RecordedCall::StopAll]
        );
    }

    #[tokio::test]
    async fn recording_module_manager_claims_nothing() {
        let manager = RecordingModuleManager::new();
        let cfg = resource_config(component_api("motor"), "m1", Vec::new());
        assert!(!manager.provides(&cfg));
        manager
            .add(ModuleConfig {
                name: "mod1".into(),
                exe_path: "/bin/true".into(),
                args: Vec::new(),
                env: HashMap::new(),
                log_level: None,
                claims: Vec::new(),
                initial: true,
            })
            .await
            .unwrap();
        assert_eq!(manager.calls(), vec![RecordedCall::AddModule("mod1".into())]);
    }
}
