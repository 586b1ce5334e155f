//! The reconfiguration engine: diffs a new [`Config`] against the one
//! currently applied and drives the machine through the fixed transition
//! sequence, then keeps nudging deferred resources forward in the
//! background.

use crate::config::Config;
use crate::error::EngineError;
use crate::operations::OperationManager;
use crate::package::PackageSyncer;
use crate::sensor::MaintenanceSensor;
use crate::weak::update_weak_dependents;
use machine_graph::{diff, NodeState, ResourceName};
use machine_modules::ModuleManager;
use machine_process::{ProcessConfig, ProcessManager};
use machine_resources::ResourceManager;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio::time::Duration;
use tracing::{error, info, warn};

/// Partition of process ids between an old and a new config, by id.
struct ProcessDiff {
    added: Vec<ProcessConfig>,
    modified: Vec<ProcessConfig>,
    removed: Vec<String>,
}

fn diff_processes(old: &[ProcessConfig], new: &[ProcessConfig]) -> ProcessDiff {
    let old_by_id: std::collections::HashMap<&str, &ProcessConfig> =
        old.iter().map(|p| (p.id.as_str(), p)).collect();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = ProcessDiff {
        added: Vec::new(),
        modified: Vec::new(),
        removed: Vec::new(),
    };
    for p in new {
        seen.insert(p.id.as_str());
        match old_by_id.get(p.id.as_str()) {
            None => out.added.push(p.clone()),
            Some(old_p) if *old_p != p => out.modified.push(p.clone()),
            Some(_) => {}
        }
    }
    for p in old {
        if !seen.contains(p.id.as_str()) {
            out.removed.push(p.id.clone());
        }
    }
    out
}

/// `(subtype, model, name)` for every well-known internal service a machine
/// needs whether or not the authored config mentions it. Limited to the two
/// default services `spec.md` names by example (framesystem, data capture);
/// see DESIGN.md for the scope decision.
const DEFAULT_SERVICES: &[(&str, &str, &str)] = &[
    ("framesystem", "builtin", "framesystem"),
    ("data_manager", "builtin", "data_manager"),
];

/// Ensures the well-known internal services every machine needs are present
/// even when the authored config omits them, mirroring the source's
/// default-service injection step. A user-authored entry under the same API
/// always wins over the synthesized default.
fn with_default_services(mut resources: Vec<machine_graph::ResourceConfig>) -> Vec<machine_graph::ResourceConfig> {
    use machine_graph::{Api, ApiType, ResourceConfig};
    for (subtype, model, name) in DEFAULT_SERVICES {
        let api = Api::new("rdk", ApiType::Internal, *subtype);
        let has_override = resources.iter().any(|r| r.api == api);
        if !has_override {
            resources.push(ResourceConfig {
                name: ResourceName::new(api.clone(), name),
                api,
                model: (*model).into(),
                attributes: Value::Null,
                converted_attributes: Value::Null,
                depends_on: Vec::new(),
                implicit_depends_on: Vec::new(),
                frame: None,
                log_level: None,
            });
        }
    }
    resources
}

/// Owns the currently-applied [`Config`] and drives every subsequent
/// transition. One instance per running machine.
pub struct ReconfigurationEngine {
    resources: Arc<ResourceManager>,
    modules: Arc<dyn ModuleManager>,
    processes: Arc<dyn ProcessManager>,
    package_syncer: Arc<dyn PackageSyncer>,
    maintenance_sensor: Option<Arc<dyn MaintenanceSensor>>,
    operations: OperationManager,
    current_config: RwLock<Option<Config>>,
    initializing: AtomicBool,
    trigger_tx: mpsc::Sender<()>,
    trigger_rx: AsyncMutex<Option<mpsc::Receiver<()>>>,
    stop_tx: watch::Sender<bool>,
}

impl ReconfigurationEngine {
    pub fn new(
        resources: Arc<ResourceManager>,
        modules: Arc<dyn ModuleManager>,
        processes: Arc<dyn ProcessManager>,
        package_syncer: Arc<dyn PackageSyncer>,
        maintenance_sensor: Option<Arc<dyn MaintenanceSensor>>,
    ) -> Arc<Self> {
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let (stop_tx, _stop_rx) = watch::channel(false);
        Arc::new(Self {
            resources,
            modules,
            processes,
            package_syncer,
            maintenance_sensor,
            operations: OperationManager::new(),
            current_config: RwLock::new(None),
            initializing: AtomicBool::new(true),
            trigger_tx,
            trigger_rx: AsyncMutex::new(Some(trigger_rx)),
            stop_tx,
        })
    }

    pub fn operations(&self) -> &OperationManager {
        &self.operations
    }

    pub fn resources_handle(&self) -> &ResourceManager {
        &self.resources
    }

    pub fn is_initializing(&self) -> bool {
        self.initializing.load(Ordering::Acquire)
    }

    pub fn current_config(&self) -> Option<Config> {
        self.current_config.read().clone()
    }

    /// Spawn the background completion worker: ticks every 5 seconds, and
    /// whenever `nudge_completion` is called, to retry deferred resources
    /// and refresh remote resource lists without waiting for the next
    /// `Reconfigure`.
    pub fn start_completion_worker(self: &Arc<Self>) {
        let Some(mut trigger_rx) = self.trigger_rx.try_lock().ok().and_then(|mut g| g.take()) else {
            return;
        };
        let engine = self.clone();
        let mut stop_rx = self.stop_tx.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(5));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = trigger_rx.recv() => {}
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            return;
                        }
                        continue;
                    }
                }
                if *stop_rx.borrow() {
                    return;
                }
                engine.run_completion_tick().await;
            }
        });
    }

    pub fn stop_completion_worker(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Ask the background worker to run a pass now instead of waiting for
    /// its next tick. Best-effort: dropped silently if a pass is already
    /// queued.
    pub fn nudge_completion(&self) {
        let _ = self.trigger_tx.try_send(());
    }

    async fn run_completion_tick(&self) {
        let _guard = self.resources.reconfiguration_lock().await;
        let remotes_changed = self.resources.update_remotes_resource_names();
        let failures = self.resources.complete_config().await;
        for (name, err) in &failures {
            warn!(resource = %name, error = %err, "resource still not ready after completion pass");
        }
        if remotes_changed || !failures.is_empty() {
            update_weak_dependents(self.resources.graph(), self.resources.registry());
        }
    }

    /// Apply `new_config`, replacing whatever is currently running. Mirrors
    /// the fixed-sequence transition: admission gate, revision stamp,
    /// package sync, plug-in first-run, default-service injection, diff,
    /// mark & early-close, graph/process update, completion pass,
    /// weak-dependency rewiring, sweep, and scratch-directory cleanup.
    pub async fn reconfigure(&self, new_config: Config) -> Result<(), EngineError> {
        let _guard = self.resources.reconfiguration_lock().await;

        let previous = self.current_config.read().clone();

        // Phase 1: admission gate. A maintenance window blocks everything
        // except changes to the network/auth/cloud sections, which must
        // always be allowed through so connectivity can be restored.
        if let (Some(sensor), Some(prev), Some(maint_cfg)) =
            (&self.maintenance_sensor, &previous, &new_config.maintenance_config)
        {
            let allowed = self.maintenance_admits(sensor.as_ref(), maint_cfg).await;
            if !allowed && prev.network_equal(&new_config) {
                info!("reconfigure deferred: machine is in a maintenance window");
                return Ok(());
            }
        }

        // Phase 2: revision stamp. Recorded for observability; the engine
        // itself doesn't branch on it.
        info!(revision = %new_config.revision, "applying configuration");

        // Phase 3: package sync. Fatal — a machine can't run plug-ins or
        // processes it couldn't fetch.
        self.package_syncer
            .sync(&new_config.packages)
            .await
            .map_err(EngineError::PackageSyncFailed)?;

        // Phase 4: plug-in add / reconfigure / remove, each followed by a
        // blocking first-run for new or changed modules.
        let old_modules = previous.as_ref().map(|c| c.modules.clone()).unwrap_or_default();
        self.apply_module_diff(&old_modules, &new_config.modules).await?;

        // Phase 5: default-service injection.
        let old_resources = previous
            .as_ref()
            .map(|c| with_default_services(c.all_resources()))
            .unwrap_or_default();
        let new_resources = with_default_services(new_config.all_resources());

        // Phase 6: diff resources and processes.
        let network_equal = previous.as_ref().map_or(true, |p| p.network_equal(&new_config));
        let resource_diff = diff(&old_resources, &new_resources, network_equal);
        let old_processes = previous.as_ref().map(|c| c.processes.clone()).unwrap_or_default();
        let process_diff = diff_processes(&old_processes, &new_config.processes);

        // Phase 7: mark & early-close everything the diff removes (and its
        // dependents), before anything new is wired in.
        let removal_order = self.resources.mark_removed(&resource_diff);
        self.resources.remove_marked_and_close(&removal_order).await?;
        for id in &process_diff.removed {
            self.processes.remove_process(id).await?;
        }

        // Phase 8: update the graph with added/modified resources and
        // (re)start changed processes.
        self.resources.update_resources(&resource_diff)?;
        for p in process_diff.added.into_iter().chain(process_diff.modified) {
            let id = p.id.clone();
            let _ = self.processes.remove_process(&id).await;
            self.processes.add_process(&id, p, true).await?;
        }

        // Phase 9: attempt construction of everything now pending.
        let failures = self.resources.complete_config().await;
        for (name, err) in &failures {
            warn!(resource = %name, error = %err, "resource deferred after reconfigure, will retry");
        }

        // Phase 10: weak-dependency rewiring against the freshly configured
        // set.
        update_weak_dependents(self.resources.graph(), self.resources.registry());

        // Phase 11: sweep any nodes marked for removal as a side effect of
        // the passes above (e.g. a module removal orphaning its resources).
        let leftover: Vec<ResourceName> = self
            .resources
            .graph()
            .status()
            .into_iter()
            .filter(|s| s.state == NodeState::MarkedForRemoval)
            .map(|s| s.name)
            .collect();
        if !leftover.is_empty() {
            let order = self.resources.graph().mark_removed(&leftover);
            self.resources.remove_marked_and_close(&order).await?;
        }

        // Phase 12: scratch-directory cleanup, skipped for the very first
        // configuration a machine ever applies.
        if !new_config.initial {
            self.modules.clean_module_data_directory();
        }

        self.initializing.store(false, Ordering::Release);
        *self.current_config.write() = Some(new_config);
        Ok(())
    }

    async fn maintenance_admits(&self, sensor: &dyn MaintenanceSensor, cfg: &crate::config::MaintenanceConfig) -> bool {
        match sensor.readings(&Value::Null).await {
            Ok(readings) => readings
                .get(&cfg.maintenance_allowed_key)
                .and_then(Value::as_bool)
                .unwrap_or(true),
            Err(e) => {
                error!(error = %e, "maintenance sensor read failed, admitting reconfigure");
                true
            }
        }
    }

    async fn apply_module_diff(
        &self,
        old: &[machine_modules::ModuleConfig],
        new: &[machine_modules::ModuleConfig],
    ) -> Result<(), EngineError> {
        let old_by_name: std::collections::HashMap<&str, &machine_modules::ModuleConfig> =
            old.iter().map(|m| (m.name.as_str(), m)).collect();
        let mut seen: HashSet<&str> = HashSet::new();

        for m in new {
            seen.insert(m.name.as_str());
            match old_by_name.get(m.name.as_str()) {
                None => {
                    self.modules.add(m.clone()).await?;
                    self.first_run(m).await?;
                }
                Some(old_m) if *old_m != m => {
                    self.modules.reconfigure(m.clone()).await?;
                    self.first_run(m).await?;
                }
                Some(_) => {}
            }
        }
        for m in old {
            if !seen.contains(m.name.as_str()) {
                self.modules.remove(&m.name).await?;
            }
        }
        Ok(())
    }

    async fn first_run(&self, cfg: &machine_modules::ModuleConfig) -> Result<(), EngineError> {
        self.modules
            .first_run(cfg)
            .await
            .map_err(|e| EngineError::FirstRunFailed {
                module: cfg.name.clone(),
                cause: e.to_string(),
            })
    }

    /// Cancel every in-flight long-running operation, then ask every
    /// resource to stop whatever it's doing. Errors are accumulated, not
    /// allowed to abort the sweep.
    pub async fn stop_all(&self, extra: &Value) -> Vec<(ResourceName, String)> {
        self.operations.cancel_all();
        let mut errors = Vec::new();
        for name in self.resources.resource_names() {
            if let Ok(resource) = self.resources.resource_by_name(&name).await {
                if let Err(e) = resource.stop(extra) {
                    errors.push((name, e.to_string()));
                }
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use machine_graph::{Api, ApiType, Resource, ResourceConfig};
    use machine_modules::PluginModuleManager;
    use machine_process::ProcessSupervisor;
    use machine_registry::{Constructor, Dependencies, Registration, Registry, RegistryError};
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
        async fn construct(&self, _deps: &Dependencies, cfg: &ResourceConfig) -> Result<Arc<dyn Resource>, RegistryError> {
            Ok(Arc::new(FakeMotor { name: cfg.name.clone() }))
        }
    }

    fn board_api() -> Api {
        Api::new("rdk", ApiType::Component, "board")
    }
    fn arm_api() -> Api {
        Api::new("rdk", ApiType::Component, "arm")
    }

    fn resource_cfg(api: Api, name: &str, deps: Vec<ResourceName>) -> ResourceConfig {
        ResourceConfig {
            name: ResourceName::new(api.clone(), name),
            api,
            model: "fake".into(),
            attributes: Value::Null,
            converted_attributes: Value::Null,
            depends_on: deps,
            implicit_depends_on: Vec::new(),
            frame: None,
            log_level: None,
        }
    }

    fn make_engine() -> Arc<ReconfigurationEngine> {
        let registry = Arc::new(Registry::new());
        registry.register(board_api(), "fake", Registration::new(Arc::new(FakeConstructor))).unwrap();
        registry.register(arm_api(), "fake", Registration::new(Arc::new(FakeConstructor))).unwrap();
        let modules = Arc::new(PluginModuleManager::new());
        let processes = Arc::new(ProcessSupervisor::new());
        let resources = Arc::new(ResourceManager::new(
            Arc::new(machine_graph::ResourceGraph::new()),
            registry,
            processes.clone(),
            modules.clone(),
        ));
        ReconfigurationEngine::new(
            resources,
            modules,
            processes,
            Arc::new(crate::package::NoopPackageSyncer::default()),
            None,
        )
    }

    #[tokio::test]
    async fn reconfigure_builds_dependency_before_dependent() {
        let engine = make_engine();
        let board_name = ResourceName::new(board_api(), "board1");
        let arm_name = ResourceName::new(arm_api(), "arm1");
        let cfg = Config {
            components: vec![
                resource_cfg(board_api(), "board1", vec![]),
                resource_cfg(arm_api(), "arm1", vec![board_name.clone()]),
            ],
            initial: true,
            ..Default::default()
        };
        engine.reconfigure(cfg).await.unwrap();

        assert!(engine.resources.resource_by_name(&board_name).await.is_ok());
        assert!(engine.resources.resource_by_name(&arm_name).await.is_ok());
        assert!(!engine.is_initializing());
    }

    #[tokio::test]
    async fn reconfigure_removes_dropped_resources() {
        let engine = make_engine();
        let board_name = ResourceName::new(board_api(), "board1");
        let first = Config {
            components: vec![resource_cfg(board_api(), "board1", vec![])],
            initial: true,
            ..Default::default()
        };
        engine.reconfigure(first).await.unwrap();
        assert!(engine.resources.resource_by_name(&board_name).await.is_ok());

        let second = Config {
            components: vec![],
            initial: false,
            ..Default::default()
        };
        engine.reconfigure(second).await.unwrap();
        assert!(engine.resources.resource_by_name(&board_name).await.is_err());
    }
}

