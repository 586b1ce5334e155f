//! Concrete module manager: supervises one OS process per plug-in and
//! routes resource construction to a per-`(API, Model)` constructor
//! installed on that plug-in's behalf.

use crate::config::{HandlerMap, ModuleConfig};
use crate::error::ModuleError;
use crate::manager::ModuleManager;
use async_trait::async_trait;
use dashmap::DashMap;
use futures::FutureExt;
use machine_graph::{Api, Resource, ResourceConfig, ResourceName};
use machine_registry::{Constructor, Dependencies};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::{Child, Command};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, warn};

/// Invoked with the names of resources that were hosted by a module whose
/// process just died unexpectedly.
pub type OrphanCallback = Arc<dyn Fn(Vec<ResourceName>) + Send + Sync>;

struct ModuleHandle {
    config: ModuleConfig,
    child: AsyncMutex<Option<Child>>,
    /// Constructors registered on this module's behalf for each `(API,
    /// Model)` it claims. In the real system these arrive over the module
    /// RPC handshake; since that transport is out of scope here, callers
    /// install them directly (a test double does the same).
    constructors: DashMap<(Api, String), Arc<dyn Constructor>>,
    resources: DashMap<ResourceName, Arc<dyn Resource>>,
}

/// Supervises plug-in processes and routes resource construction/removal
/// to whichever module claims a resource's `(API, Model)`.
pub struct PluginModuleManager {
    modules: DashMap<String, Arc<ModuleHandle>>,
    orphan_callback: Arc<AsyncMutex<Option<OrphanCallback>>>,
}

impl Default for PluginModuleManager {
    fn default() -> Self {
        Self {
            modules: DashMap::new(),
            orphan_callback: Arc::new(AsyncMutex::new(None)),
        }
    }
}

impl PluginModuleManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the callback invoked when a module's process exits
    /// unexpectedly, naming the resources it was hosting.
    pub async fn set_orphan_callback(&self, callback: OrphanCallback) {
        *self.orphan_callback.lock().await = Some(callback);
    }

    /// Install a constructor for `(api, model)` on an already-added module,
    /// standing in for the real RPC handshake.
    pub fn install_constructor(
        &self,
        module_name: &str,
        api: Api,
        model: impl Into<String>,
        constructor: Arc<dyn Constructor>,
    ) -> Result<(), ModuleError> {
        let handle = self
            .modules
            .get(module_name)
            .ok_or_else(|| ModuleError::NotFound(module_name.to_string()))?;
        handle.constructors.insert((api, model.into()), constructor);
        Ok(())
    }

    fn find_module_for(&self, api: &Api, model: &str) -> Option<Arc<ModuleHandle>> {
        self.modules
            .iter()
            .find(|e| e.value().constructors.contains_key(&(api.clone(), model.to_string())))
            .map(|e| e.value().clone())
    }

    async fn watchdog(handle: Arc<ModuleHandle>, name: String, callback_slot: Arc<AsyncMutex<Option<OrphanCallback>>>) {
        let status = {
            let mut guard = handle.child.lock().await;
            match guard.as_mut() {
                Some(child) => child.wait().await.ok(),
                None => return,
            }
        };
        if let Some(status) = status {
            warn!(module = %name, ?status, "module process exited unexpectedly");
            let orphaned: Vec<ResourceName> = handle.resources.iter().map(|e| e.key().clone()).collect();
            handle.resources.clear();
            if let Some(cb) = callback_slot.lock().await.as_ref() {
                cb(orphaned);
            }
        }
    }
}

#[async_trait]
impl ModuleManager for PluginModuleManager {
    async fn add(&self, cfg: ModuleConfig) -> Result<(), ModuleError> {
        if self.modules.contains_key(&cfg.name) {
            return Err(ModuleError::AlreadyExists(cfg.name));
        }
        let child = Command::new(&cfg.exe_path)
            .args(&cfg.args)
            .envs(&cfg.env)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .ok();

        let handle = Arc::new(ModuleHandle {
            config: cfg.clone(),
            child: AsyncMutex::new(child),
            constructors: DashMap::new(),
            resources: DashMap::new(),
        });
        self.modules.insert(cfg.name.clone(), handle.clone());
        tokio::spawn(Self::watchdog(handle, cfg.name, self.orphan_callback.clone()));
        Ok(())
    }

    async fn reconfigure(&self, cfg: ModuleConfig) -> Result<(), ModuleError> {
        self.remove(&cfg.name).await.ok();
        self.add(cfg).await
    }

    async fn remove(&self, name: &str) -> Result<(), ModuleError> {
        if let Some((_, handle)) = self.modules.remove(name) {
            if let Some(mut child) = handle.child.lock().await.take() {
                let _ = child.start_kill();
            }
        }
        Ok(())
    }

    async fn first_run(&self, cfg: &ModuleConfig) -> Result<(), ModuleError> {
        if !self.modules.contains_key(&cfg.name) {
            return Err(ModuleError::NotFound(cfg.name.clone()));
        }
        Ok(())
    }

    fn provides(&self, cfg: &ResourceConfig) -> bool {
        self.find_module_for(&cfg.api, &cfg.model).is_some()
    }

    async fn add_resource(
        &self,
        cfg: &ResourceConfig,
        deps: &Dependencies,
    ) -> Result<Arc<dyn Resource>, ModuleError> {
        let handle = self
            .find_module_for(&cfg.api, &cfg.model)
            .ok_or_else(|| ModuleError::NotClaimed {
                api: cfg.api.clone(),
                model: cfg.model.clone(),
            })?;
        let constructor = handle
            .constructors
            .get(&(cfg.api.clone(), cfg.model.clone()))
            .unwrap()
            .clone();

        let result = AssertUnwindSafe(constructor.construct(deps, cfg)).catch_unwind().await;
        let resource = match result {
            Ok(Ok(resource)) => resource,
            Ok(Err(e)) => {
                error!(resource = %cfg.name, error = %e, "module constructor failed");
                return Err(ModuleError::ValidationFailed(e.to_string()));
            }
            Err(_) => {
                return Err(ModuleError::PanicDuringConstruction { name: cfg.name.clone() });
            }
        };
        handle.resources.insert(cfg.name.clone(), resource.clone());
        Ok(resource)
    }

    async fn reconfigure_resource(
        &self,
        cfg: &ResourceConfig,
        deps: &Dependencies,
    ) -> Result<(), ModuleError> {
        self.add_resource(cfg, deps).await.map(|_| ())
    }

    async fn remove_resource(&self, name: &ResourceName) -> Result<(), ModuleError> {
        for entry in self.modules.iter() {
            if entry.value().resources.remove(name).is_some() {
                return Ok(());
            }
        }
        Err(ModuleError::ResourceNotFound(name.clone()))
    }

    async fn validate_config(&self, cfg: &ResourceConfig) -> Result<Vec<ResourceName>, ModuleError> {
        if !self.provides(cfg) {
            return Err(ModuleError::NotClaimed {
                api: cfg.api.clone(),
                model: cfg.model.clone(),
            });
        }
        Ok(cfg.implicit_depends_on.clone())
    }

    fn handles(&self) -> HashMap<String, HandlerMap> {
        self.modules
            .iter()
            .map(|e| {
                let mut map: HandlerMap = HashMap::new();
                for kv in e.value().constructors.iter() {
                    let (api, model) = kv.key().clone();
                    map.entry(api).or_default().push(model);
                }
                (e.key().clone(), map)
            })
            .collect()
    }

    fn clean_module_data_directory(&self) {
        // Scratch directories are an on-disk concern of the real module
        // launcher; with process spawning the only supervised state here,
        // there is nothing left to clean once a module is removed.
    }
}
