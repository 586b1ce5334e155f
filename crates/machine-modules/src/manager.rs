//! The `ModuleManager` capability the resource manager consumes.

use crate::config::{HandlerMap, ModuleConfig};
use crate::error::ModuleError;
use async_trait::async_trait;
use machine_graph::{Resource, ResourceConfig, ResourceName};
use machine_registry::Dependencies;
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait]
pub trait ModuleManager: Send + Sync {
    async fn add(&self, cfg: ModuleConfig) -> Result<(), ModuleError>;
    async fn reconfigure(&self, cfg: ModuleConfig) -> Result<(), ModuleError>;
    async fn remove(&self, name: &str) -> Result<(), ModuleError>;

    /// Blocking setup step for a newly added or modified module;
    /// reconfiguration aborts if this fails.
    async fn first_run(&self, cfg: &ModuleConfig) -> Result<(), ModuleError>;

    /// Whether some added module claims `cfg`'s `(API, Model)`.
    fn provides(&self, cfg: &ResourceConfig) -> bool;

    async fn add_resource(
        &self,
        cfg: &ResourceConfig,
        deps: &Dependencies,
    ) -> Result<Arc<dyn Resource>, ModuleError>;

    async fn reconfigure_resource(
        &self,
        cfg: &ResourceConfig,
        deps: &Dependencies,
    ) -> Result<(), ModuleError>;

    async fn remove_resource(&self, name: &ResourceName) -> Result<(), ModuleError>;

    async fn validate_config(&self, cfg: &ResourceConfig) -> Result<Vec<ResourceName>, ModuleError>;

    /// `(API, Model)` lists claimed by each module, keyed by module name.
    fn handles(&self) -> HashMap<String, HandlerMap>;

    /// Remove scratch directories of modules no longer present. Skipped by
    /// callers when the just-applied config was `Initial`.
    fn clean_module_data_directory(&self);
}
