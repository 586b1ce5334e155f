//! Module Manager: supervises plug-in worker processes and routes resource
//! construction/removal to whichever plug-in claims a resource's
//! `(API, Model)`.

mod config;
mod error;
mod manager;
mod registry;

pub use config::{HandlerMap, ModuleConfig};
pub use error::ModuleError;
pub use manager::ModuleManager;
pub use registry::{OrphanCallback, PluginModuleManager};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
