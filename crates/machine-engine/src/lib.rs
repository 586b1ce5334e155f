//! Reconfiguration engine: diffs a new machine configuration against the
//! one currently applied and drives the fixed-sequence transition between
//! them, then keeps nudging deferred resources forward in the background.

mod config;
mod engine;
mod error;
mod operations;
mod package;
mod sensor;
mod weak;

pub use config::{AuthConfig, CloudConfig, Config, MaintenanceConfig, NetworkConfig, PackageConfig};
pub use engine::ReconfigurationEngine;
pub use error::EngineError;
pub use operations::{CancelToken, OperationManager};
pub use package::{NoopPackageSyncer, PackageSyncer};
pub use sensor::MaintenanceSensor;
pub use weak::update_weak_dependents;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
