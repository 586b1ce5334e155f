//! The local machine façade: the one object client code (CLI, web
//! handlers, SDKs) talks to. Wraps the reconfiguration engine and resource
//! manager with status, export, discovery, and config-cache concerns.

mod error;
mod machine;
mod persist;

pub use error::FacadeError;
pub use machine::{CloudMetadata, LocalMachine, MachineStatus};
pub use persist::default_cache_path;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
