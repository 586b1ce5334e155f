//! Process Supervisor: owns OS child processes declared in machine
//! configuration, with start/stop/kill and crash-respawn.

mod config;
mod error;
mod manager;
mod supervisor;

pub use config::ProcessConfig;
pub use error::ProcessError;
pub use manager::ProcessManager;
pub use supervisor::{NoopProcessSupervisor, ProcessSupervisor};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
