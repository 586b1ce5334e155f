//! The `ProcessManager` capability the resource manager consumes.

use crate::config::ProcessConfig;
use crate::error::ProcessError;
use async_trait::async_trait;

/// Process-supervision contract. Implemented by [`crate::ProcessSupervisor`]
/// (real) and [`crate::NoopProcessSupervisor`] (untrusted mode).
#[async_trait]
pub trait ProcessManager: Send + Sync {
    /// Register `cfg` under `id`; spawn immediately if `start` is true.
    async fn add_process(&self, id: &str, cfg: ProcessConfig, start: bool) -> Result<(), ProcessError>;

    /// Stop then forget a registered process.
    async fn remove_process(&self, id: &str) -> Result<(), ProcessError>;

    /// Start every registered process not yet running.
    async fn start(&self) -> Result<(), ProcessError>;

    /// Stop one process; its respawn loop (if any) exits without restarting.
    async fn stop(&self, id: &str) -> Result<(), ProcessError>;

    /// Stop every registered process.
    async fn stop_all(&self) -> Result<(), ProcessError>;

    /// Send the process's kill signal immediately, bypassing graceful stop.
    async fn kill(&self, id: &str) -> Result<(), ProcessError>;

    /// Kill every registered process.
    async fn kill_group(&self) -> Result<(), ProcessError>;

    /// Opaque ids of every registered process.
    fn process_ids(&self) -> Vec<String>;
}
