//! Real process supervisor: spawns `tokio::process::Child` processes and
//! respawns them on exit until explicitly stopped.

use crate::config::ProcessConfig;
use crate::error::ProcessError;
use crate::manager::ProcessManager;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::time::Duration;
use tracing::{info, warn};

struct ManagedProcess {
    config: ProcessConfig,
    running: Arc<Mutex<Option<Child>>>,
    stop_tx: watch::Sender<bool>,
    respawn_task: Option<tokio::task::JoinHandle<()>>,
}

async fn spawn_once(config: &ProcessConfig) -> Result<Child, ProcessError> {
    let mut cmd = Command::new(&config.executable_path);
    cmd.args(&config.args)
        .envs(&config.env)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    if let Some(cwd) = &config.cwd {
        cmd.current_dir(cwd);
    }
    cmd.spawn().map_err(|e| ProcessError::SpawnFailed {
        id: config.id.clone(),
        cause: e.to_string(),
    })
}

fn spawn_respawn_loop(
    id: String,
    config: ProcessConfig,
    running: Arc<Mutex<Option<Child>>>,
    mut stop_rx: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if *stop_rx.borrow() {
                return;
            }
            let child = match spawn_once(&config).await {
                Ok(c) => c,
                Err(e) => {
                    warn!(process = %id, error = %e, "failed to spawn process, backing off");
                    tokio::time::sleep(Duration::from_secs(config.respawn_delay_secs.max(1))).await;
                    continue;
                }
            };
            *running.lock() = Some(child);

            loop {
                let exited = {
                    let mut guard = running.lock();
                    match guard.as_mut() {
                        Some(c) => c.try_wait().ok().flatten().is_some(),
                        None => true,
                    }
                };
                if exited {
                    break;
                }
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(200)) => {}
                    changed = stop_rx.changed() => {
                        if changed.is_ok() && *stop_rx.borrow() {
                            if let Some(mut c) = running.lock().take() {
                                let _ = c.start_kill();
                            }
                            return;
                        }
                    }
                }
            }
            *running.lock() = None;

            if config.one_shot || *stop_rx.borrow() {
                return;
            }
            info!(process = %id, "process exited, respawning");
            tokio::time::sleep(Duration::from_secs(config.respawn_delay_secs)).await;
        }
    })
}

/// Supervises OS child processes declared by the current machine
/// configuration.
#[derive(Default)]
pub struct ProcessSupervisor {
    processes: DashMap<String, ManagedProcess>,
}

impl ProcessSupervisor {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProcessManager for ProcessSupervisor {
    async fn add_process(&self, id: &str, cfg: ProcessConfig, start: bool) -> Result<(), ProcessError> {
        if self.processes.contains_key(id) {
            return Err(ProcessError::AlreadyExists(id.to_string()));
        }
        let running = Arc::new(Mutex::new(None));
        let (stop_tx, stop_rx) = watch::channel(false);
        let respawn_task = if start {
            Some(spawn_respawn_loop(id.to_string(), cfg.clone(), running.clone(), stop_rx))
        } else {
            None
        };
        self.processes.insert(
            id.to_string(),
            ManagedProcess {
                config: cfg,
                running,
                stop_tx,
                respawn_task,
            },
        );
        Ok(())
    }

    async fn remove_process(&self, id: &str) -> Result<(), ProcessError> {
        self.stop(id).await?;
        self.processes.remove(id);
        Ok(())
    }

    async fn start(&self) -> Result<(), ProcessError> {
        let ids: Vec<String> = self
            .processes
            .iter()
            .filter(|e| e.value().respawn_task.is_none())
            .map(|e| e.key().clone())
            .collect();
        for id in ids {
            if let Some(mut entry) = self.processes.get_mut(&id) {
                let (stop_tx, stop_rx) = watch::channel(false);
                entry.stop_tx = stop_tx;
                entry.respawn_task = Some(spawn_respawn_loop(
                    id.clone(),
                    entry.config.clone(),
                    entry.running.clone(),
                    stop_rx,
                ));
            }
        }
        Ok(())
    }

    async fn stop(&self, id: &str) -> Result<(), ProcessError> {
        let mut entry = self
            .processes
            .get_mut(id)
            .ok_or_else(|| ProcessError::NotFound(id.to_string()))?;
        let _ = entry.stop_tx.send(true);
        if let Some(task) = entry.respawn_task.take() {
            let _ = task.await;
        }
        Ok(())
    }

    async fn stop_all(&self) -> Result<(), ProcessError> {
        let ids = self.process_ids();
        for id in ids {
            let _ = self.stop(&id).await;
        }
        Ok(())
    }

    async fn kill(&self, id: &str) -> Result<(), ProcessError> {
        let entry = self
            .processes
            .get(id)
            .ok_or_else(|| ProcessError::NotFound(id.to_string()))?;
        let _ = entry.stop_tx.send(true);
        if let Some(mut c) = entry.running.lock().take() {
            let _ = c.start_kill();
        }
        Ok(())
    }

    async fn kill_group(&self) -> Result<(), ProcessError> {
        let ids = self.process_ids();
        for id in ids {
            let _ = self.kill(&id).await;
        }
        Ok(())
    }

    fn process_ids(&self) -> Vec<String> {
        self.processes.iter().map(|e| e.key().clone()).collect()
    }
}

/// No-op supervisor for `UntrustedEnv`. Any attempt to add or start a
/// process fails with `ProcessesDisabled`; querying existing ids or
/// stopping is harmless and always succeeds.
#[derive(Default)]
pub struct NoopProcessSupervisor;

#[async_trait]
impl ProcessManager for NoopProcessSupervisor {
    async fn add_process(&self, _id: &str, _cfg: ProcessConfig, _start: bool) -> Result<(), ProcessError> {
        Err(ProcessError::ProcessesDisabled)
    }

    async fn remove_process(&self, _id: &str) -> Result<(), ProcessError> {
        Ok(())
    }

    async fn start(&self) -> Result<(), ProcessError> {
        Ok(())
    }

    async fn stop(&self, _id: &str) -> Result<(), ProcessError> {
        Ok(())
    }

    async fn stop_all(&self) -> Result<(), ProcessError> {
        Ok(())
    }

    async fn kill(&self, _id: &str) -> Result<(), ProcessError> {
        Ok(())
    }

    async fn kill_group(&self) -> Result<(), ProcessError> {
        Ok(())
    }

    fn process_ids(&self) -> Vec<String> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_process_rejects_duplicate_id() {
        let sup = ProcessSupervisor::new();
        let cfg = ProcessConfig {
            id: "p1".into(),
            executable_path: "/bin/true".into(),
            args: vec![],
            env: Default::default(),
            cwd: None,
            one_shot: true,
            respawn_delay_secs: 1,
        };
        sup.add_process("p1", cfg.clone(), false).await.unwrap();
        assert!(matches!(
            sup.add_process("p1", cfg, false).await,
            Err(ProcessError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn noop_supervisor_rejects_process_addition() {
        let sup = NoopProcessSupervisor;
        let cfg = ProcessConfig {
            id: "p1".into(),
            executable_path: "/bin/true".into(),
            args: vec![],
            env: Default::default(),
            cwd: None,
            one_shot: true,
            respawn_delay_secs: 1,
        };
        assert!(matches!(
            sup.add_process("p1", cfg, true).await,
            Err(ProcessError::ProcessesDisabled)
        ));
        assert!(sup.process_ids().is_empty());
    }

    #[tokio::test]
    async fn one_shot_process_runs_to_completion() {
        let sup = ProcessSupervisor::new();
        let cfg = ProcessConfig {
            id: "p1".into(),
            executable_path: "/bin/true".into(),
            args: vec![],
            env: Default::default(),
            cwd: None,
            one_shot: true,
            respawn_delay_secs: 1,
        };
        sup.add_process("p1", cfg, true).await.unwrap();
        assert_eq!(sup.process_ids(), vec!["p1".to_string()]);
        sup.stop("p1").await.unwrap();
    }
}
