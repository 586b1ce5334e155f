//! Remote client: owns the connection-supervision task for one declared
//! remote and caches its visible resource names.

use crate::config::RemoteConfig;
use crate::error::RemoteError;
use crate::transport::RemoteTransport;
use machine_graph::{Resource, ResourceName};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Duration;
use tracing::{info, warn};

/// Connection state of a [`RemoteClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

/// One remote sub-machine's connection, resource cache, and supervision
/// task.
pub struct RemoteClient {
    config: RemoteConfig,
    transport: Arc<dyn RemoteTransport>,
    connected: AtomicBool,
    /// Unprefixed names as last reported by the remote; stays populated
    /// across a disconnect so `ResourceNames()` remains stable.
    names: RwLock<Vec<ResourceName>>,
    stop_tx: watch::Sender<bool>,
}

impl RemoteClient {
    /// Construct and start the connection-supervision task.
    pub fn start(config: RemoteConfig, transport: Arc<dyn RemoteTransport>) -> Arc<Self> {
        let (stop_tx, stop_rx) = watch::channel(false);
        let client = Arc::new(Self {
            config,
            transport,
            connected: AtomicBool::new(false),
            names: RwLock::new(Vec::new()),
            stop_tx,
        });
        tokio::spawn(Self::supervise(client.clone(), stop_rx));
        client
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn state(&self) -> ConnectionState {
        if self.connected.load(Ordering::Acquire) {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Names as last refreshed, prefixed with this remote's name.
    pub fn resource_names(&self) -> Vec<ResourceName> {
        self.names
            .read()
            .iter()
            .map(|n| n.prefixed_with(&self.config.name))
            .collect()
    }

    /// Fetch a proxy for `name` (already prefixed). Fails fast with
    /// `RemoteUnavailable` while disconnected rather than blocking.
    pub async fn resource_by_name(&self, name: &ResourceName) -> Result<Arc<dyn Resource>, RemoteError> {
        if self.state() == ConnectionState::Disconnected {
            return Err(RemoteError::RemoteUnavailable(self.config.name.clone()));
        }
        let mut unprefixed = name.clone();
        unprefixed.remote_path.clear();
        self.transport.resource_proxy(&unprefixed).await
    }

    /// Stop the supervision task. Does not affect already-handed-out
    /// resource proxies.
    pub fn close(&self) {
        let _ = self.stop_tx.send(true);
    }

    async fn supervise(client: Arc<Self>, mut stop_rx: watch::Receiver<bool>) {
        loop {
            if *stop_rx.borrow() {
                return;
            }
            if client.state() == ConnectionState::Disconnected {
                match client.transport.connect().await {
                    Ok(()) => {
                        info!(remote = %client.config.name, "connected");
                        client.connected.store(true, Ordering::Release);
                    }
                    Err(e) => {
                        warn!(remote = %client.config.name, error = %e, "reconnect failed");
                        if Self::wait_or_stop(&mut stop_rx, client.config.reconnect_interval_secs).await {
                            return;
                        }
                        continue;
                    }
                }
            }

            match client.transport.list_resources().await {
                Ok(names) => {
                    *client.names.write() = names;
                }
                Err(e) => {
                    warn!(remote = %client.config.name, error = %e, "lost connection");
                    client.connected.store(false, Ordering::Release);
                }
            }

            if Self::wait_or_stop(&mut stop_rx, client.config.refresh_interval_secs).await {
                return;
            }
        }
    }

    /// Sleeps for `secs`, returning early (with `true`) if stop was
    /// signalled during the wait.
    async fn wait_or_stop(stop_rx: &mut watch::Receiver<bool>, secs: u64) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(secs.max(1))) => false,
            changed = stop_rx.changed() => changed.is_err() || *stop_rx.borrow(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use machine_graph::{Api, ApiType};
    use std::any::Any;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

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

    struct FakeTransport {
        fail_connect: AtomicUsize,
        names: Mutex<Vec<ResourceName>>,
    }

    #[async_trait]
    impl RemoteTransport for FakeTransport {
        async fn connect(&self) -> Result<(), RemoteError> {
            if self.fail_connect.load(Ordering::SeqCst) > 0 {
                self.fail_connect.fetch_sub(1, Ordering::SeqCst);
                return Err(RemoteError::Transport {
                    remote: "r".into(),
                    cause: "refused".into(),
                });
            }
            Ok(())
        }
        async fn list_resources(&self) -> Result<Vec<ResourceName>, RemoteError> {
            Ok(self.names.lock().unwrap().clone())
        }
        async fn resource_proxy(&self, name: &ResourceName) -> Result<Arc<dyn Resource>, RemoteError> {
            Ok(Arc::new(FakeMotor { name: name.clone() }))
        }
    }

    fn motor_name(n: &str) -> ResourceName {
        ResourceName::new(Api::new("rdk", ApiType::Component, "motor"), n)
    }

    #[tokio::test]
    async fn resource_names_are_prefixed_with_remote() {
        let transport = Arc::new(FakeTransport {
            fail_connect: AtomicUsize::new(0),
            names: Mutex::new(vec![motor_name("m")]),
        });
        let client = RemoteClient::start(
            RemoteConfig {
                name: "r".into(),
                address: "x".into(),
                insecure: true,
                reconnect_interval_secs: 60,
                refresh_interval_secs: 60,
            },
            transport,
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        let names = client.resource_names();
        assert_eq!(names.len(), 1);
        assert!(names[0].is_remote());
        assert_eq!(names[0].owning_remote(), Some("r"));
        client.close();
    }

    #[tokio::test]
    async fn resource_by_name_fails_fast_while_disconnected() {
        let transport = Arc::new(FakeTransport {
            fail_connect: AtomicUsize::new(1000),
            names: Mutex::new(vec![]),
        });
        let client = RemoteClient::start(
            RemoteConfig {
                name: "r".into(),
                address: "x".into(),
                insecure: true,
                reconnect_interval_secs: 60,
                refresh_interval_secs: 60,
            },
            transport,
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(client.state(), ConnectionState::Disconnected);
        let err = client.resource_by_name(&motor_name("m").prefixed_with("r")).await;
        assert!(matches!(err, Err(RemoteError::RemoteUnavailable(_))));
        client.close();
    }
}
