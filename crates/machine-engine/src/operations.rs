//! Operation Manager: tracks in-flight long-running resource operations so
//! `StopAll` can cancel every one of them.

use dashmap::DashMap;
use tokio_util_cancel::CancelToken;
use uuid::Uuid;

/// Lightweight cancellation token, avoiding a dependency on a dedicated
/// cancellation crate: a shared flag plus a notify for waiters.
mod tokio_util_cancel {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::Notify;

    #[derive(Clone, Default)]
    pub struct CancelToken(Arc<Inner>);

    #[derive(Default)]
    struct Inner {
        cancelled: AtomicBool,
        notify: Notify,
    }

    impl CancelToken {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn cancel(&self) {
            self.0.cancelled.store(true, Ordering::SeqCst);
            self.0.notify.notify_waiters();
        }

        pub fn is_cancelled(&self) -> bool {
            self.0.cancelled.load(Ordering::SeqCst)
        }

        pub async fn cancelled(&self) {
            if self.is_cancelled() {
                return;
            }
            self.0.notify.notified().await;
        }
    }
}

pub use tokio_util_cancel::CancelToken;

/// One in-flight long-running operation.
pub struct OperationHandle {
    pub id: Uuid,
    pub resource: machine_graph::ResourceName,
    token: CancelToken,
}

impl OperationHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }
}

/// Tracks every in-flight long-running operation by id.
#[derive(Default)]
pub struct OperationManager {
    operations: DashMap<Uuid, OperationHandle>,
}

impl OperationManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new operation against `resource`, returning its id and a
    /// token the caller should poll/select on for cancellation.
    pub fn begin(&self, resource: machine_graph::ResourceName) -> (Uuid, CancelToken) {
        let id = Uuid::new_v4();
        let token = CancelToken::new();
        self.operations.insert(
            id,
            OperationHandle {
                id,
                resource,
                token: token.clone(),
            },
        );
        (id, token)
    }

    pub fn end(&self, id: Uuid) {
        self.operations.remove(&id);
    }

    /// Cancel every in-flight operation. Does not itself call resource
    /// `Stop` — the caller (`stop_all` on the facade) does that separately
    /// for every resource implementing the capability.
    pub fn cancel_all(&self) {
        for entry in self.operations.iter() {
            entry.value().cancel();
        }
    }

    pub fn in_flight(&self) -> Vec<machine_graph::ResourceName> {
        self.operations.iter().map(|e| e.value().resource.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use machine_graph::{Api, ApiType, ResourceName};

    #[test]
    fn cancel_all_cancels_every_token() {
        let mgr = OperationManager::new();
        let name = ResourceName::new(Api::new("rdk", ApiType::Component, "arm"), "arm1");
        let (_, token) = mgr.begin(name);
        assert!(!token.is_cancelled());
        mgr.cancel_all();
        assert!(token.is_cancelled());
    }

    #[test]
    fn end_removes_operation() {
        let mgr = OperationManager::new();
        let name = ResourceName::new(Api::new("rdk", ApiType::Component, "arm"), "arm1");
        let (id, _) = mgr.begin(name);
        assert_eq!(mgr.in_flight().len(), 1);
        mgr.end(id);
        assert!(mgr.in_flight().is_empty());
    }
}
