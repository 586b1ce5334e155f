//! Package synchronization collaborator (cloud packages, then local
//! tarballs). The fetcher itself is out of scope; this is the seam.

use crate::config::PackageConfig;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

#[async_trait]
pub trait PackageSyncer: Send + Sync {
    /// Synchronize `packages` to local disk. A failure here is fatal to the
    /// whole `Reconfigure` call (aborts early, logged).
    async fn sync(&self, packages: &[PackageConfig]) -> Result<(), String>;
}

/// Default syncer: no-op for cloud packages; gives local tarballs a fresh
/// monotonically-increasing synthetic version each call, forcing a new
/// unpack directory, matching the source's tarball-versioning behavior.
#[derive(Default)]
pub struct NoopPackageSyncer {
    tarball_version: AtomicU64,
}

#[async_trait]
impl PackageSyncer for NoopPackageSyncer {
    async fn sync(&self, packages: &[PackageConfig]) -> Result<(), String> {
        if packages.iter().any(|p| p.local_tarball) {
            self.tarball_version.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
