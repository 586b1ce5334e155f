//! The constructor capability every registration must provide.

use crate::deps::Dependencies;
use crate::error::RegistryError;
use async_trait::async_trait;
use machine_graph::{Resource, ResourceConfig};
use std::sync::Arc;

/// Builds a live resource from its resolved dependencies and config.
///
/// Implementors should not catch their own panics — the caller (the
/// resource manager's completion pass) wraps every invocation with
/// [`std::panic::AssertUnwindSafe`] plus `catch_unwind`/`FutureExt::catch_unwind`
/// and turns a panic into [`RegistryError::PanicDuringConstruction`].
#[async_trait]
pub trait Constructor: Send + Sync {
    async fn construct(
        &self,
        deps: &Dependencies,
        config: &ResourceConfig,
    ) -> Result<Arc<dyn Resource>, RegistryError>;
}

#[async_trait]
impl<F, Fut> Constructor for F
where
    F: Fn(Dependencies, ResourceConfig) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Arc<dyn Resource>, RegistryError>> + Send,
{
    async fn construct(
        &self,
        deps: &Dependencies,
        config: &ResourceConfig,
    ) -> Result<Arc<dyn Resource>, RegistryError> {
        (self)(deps.clone(), config.clone()).await
    }
}
