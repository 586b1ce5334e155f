//! Weak-dependency matcher predicates.

use machine_graph::Resource;
use std::sync::Arc;

/// A predicate selecting peers a registration wants delivered even without
/// a declared edge (e.g. "any component implementing an input-provider
/// capability").
///
/// Wrapped in `Arc` rather than stored bare so registrations can be cloned
/// cheaply and shared between the registry and the weak-dependent pass.
#[derive(Clone)]
pub struct WeakMatcher(Arc<dyn Fn(&dyn Resource) -> bool + Send + Sync>);

impl WeakMatcher {
    pub fn new(f: impl Fn(&dyn Resource) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn matches(&self, resource: &dyn Resource) -> bool {
        (self.0)(resource)
    }
}

impl std::fmt::Debug for WeakMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WeakMatcher(..)")
    }
}
