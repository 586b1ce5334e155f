//! The dependency map a constructor receives.

use machine_graph::{Resource, ResourceName};
use std::collections::HashMap;
use std::sync::Arc;

/// Resolved parents (explicit + implicit + weak) handed to a constructor,
/// keyed by name.
#[derive(Default, Clone)]
pub struct Dependencies {
    resources: HashMap<ResourceName, Arc<dyn Resource>>,
}

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: ResourceName, resource: Arc<dyn Resource>) {
        self.resources.insert(name, resource);
    }

    pub fn get(&self, name: &ResourceName) -> Option<&Arc<dyn Resource>> {
        self.resources.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &ResourceName> {
        self.resources.keys()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceName, &Arc<dyn Resource>)> {
        self.resources.iter()
    }
}
