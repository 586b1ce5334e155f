//! One registry entry: everything the manager needs to build and wire a
//! given `(API, Model)`.

use crate::attribute::{AttributeMapConverter, PassthroughConverter};
use crate::constructor::Constructor;
use crate::discover::Discover;
use crate::weak::WeakMatcher;
use machine_graph::Api;
use std::sync::Arc;

/// Key a registration is filed under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistrationKey {
    pub api: Api,
    pub model: String,
}

impl RegistrationKey {
    pub fn new(api: Api, model: impl Into<String>) -> Self {
        Self {
            api,
            model: model.into(),
        }
    }
}

/// Everything registered for one `(API, Model)`.
#[derive(Clone)]
pub struct Registration {
    pub constructor: Arc<dyn Constructor>,
    pub attribute_converter: Arc<dyn AttributeMapConverter>,
    pub weak_dependencies: Vec<WeakMatcher>,
    pub discover: Option<Arc<dyn Discover>>,
    /// Zero means unbounded.
    pub max_instance: usize,
}

impl Registration {
    pub fn new(constructor: Arc<dyn Constructor>) -> Self {
        Self {
            constructor,
            attribute_converter: Arc::new(PassthroughConverter),
            weak_dependencies: Vec::new(),
            discover: None,
            max_instance: 0,
        }
    }

    #[must_use]
    pub fn with_attribute_converter(mut self, converter: Arc<dyn AttributeMapConverter>) -> Self {
        self.attribute_converter = converter;
        self
    }

    #[must_use]
    pub fn with_weak_dependencies(mut self, matchers: Vec<WeakMatcher>) -> Self {
        self.weak_dependencies = matchers;
        self
    }

    #[must_use]
    pub fn with_discover(mut self, discover: Arc<dyn Discover>) -> Self {
        self.discover = Some(discover);
        self
    }

    #[must_use]
    pub fn with_max_instance(mut self, max_instance: usize) -> Self {
        self.max_instance = max_instance;
        self
    }

    #[must_use]
    pub fn has_unbounded_instances(&self) -> bool {
        self.max_instance == 0
    }
}
