//! Process-wide `(API, Model) -> Registration` mapping.

use crate::error::RegistryError;
use crate::registration::{Registration, RegistrationKey};
use dashmap::DashMap;
use machine_graph::Api;
use std::sync::Arc;

/// Thread-safe registry of constructors, keyed by `(API, Model)`.
///
/// Deliberately process-wide in spirit (a single instance is meant to be
/// shared behind one `Arc` for the process's lifetime) but never a global —
/// callers own their own instance and tests construct a fresh one per case.
#[derive(Default)]
pub struct Registry {
    entries: DashMap<RegistrationKey, Registration>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor for `(api, model)`. Fails with
    /// `AlreadyRegistered` unless the entry was explicitly deregistered
    /// first.
    pub fn register(
        &self,
        api: Api,
        model: impl Into<String>,
        registration: Registration,
    ) -> Result<(), RegistryError> {
        let model = model.into();
        let key = RegistrationKey::new(api.clone(), model.clone());
        if self.entries.contains_key(&key) {
            return Err(RegistryError::AlreadyRegistered { api, model });
        }
        self.entries.insert(key, registration);
        Ok(())
    }

    /// Remove a registration. No-op if absent.
    pub fn deregister(&self, api: &Api, model: &str) {
        self.entries
            .remove(&RegistrationKey::new(api.clone(), model.to_string()));
    }

    /// Look up a registration. Returns `None` rather than an error — an
    /// absent entry is a routine "not found", decided by the caller.
    pub fn lookup(&self, api: &Api, model: &str) -> Option<Registration> {
        self.entries
            .get(&RegistrationKey::new(api.clone(), model.to_string()))
            .map(|r| r.clone())
    }

    /// All registered `(API, Model)` keys.
    pub fn keys(&self) -> Vec<RegistrationKey> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    /// Check whether building one more instance of `(api, model)` would
    /// exceed its `max_instance`, given the current count of configured
    /// local nodes with that API.
    pub fn check_instance_cap(
        &self,
        api: &Api,
        model: &str,
        current_count: usize,
    ) -> Result<(), RegistryError> {
        let Some(registration) = self.lookup(api, model) else {
            return Ok(());
        };
        if !registration.has_unbounded_instances() && current_count >= registration.max_instance {
            return Err(RegistryError::MaxInstanceReached { api: api.clone() });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constructor::Constructor;
    use crate::deps::Dependencies;
    use async_trait::async_trait;
    use machine_graph::{ApiType, Resource, ResourceConfig, ResourceName};
    use std::any::Any;

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

    struct FakeConstructor;

    #[async_trait]
    impl Constructor for FakeConstructor {
        async fn construct(
            &self,
            _deps: &Dependencies,
            config: &ResourceConfig,
        ) -> Result<Arc<dyn Resource>, RegistryError> {
            Ok(Arc::new(FakeMotor {
                name: config.name.clone(),
            }))
        }
    }

    fn motor_api() -> Api {
        Api::new("rdk", ApiType::Component, "motor")
    }

    #[test]
    fn register_rejects_collision() {
        let registry = Registry::new();
        registry
            .register(motor_api(), "fake", Registration::new(Arc::new(FakeConstructor)))
            .unwrap();
        let err = registry.register(motor_api(), "fake", Registration::new(Arc::new(FakeConstructor)));
        assert!(matches!(err, Err(RegistryError::AlreadyRegistered { .. })));
    }

    #[test]
    fn deregister_then_register_succeeds() {
        let registry = Registry::new();
        registry
            .register(motor_api(), "fake", Registration::new(Arc::new(FakeConstructor)))
            .unwrap();
        registry.deregister(&motor_api(), "fake");
        assert!(registry
            .register(motor_api(), "fake", Registration::new(Arc::new(FakeConstructor)))
            .is_ok());
    }

    #[test]
    fn lookup_missing_is_none_not_error() {
        let registry = Registry::new();
        assert!(registry.lookup(&motor_api(), "fake").is_none());
    }

    #[test]
    fn instance_cap_enforced() {
        let registry = Registry::new();
        registry
            .register(
                motor_api(),
                "fake",
                Registration::new(Arc::new(FakeConstructor)).with_max_instance(2),
            )
            .unwrap();
        assert!(registry.check_instance_cap(&motor_api(), "fake", 1).is_ok());
        assert!(matches!(
            registry.check_instance_cap(&motor_api(), "fake", 2),
            Err(RegistryError::MaxInstanceReached { .. })
        ));
    }

    #[test]
    fn unbounded_when_max_instance_zero() {
        let registry = Registry::new();
        registry
            .register(motor_api(), "fake", Registration::new(Arc::new(FakeConstructor)))
            .unwrap();
        assert!(registry.check_instance_cap(&motor_api(), "fake", 10_000).is_ok());
    }

    #[tokio::test]
    async fn construct_round_trip() {
        let registry = Registry::new();
        registry
            .register(motor_api(), "fake", Registration::new(Arc::new(FakeConstructor)))
            .unwrap();
        let registration = registry.lookup(&motor_api(), "fake").unwrap();
        let config = ResourceConfig {
            name: ResourceName::new(motor_api(), "m1"),
            api: motor_api(),
            model: "fake".into(),
            attributes: serde_json::Value::Null,
            converted_attributes: serde_json::Value::Null,
            depends_on: vec![],
            implicit_depends_on: vec![],
            frame: None,
            log_level: None,
        };
        let resource = registration
            .constructor
            .construct(&Dependencies::new(), &config)
            .await
            .unwrap();
        assert_eq!(resource.resource_name().name, "m1");
    }
}
