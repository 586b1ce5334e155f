//! Attribute-map validation: free-form JSON -> typed converted-attributes
//! plus any implicit dependencies the attributes imply.

use crate::error::RegistryError;
use machine_graph::ResourceName;
use serde_json::Value;

/// Validates and converts a resource's free-form attribute map.
///
/// `validate` is called once per resource during `UpdateResources`, before
/// the resource is staged to `Configuring`; its output becomes
/// `ResourceConfig::converted_attributes` and its returned names are merged
/// into `ResourceConfig::implicit_depends_on`.
pub trait AttributeMapConverter: Send + Sync {
    fn validate(
        &self,
        attributes: &Value,
    ) -> Result<(Value, Vec<ResourceName>), RegistryError>;
}

/// A converter that accepts any attribute map unchanged and declares no
/// implicit dependencies. The default when a registration doesn't supply
/// one.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughConverter;

impl AttributeMapConverter for PassthroughConverter {
    fn validate(&self, attributes: &Value) -> Result<(Value, Vec<ResourceName>), RegistryError> {
        Ok((attributes.clone(), Vec::new()))
    }
}
