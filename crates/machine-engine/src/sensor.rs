//! The maintenance sensor collaborator consulted by the admission gate.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

#[async_trait]
pub trait MaintenanceSensor: Send + Sync {
    async fn readings(&self, extra: &Value) -> Result<HashMap<String, Value>, Box<dyn std::error::Error + Send + Sync>>;
}
