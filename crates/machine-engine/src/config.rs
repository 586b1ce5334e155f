//! The top-level declarative machine configuration.

use machine_graph::ResourceConfig;
use machine_modules::ModuleConfig;
use machine_process::ProcessConfig;
use machine_remote::RemoteConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudConfig {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub location_secret: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub bind_address: String,
    #[serde(default)]
    pub tls_cert_file: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub handlers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageConfig {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub local_tarball: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    pub sensor_name: String,
    pub maintenance_allowed_key: String,
}

/// Declarative record for an entire machine, as parsed from a config file
/// or received from the cloud. Consumed as an already-parsed in-memory
/// value — the parser itself is out of scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cloud: CloudConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub packages: Vec<PackageConfig>,
    #[serde(default)]
    pub modules: Vec<ModuleConfig>,
    #[serde(default)]
    pub remotes: Vec<RemoteConfig>,
    #[serde(default)]
    pub components: Vec<ResourceConfig>,
    #[serde(default)]
    pub services: Vec<ResourceConfig>,
    #[serde(default)]
    pub processes: Vec<ProcessConfig>,
    #[serde(default)]
    pub maintenance_config: Option<MaintenanceConfig>,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub untrusted_env: bool,
    #[serde(default)]
    pub from_command: bool,
    #[serde(default)]
    pub allow_insecure_creds: bool,
    #[serde(default)]
    pub revision: String,
    #[serde(default)]
    pub initial: bool,
    #[serde(default)]
    pub package_path: Option<String>,
}

impl Config {
    /// All component and service configs, the unit the resource graph
    /// diffs and constructs. Processes and modules diff separately.
    pub fn all_resources(&self) -> Vec<ResourceConfig> {
        self.components
            .iter()
            .cloned()
            .chain(self.services.iter().cloned())
            .collect()
    }

    /// Shallow structural comparison of the network-affecting sections,
    /// used by the admission gate to decide whether a maintenance-blocked
    /// reconfigure should still apply transport/auth changes.
    pub fn network_equal(&self, other: &Config) -> bool {
        self.network == other.network && self.auth == other.auth && self.cloud == other.cloud
    }

    pub fn as_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
