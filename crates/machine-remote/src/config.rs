//! Declarative remote configuration.

use serde::{Deserialize, Serialize};

/// One sub-machine declared in a machine configuration's `remotes` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub insecure: bool,
    #[serde(default = "default_reconnect_interval_secs")]
    pub reconnect_interval_secs: u64,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

fn default_reconnect_interval_secs() -> u64 {
    5
}

fn default_refresh_interval_secs() -> u64 {
    10
}
