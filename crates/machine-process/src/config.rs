//! Declarative process configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One OS process declared in a machine configuration's `processes` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessConfig {
    pub id: String,
    pub executable_path: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub cwd: Option<String>,
    /// Restart on exit until explicitly stopped.
    #[serde(default)]
    pub one_shot: bool,
    /// Seconds to wait after a non-`one_shot` exit before respawning.
    #[serde(default = "default_respawn_delay_secs")]
    pub respawn_delay_secs: u64,
}

fn default_respawn_delay_secs() -> u64 {
    1
}
