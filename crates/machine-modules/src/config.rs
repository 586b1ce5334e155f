//! Declarative module (plug-in) configuration.

use machine_graph::Api;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One plug-in declared in a machine configuration's `modules` list.
///
/// The real system learns a module's `(API, Model)` claims by an RPC
/// handshake after launch; since the wire transport is out of scope here,
/// claims are declared up front, the same way a test harness would stub
/// them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    pub name: String,
    pub exe_path: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub log_level: Option<String>,
    /// `(API, Model)` pairs this module claims to host.
    #[serde(default)]
    pub claims: Vec<(Api, String)>,
    /// True for a module present in the machine's very first configuration;
    /// `CleanModuleDataDirectory` is skipped after reconfigurations stamped
    /// `Initial`.
    #[serde(default)]
    pub initial: bool,
}

/// `API -> [Model]` lists one module claims, keyed by module name, as
/// returned by `Handles()`.
pub type HandlerMap = HashMap<Api, Vec<String>>;
