//! Declarative resource configuration and config-to-config diffing.

use crate::name::{Api, ResourceName};
use serde::{Deserialize, Serialize};
use serde_json::Value as AttributeMap;
use std::collections::HashSet;

/// Declarative record for a single resource, as it appears in a [`Config`](crate::Config)'s
/// `components`/`services`/`processes` lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Resource name.
    pub name: ResourceName,
    /// Capability surface.
    pub api: Api,
    /// Implementation identifier, e.g. `"fake"`, `"acme:anvil:2000"`.
    pub model: String,
    /// Free-form attributes as authored.
    #[serde(default)]
    pub attributes: AttributeMap,
    /// Typed attributes produced by `AttributeMapConverter::Validate` (see
    /// `machine-registry`). Populated during validation, empty otherwise.
    #[serde(default)]
    pub converted_attributes: AttributeMap,
    /// Explicitly declared dependencies.
    #[serde(default)]
    pub depends_on: Vec<ResourceName>,
    /// Dependencies discovered during validation (not authored by the user).
    #[serde(default)]
    pub implicit_depends_on: Vec<ResourceName>,
    /// Optional parent frame / geometry, opaque to the graph.
    #[serde(default)]
    pub frame: Option<AttributeMap>,
    /// Optional per-resource log level override.
    #[serde(default)]
    pub log_level: Option<String>,
}

impl ResourceConfig {
    /// All parents this config declares, explicit followed by implicit.
    pub fn all_depends_on(&self) -> impl Iterator<Item = &ResourceName> {
        self.depends_on.iter().chain(self.implicit_depends_on.iter())
    }

    /// Shallow attribute-and-dependency equality used by [`diff`] to decide
    /// `Unmodified` vs `Modified`. Model changes are handled by the caller
    /// (treated as `Removed` + `Added`), so this does not compare `model`.
    fn shallow_eq_ignoring_model(&self, other: &Self) -> bool {
        self.attributes == other.attributes
            && self.depends_on == other.depends_on
            && self.frame == other.frame
            && self.log_level == other.log_level
    }
}

/// Disjoint partition of resource names produced by comparing an old and a
/// new config.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigDiff {
    /// Present in the new config only.
    pub added: Vec<ResourceConfig>,
    /// Present in both, with attributes/dependencies/model/frame/log-level changed.
    pub modified: Vec<ResourceConfig>,
    /// Present in the old config only.
    pub removed: Vec<ResourceName>,
    /// Present in both, byte-identical.
    pub unmodified: Vec<ResourceName>,
    /// Whether the transport/auth sections are unchanged between the two
    /// configs (used by the reconfiguration engine's admission gate).
    pub network_equal: bool,
}

impl ConfigDiff {
    /// True when the diff carries no resource-level change at all.
    #[must_use]
    pub fn is_empty_of_changes(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }
}

/// Diff two resource sets by name.
///
/// A change to `model` alone is reported as `Removed` + `Added` of the same
/// name (the resource must be rebuilt from scratch); a change to the
/// dependency list alone is `Modified`.
pub fn diff(
    old: &[ResourceConfig],
    new: &[ResourceConfig],
    network_equal: bool,
) -> ConfigDiff {
    let mut out = ConfigDiff {
        network_equal,
        ..Default::default()
    };

    let old_by_name: std::collections::HashMap<&ResourceName, &ResourceConfig> =
        old.iter().map(|c| (&c.name, c)).collect();
    let mut seen: HashSet<&ResourceName> = HashSet::new();

    for new_cfg in new {
        seen.insert(&new_cfg.name);
        match old_by_name.get(&new_cfg.name) {
            None => out.added.push(new_cfg.clone()),
            Some(old_cfg) => {
                if old_cfg.model != new_cfg.model {
                    out.removed.push(new_cfg.name.clone());
                    out.added.push(new_cfg.clone());
                } else if old_cfg.shallow_eq_ignoring_model(new_cfg) {
                    out.unmodified.push(new_cfg.name.clone());
                } else {
                    out.modified.push(new_cfg.clone());
                }
            }
        }
    }

    for old_cfg in old {
        if !seen.contains(&old_cfg.name) {
            out.removed.push(old_cfg.name.clone());
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::ApiType;

    fn cfg(name: &str, model: &str, deps: Vec<&str>) -> ResourceConfig {
        ResourceConfig {
            name: ResourceName::new(Api::new("rdk", ApiType::Component, "motor"), name),
            api: Api::new("rdk", ApiType::Component, "motor"),
            model: model.to_string(),
            attributes: AttributeMap::Null,
            converted_attributes: AttributeMap::Null,
            depends_on: deps
                .into_iter()
                .map(|d| ResourceName::new(Api::new("rdk", ApiType::Component, "board"), d))
                .collect(),
            implicit_depends_on: Vec::new(),
            frame: None,
            log_level: None,
        }
    }

    #[test]
    fn added_and_removed() {
        let old = vec![cfg("m1", "fake", vec![])];
        let new = vec![cfg("m2", "fake", vec![])];
        let d = diff(&old, &new, true);
        assert_eq!(d.added.len(), 1);
        assert_eq!(d.removed.len(), 1);
        assert!(d.modified.is_empty());
        assert!(d.unmodified.is_empty());
    }

    #[test]
    fn model_change_is_remove_plus_add() {
        let old = vec![cfg("m1", "fake", vec![])];
        let new = vec![cfg("m1", "fake2", vec![])];
        let d = diff(&old, &new, true);
        assert_eq!(d.removed, vec![old[0].name.clone()]);
        assert_eq!(d.added, vec![new[0].clone()]);
    }

    #[test]
    fn dependency_change_alone_is_modified() {
        let old = vec![cfg("m1", "fake", vec!["b1"])];
        let new = vec![cfg("m1", "fake", vec!["b2"])];
        let d = diff(&old, &new, true);
        assert_eq!(d.modified.len(), 1);
        assert!(d.unmodified.is_empty());
    }

    #[test]
    fn identical_is_unmodified() {
        let old = vec![cfg("m1", "fake", vec!["b1"])];
        let new = old.clone();
        let d = diff(&old, &new, true);
        assert_eq!(d.unmodified, vec![old[0].name.clone()]);
    }
}
