//! Persisted-config cache: the last successfully applied config is written
//! to disk under the user's cache directory so a machine can restart from
//! it if the cloud is unreachable. Stored in the same shape it arrived in,
//! not a separate on-disk schema.

use crate::error::FacadeError;
use machine_engine::Config;
use std::path::{Path, PathBuf};

const CACHE_FILE_NAME: &str = "machine-runtime-config-cache.yaml";

/// Default cache path: `<user cache dir>/machine-runtime/machine-runtime-config-cache.yaml`.
pub fn default_cache_path() -> Result<PathBuf, FacadeError> {
    let base = dirs::cache_dir().ok_or(FacadeError::NoCacheDir)?;
    Ok(base.join("machine-runtime").join(CACHE_FILE_NAME))
}

pub fn load(path: &Path) -> Result<Option<Config>, FacadeError> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = std::fs::read_to_string(path).map_err(|e| FacadeError::PersistRead {
        path: path.display().to_string(),
        cause: e.to_string(),
    })?;
    let cfg = serde_yaml::from_str(&bytes).map_err(|e| FacadeError::PersistRead {
        path: path.display().to_string(),
        cause: e.to_string(),
    })?;
    Ok(Some(cfg))
}

pub fn save(path: &Path, config: &Config) -> Result<(), FacadeError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| FacadeError::PersistWrite {
            path: path.display().to_string(),
            cause: e.to_string(),
        })?;
    }
    let yaml = serde_yaml::to_string(config).map_err(|e| FacadeError::PersistWrite {
        path: path.display().to_string(),
        cause: e.to_string(),
    })?;
    std::fs::write(path, yaml).map_err(|e| FacadeError::PersistWrite {
        path: path.display().to_string(),
        cause: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use machine_engine::Config;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.yaml");
        let cfg = Config {
            revision: "rev-1".into(),
            ..Default::default()
        };
        save(&path, &cfg).unwrap();
        let loaded = load(&path).unwrap().unwrap();
        assert_eq!(loaded.revision, "rev-1");
    }

    #[test]
    fn missing_file_is_none_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        assert!(load(&path).unwrap().is_none());
    }
}
