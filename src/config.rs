//! Persistent sync configuration.
//!
//! Stores the user's mirror directory choices, the last-used device address,
//! and the device credential in one JSON file under the platform config
//! directory. The core components only consume these values through the
//! accessors; they never reach into the file themselves.

use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Sync settings persisted between runs.
///
/// All fields default to empty; an unset directory means the user has not
/// chosen a mirror location for that category yet.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncConfig {
    /// Local mirror of the device document store.
    #[serde(default)]
    pub documents_dir: String,
    /// Local mirror of the template store.
    #[serde(default)]
    pub templates_dir: String,
    /// Local mirror of the splashscreen images.
    #[serde(default)]
    pub splashscreens_dir: String,
    /// Address the device was last reached at.
    #[serde(default)]
    pub previous_address: String,
    /// Stored device password, may be empty when the user prefers prompting.
    #[serde(default)]
    pub device_password: String,
}

/// Configuration store facade.
pub struct ConfigStore;

impl ConfigStore {
    /// Default config file location under the platform config directory.
    pub fn default_path() -> Result<PathBuf, SyncError> {
        let dirs = directories::ProjectDirs::from("", "remsync", "remsync").ok_or_else(|| {
            SyncError::Config("could not determine platform config directory".to_string())
        })?;
        Ok(dirs.config_dir().join("syncing_config.json"))
    }

    /// Load configuration, creating a blank file on first use.
    pub fn load() -> Result<SyncConfig, SyncError> {
        Self::load_from(&Self::default_path()?)
    }

    /// Load configuration from a specific file. A missing file yields the
    /// default config and writes it so later saves have a home.
    pub fn load_from(path: &Path) -> Result<SyncConfig, SyncError> {
        if !path.exists() {
            let blank = SyncConfig::default();
            Self::save_to(&blank, path)?;
            tracing::info!("created blank sync config at {}", path.display());
            return Ok(blank);
        }
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| SyncError::Config(format!("invalid config file {}: {}", path.display(), e)))
    }

    /// Persist configuration to the default location.
    pub fn save(config: &SyncConfig) -> Result<(), SyncError> {
        Self::save_to(config, &Self::default_path()?)
    }

    /// Persist configuration to a specific file.
    pub fn save_to(config: &SyncConfig, path: &Path) -> Result<(), SyncError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(config)
            .map_err(|e| SyncError::Config(format!("could not serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_blank_config_and_creates_it() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("conf").join("syncing_config.json");
        let config = ConfigStore::load_from(&path).unwrap();
        assert_eq!(config, SyncConfig::default());
        assert!(path.exists());
    }

    #[test]
    fn round_trips_all_fields() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("syncing_config.json");
        let config = SyncConfig {
            documents_dir: "/home/user/rm/docs".to_string(),
            templates_dir: "/home/user/rm/templates".to_string(),
            splashscreens_dir: "/home/user/rm/splash".to_string(),
            previous_address: "10.11.99.1".to_string(),
            device_password: "hunter2".to_string(),
        };
        ConfigStore::save_to(&config, &path).unwrap();
        let loaded = ConfigStore::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("syncing_config.json");
        std::fs::write(&path, r#"{"previous_address":"10.11.99.1"}"#).unwrap();
        let config = ConfigStore::load_from(&path).unwrap();
        assert_eq!(config.previous_address, "10.11.99.1");
        assert_eq!(config.documents_dir, "");
    }
}
