// YAML configuration

use crate::storage::Backend;
use crate::store::StoreOptions;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const APP_DIR: &str = "todolist";

/// User configuration, every field optional in the file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory holding the storage backend's files
    pub data_dir: Option<PathBuf>,
    pub backend: Backend,
    pub storage_key: String,
    pub undo_window_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        let options = StoreOptions::default();
        Self {
            data_dir: None,
            backend: Backend::default(),
            storage_key: options.key,
            undo_window_ms: options.undo_window.as_millis() as u64,
        }
    }
}

impl Config {
    /// Load from `path` if given, else from the default location if present
    ///
    /// An explicit path that does not exist is an error; a missing default
    /// file just means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => {
                    debug!("No config file, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config =
            serde_yaml::from_str(&content).with_context(|| format!("Failed to parse config file {}", path.display()))?;
        debug!(file = ?path, "Loaded config");
        Ok(config)
    }

    /// `<config_dir>/todolist/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.yaml"))
    }

    /// Configured data directory, else `<data_dir>/todolist`, else `./.todolist`
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|dir| dir.join(APP_DIR)))
            .unwrap_or_else(|| PathBuf::from(".todolist"))
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            key: self.storage_key.clone(),
            undo_window: Duration::from_millis(self.undo_window_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.backend, Backend::Sqlite);
        assert_eq!(config.storage_key, "tasks");
        assert_eq!(config.store_options().undo_window, Duration::from_secs(3));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(&path, "backend: file\nundo_window_ms: 5000\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.backend, Backend::File);
        assert_eq!(config.storage_key, "tasks");
        assert_eq!(config.store_options().undo_window, Duration::from_secs(5));
    }

    #[test]
    fn test_data_dir_override() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(&path, format!("data_dir: {}\n", temp.path().join("data").display())).unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.data_dir(), temp.path().join("data"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(&path, "colour: blue\n").unwrap();

        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let temp = TempDir::new().unwrap();
        assert!(Config::load(Some(&temp.path().join("nope.yaml"))).is_err());
    }
}
