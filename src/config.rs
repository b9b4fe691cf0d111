use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::MapperError;

const APP_DIR_NAME: &str = "trackmap";
const CONFIG_FILE_NAME: &str = "config.json";

/// Poll interval while the player is on track and a map may be recording
pub const ACTIVE_INTERVAL_MS: u64 = 20;
/// Poll interval once a map is published or the player left the track
pub const IDLE_INTERVAL_MS: u64 = 400;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub active_interval_ms: u64,
    pub idle_interval_ms: u64,
    /// Overrides the default track map directory
    pub storage_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            active_interval_ms: ACTIVE_INTERVAL_MS,
            idle_interval_ms: IDLE_INTERVAL_MS,
            storage_dir: None,
        }
    }
}

impl AppConfig {
    /// Location of the config file under the user's config directory
    pub fn default_path() -> Result<PathBuf, MapperError> {
        Ok(dirs::config_dir()
            .ok_or(MapperError::NoConfigDir)?
            .join(APP_DIR_NAME)
            .join(CONFIG_FILE_NAME))
    }

    /// Load the user's config file, `None` when it was never saved
    pub fn from_local_file() -> Result<Option<Self>, MapperError> {
        Self::from_file(&Self::default_path()?)
    }

    pub fn from_file(config_path: &Path) -> Result<Option<Self>, MapperError> {
        if !config_path.exists() {
            debug!("No config file at {:?}", config_path);
            return Ok(None);
        }

        let file = std::fs::File::open(config_path)
            .map_err(|e| MapperError::ConfigIOError { source: e })?;
        serde_json::from_reader(file)
            .map(Some)
            .map_err(|e| MapperError::ConfigSerializeError { source: e })
    }

    pub fn save(&self) -> Result<(), MapperError> {
        self.save_to(&Self::default_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<(), MapperError> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MapperError::ConfigIOError { source: e })?;
        }

        let file = std::fs::File::create(config_path)
            .map_err(|e| MapperError::ConfigIOError { source: e })?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| MapperError::ConfigSerializeError { source: e })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.active_interval_ms, 20);
        assert_eq!(config.idle_interval_ms, 400);
        assert!(config.storage_dir.is_none());
    }

    #[test]
    fn test_missing_file_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let config = AppConfig::from_file(&temp_dir.path().join("config.json")).unwrap();
        assert!(config.is_none());
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.json");
        let config = AppConfig {
            active_interval_ms: 50,
            storage_dir: Some(temp_dir.path().join("maps")),
            ..Default::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(AppConfig::from_file(&path).unwrap(), Some(config));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, r#"{"idle_interval_ms": 1000}"#).unwrap();

        let config = AppConfig::from_file(&path).unwrap().unwrap();
        assert_eq!(config.idle_interval_ms, 1000);
        assert_eq!(config.active_interval_ms, ACTIVE_INTERVAL_MS);
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            AppConfig::from_file(&path),
            Err(MapperError::ConfigSerializeError { .. })
        ));
    }
}
