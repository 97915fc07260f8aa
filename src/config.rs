//! Catalog Configuration
//!
//! Settings for the synced model and the image pipeline, stored as JSON.
//! A missing file means defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{CatalogError, CatalogResult};

/// Collection path the catalog lives under in the remote store
pub const DEFAULT_COLLECTION_PATH: &str = "jewelry";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_collection_path")]
    pub collection_path: String,
    /// Undo the local favorite flip when the store rejects it.
    /// Off by default: the flip stays and the error is reported.
    #[serde(default)]
    pub rollback_failed_toggles: bool,
    #[serde(default = "default_image_fetch_timeout")]
    pub image_fetch_timeout_secs: u64,
}

fn default_collection_path() -> String {
    DEFAULT_COLLECTION_PATH.to_string()
}

fn default_image_fetch_timeout() -> u64 {
    15
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            collection_path: default_collection_path(),
            rollback_failed_toggles: false,
            image_fetch_timeout_secs: default_image_fetch_timeout(),
        }
    }
}

impl CatalogConfig {
    pub fn with_collection_path(mut self, path: impl Into<String>) -> Self {
        self.collection_path = path.into();
        self
    }

    pub fn with_rollback_failed_toggles(mut self, rollback: bool) -> Self {
        self.rollback_failed_toggles = rollback;
        self
    }

    pub fn with_image_fetch_timeout(mut self, secs: u64) -> Self {
        self.image_fetch_timeout_secs = secs;
        self
    }

    pub fn image_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.image_fetch_timeout_secs)
    }

    pub fn from_json(s: &str) -> CatalogResult<Self> {
        serde_json::from_str(s).map_err(|e| CatalogError::config(format!("bad config: {}", e)))
    }

    pub fn to_json(&self) -> CatalogResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CatalogError::config(format!("cannot serialize config: {}", e)))
    }

    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> CatalogResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(s) => Self::from_json(&s),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("no config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(CatalogError::config(format!(
                "cannot read config {}: {}",
                path.display(),
                e
            ))),
        }
    }

    pub fn save(&self, path: &Path) -> CatalogResult<()> {
        std::fs::write(path, self.to_json()?).map_err(|e| {
            CatalogError::config(format!("cannot write config {}: {}", path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_is_default() {
        let config = CatalogConfig::from_json("{}").unwrap();
        assert_eq!(config, CatalogConfig::default());
        assert_eq!(config.collection_path, "jewelry");
        assert!(!config.rollback_failed_toggles);
        assert_eq!(config.image_fetch_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_partial_json() {
        let config = CatalogConfig::from_json(r#"{"rollback_failed_toggles": true}"#).unwrap();
        assert!(config.rollback_failed_toggles);
        assert_eq!(config.collection_path, "jewelry");
    }

    #[test]
    fn test_bad_json_is_config_error() {
        assert!(matches!(
            CatalogConfig::from_json("not json"),
            Err(CatalogError::Config(_))
        ));
    }

    #[test]
    fn test_io_failures_are_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        // Reading a directory fails with something other than NotFound.
        assert!(matches!(
            CatalogConfig::load(dir.path()),
            Err(CatalogError::Config(_))
        ));
        let err = CatalogConfig::default()
            .save(&dir.path().join("missing").join("catalog.json"))
            .unwrap_err();
        assert!(matches!(err, CatalogError::Config(_)));
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CatalogConfig::load(&dir.path().join("catalog.json")).unwrap();
        assert_eq!(config, CatalogConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let config = CatalogConfig::default()
            .with_collection_path("rings")
            .with_rollback_failed_toggles(true)
            .with_image_fetch_timeout(3);
        config.save(&path).unwrap();

        assert_eq!(CatalogConfig::load(&path).unwrap(), config);
    }
}
