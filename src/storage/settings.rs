//! Settings storage
//!
//! Manages persistence of the store configuration: where conversation data
//! lives, the per-user quota and the default log filter.

use crate::storage::quota::QuotaConfig;
use crate::storage::{get_data_dir, StorageError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Directory holding one file per conversation scope
    #[serde(default = "default_data_directory")]
    pub data_directory: PathBuf,
    /// Quota size and warning thresholds
    #[serde(default)]
    pub quota: QuotaConfig,
    /// Filter used when RUST_LOG is not set
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_data_directory() -> PathBuf {
    get_data_dir()
        .ok()
        .map(|d| d.join("conversations"))
        .unwrap_or_else(|| PathBuf::from("./conversations"))
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            data_directory: default_data_directory(),
            quota: QuotaConfig::default(),
            log_filter: default_log_filter(),
        }
    }
}

impl StoreSettings {
    /// Validate settings values
    ///
    /// Thresholds are clamped to `[0, 1]`; if they end up out of order the
    /// defaults are restored.
    pub fn validate(&mut self) {
        let quota = &mut self.quota;
        quota.warning_threshold = clamp_fraction(quota.warning_threshold);
        quota.critical_threshold = clamp_fraction(quota.critical_threshold);
        quota.max_threshold = clamp_fraction(quota.max_threshold);

        let ordered = quota.warning_threshold <= quota.critical_threshold
            && quota.critical_threshold <= quota.max_threshold;
        if !ordered {
            tracing::warn!("Quota thresholds out of order, restoring defaults");
            let defaults = QuotaConfig::default();
            quota.warning_threshold = defaults.warning_threshold;
            quota.critical_threshold = defaults.critical_threshold;
            quota.max_threshold = defaults.max_threshold;
        }

        if self.log_filter.trim().is_empty() || EnvFilter::try_new(&self.log_filter).is_err() {
            tracing::warn!("Invalid log filter '{}', using 'info'", self.log_filter);
            self.log_filter = default_log_filter();
        }
    }
}

// NaN clamps to 0 rather than passing through
fn clamp_fraction(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Get the settings file path
fn get_settings_path() -> Result<PathBuf, StorageError> {
    Ok(get_data_dir()?.join("settings.json"))
}

/// Load settings from disk
///
/// Returns default settings if the file doesn't exist or is corrupted
pub fn load_settings() -> StoreSettings {
    match get_settings_path() {
        Ok(path) => load_settings_from(&path),
        Err(e) => {
            tracing::warn!("Failed to locate settings, using defaults: {}", e);
            StoreSettings::default()
        }
    }
}

/// Load settings from `path`, falling back to defaults
pub fn load_settings_from(path: &Path) -> StoreSettings {
    match load_settings_internal(path) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("Failed to load settings, using defaults: {}", e);
            StoreSettings::default()
        }
    }
}

/// Internal settings loading with error propagation
fn load_settings_internal(path: &Path) -> Result<StoreSettings, StorageError> {
    if !path.exists() {
        tracing::info!("Settings file not found, using defaults");
        return Ok(StoreSettings::default());
    }

    let json = fs::read_to_string(path)?;
    let mut settings: StoreSettings = serde_json::from_str(&json)?;
    settings.validate();

    tracing::debug!("Loaded settings from {}", path.display());
    Ok(settings)
}

/// Save settings to the default location
pub fn save_settings(settings: &StoreSettings) -> Result<(), StorageError> {
    save_settings_to(settings, &get_settings_path()?)
}

/// Save settings to `path`
pub fn save_settings_to(settings: &StoreSettings, path: &Path) -> Result<(), StorageError> {
    // Ensure the parent directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;

    tracing::debug!("Saved settings to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::quota::DEFAULT_QUOTA_BYTES;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = StoreSettings::default();
        assert_eq!(settings.quota.quota_bytes, DEFAULT_QUOTA_BYTES);
        assert_eq!(settings.quota.warning_threshold, 0.8);
        assert_eq!(settings.log_filter, "info");
        assert!(settings.data_directory.ends_with("conversations"));
    }

    #[test]
    fn test_settings_validation() {
        let mut settings = StoreSettings::default();

        settings.quota.max_threshold = 3.0;
        settings.validate();
        assert_eq!(settings.quota.max_threshold, 1.0);

        settings.quota.warning_threshold = 0.99;
        settings.quota.critical_threshold = 0.5;
        settings.validate();
        assert_eq!(settings.quota.warning_threshold, 0.8);
        assert_eq!(settings.quota.critical_threshold, 0.95);

        settings.quota.warning_threshold = f64::NAN;
        settings.validate();
        assert_eq!(settings.quota.warning_threshold, 0.0);

        settings.log_filter = "  ".to_string();
        settings.validate();
        assert_eq!(settings.log_filter, "info");

        settings.log_filter = "lorgan_chat=debug".to_string();
        settings.validate();
        assert_eq!(settings.log_filter, "lorgan_chat=debug");
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: StoreSettings =
            serde_json::from_str(r#"{"data_directory": "/tmp/chats"}"#).unwrap();
        assert_eq!(settings.data_directory, PathBuf::from("/tmp/chats"));
        assert_eq!(settings.quota, QuotaConfig::default());
        assert_eq!(settings.log_filter, "info");
    }

    #[test]
    fn test_settings_persistence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut settings = StoreSettings::default();
        settings.data_directory = dir.path().join("data");
        settings.quota = QuotaConfig::with_quota(4096);
        save_settings_to(&settings, &path).unwrap();

        assert_eq!(load_settings_from(&path), settings);
    }

    #[test]
    fn test_corrupted_settings_fall_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        assert_eq!(load_settings_from(&path), StoreSettings::default());
        assert_eq!(
            load_settings_from(&dir.path().join("absent.json")),
            StoreSettings::default()
        );
    }
}
