//! Persistent storage
//!
//! This module handles persistence of conversation lists, quota accounting and
//! store settings.

pub mod backend;
pub mod conversations;
pub mod quota;
pub mod settings;

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by storage backends and the conversation store
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not determine the application data directory")]
    NoDataDir,

    #[error("Storage quota exceeded: {requested} bytes requested, {limit} bytes allowed")]
    QuotaExceeded { requested: u64, limit: u64 },

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

impl StorageError {
    /// Whether the failure came from the medium running out of space
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, StorageError::QuotaExceeded { .. })
    }
}

/// Get the application data directory
///
/// Linux: ~/.local/share/lorganchat
/// macOS: ~/Library/Application Support/com.Lorgan.LorganChat
/// Windows: %APPDATA%\Lorgan\LorganChat\data
pub fn get_data_dir() -> Result<PathBuf, StorageError> {
    directories::ProjectDirs::from("com", "Lorgan", "LorganChat")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or(StorageError::NoDataDir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_error_is_distinguished() {
        let quota = StorageError::QuotaExceeded {
            requested: 20,
            limit: 10,
        };
        assert!(quota.is_quota_exceeded());
        assert!(quota.to_string().contains("20 bytes requested"));

        let format = StorageError::InvalidFormat("expected an array".to_string());
        assert!(!format.is_quota_exceeded());
    }
}
