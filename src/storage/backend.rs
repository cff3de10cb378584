//! Storage backends
//!
//! A backend is a flat string key-value medium, the role local storage plays
//! in a browser. The conversation store only talks to this trait.

use crate::storage::quota::utf16_bytes;
use crate::storage::StorageError;
use dashmap::DashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// Extension used for value files in a [`FileBackend`] directory
const VALUE_EXTENSION: &str = "json";

/// Key-value medium used by the conversation store
pub trait StorageBackend: Send + Sync {
    /// Read the value stored under `key`, `None` when absent
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key succeeds.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// Every key currently stored, in no particular order
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

impl<B: StorageBackend + ?Sized> StorageBackend for Arc<B> {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove_item(key)
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        (**self).keys()
    }
}

/// Bytes an entry occupies when keys and values are both counted as UTF-16
fn entry_bytes(key: &str, value: &str) -> u64 {
    utf16_bytes(key) + utf16_bytes(value)
}

fn check_quota(
    limit: Option<u64>,
    others: u64,
    key: &str,
    value: &str,
) -> Result<(), StorageError> {
    if let Some(limit) = limit {
        let requested = others + entry_bytes(key, value);
        if requested > limit {
            return Err(StorageError::QuotaExceeded { requested, limit });
        }
    }
    Ok(())
}

/// In-process backend
///
/// Wrap it in an `Arc` to share one medium between several stores.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    items: DashMap<String, String>,
    quota_bytes: Option<u64>,
}

impl MemoryBackend {
    /// Create an empty backend without a quota
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty backend that rejects writes beyond `quota_bytes`
    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            items: DashMap::new(),
            quota_bytes: Some(quota_bytes),
        }
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total bytes held, keys included
    pub fn used_bytes(&self) -> u64 {
        self.items
            .iter()
            .map(|entry| entry_bytes(entry.key(), entry.value()))
            .sum()
    }
}

impl StorageBackend for MemoryBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.get(key).map(|value| value.value().clone()))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.quota_bytes.is_some() {
            let others: u64 = self
                .items
                .iter()
                .filter(|entry| entry.key() != key)
                .map(|entry| entry_bytes(entry.key(), entry.value()))
                .sum();
            check_quota(self.quota_bytes, others, key, value)?;
        }

        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.items.iter().map(|entry| entry.key().clone()).collect())
    }
}

/// Directory-backed backend: one JSON file per key
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
    quota_bytes: Option<u64>,
}

impl FileBackend {
    /// Open (and create if needed) a backend rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        tracing::debug!("Opened file storage at {}", root.display());
        Ok(Self {
            root,
            quota_bytes: None,
        })
    }

    /// Reject writes that would push the directory past `quota_bytes`
    pub fn with_quota(mut self, quota_bytes: u64) -> Self {
        self.quota_bytes = Some(quota_bytes);
        self
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty key".to_string()));
        }
        Ok(self
            .root
            .join(format!("{}.{}", encode_key(key), VALUE_EXTENSION)))
    }

    fn bytes_excluding(&self, key: &str) -> Result<u64, StorageError> {
        let mut total = 0;
        for other in self.keys()? {
            if other == key {
                continue;
            }
            if let Some(value) = self.get_item(&other)? {
                total += entry_bytes(&other, &value);
            }
        }
        Ok(total)
    }
}

impl StorageBackend for FileBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;

        if self.quota_bytes.is_some() {
            let others = self.bytes_excluding(key)?;
            check_quota(self.quota_bytes, others, key, value)?;
        }

        // Write to a temp file, then rename over the target
        let temp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        fs::write(&temp_path, value)?;
        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(VALUE_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            match decode_key(stem) {
                Some(key) => keys.push(key),
                None => tracing::warn!("Skipping unrecognised file {}", path.display()),
            }
        }

        Ok(keys)
    }
}

fn is_safe_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.')
}

/// Turn a key into a portable file stem, percent-encoding anything unusual
fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        if is_safe_byte(byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

fn decode_key(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = stem.get(i + 1..i + 3)?;
                decoded.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            byte if is_safe_byte(byte) => {
                decoded.push(byte);
                i += 1;
            }
            _ => return None,
        }
    }

    let key = String::from_utf8(decoded).ok()?;
    // Only accept the spelling encode_key produces, so get_item finds the file
    (encode_key(&key) == stem).then_some(key)
}
