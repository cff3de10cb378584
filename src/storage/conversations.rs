//! Conversation storage
//!
//! Each (user, organization) pair owns one serialized conversation list stored
//! under a namespaced, versioned key. Reads degrade to an empty list; writes
//! report failures as `StorageError` and never panic.
//!
//! Read-modify-write operations (`upsert`, `delete`, merge imports) are not
//! atomic. Two writers on the same scope resolve last-writer-wins.

use crate::storage::backend::StorageBackend;
use crate::storage::quota::{utf16_bytes, QuotaConfig, QuotaStatus};
use crate::storage::StorageError;
use crate::types::conversation::Conversation;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// Namespace prefix shared by every conversation key
pub const STORAGE_PREFIX: &str = "lorgan_chat_";
/// Storage format version embedded in every key
pub const STORAGE_VERSION: &str = "v1";
/// Organization placeholder for conversations outside any organization
pub const GLOBAL_SCOPE: &str = "global";

fn scope_name(organization_id: Option<&str>) -> &str {
    organization_id
        .filter(|org| !org.is_empty())
        .unwrap_or(GLOBAL_SCOPE)
}

/// Key under which one scope's conversation list is stored
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey(String);

impl StorageKey {
    /// Key for `user_id` within `organization_id` (or the global scope)
    pub fn for_scope(user_id: &str, organization_id: Option<&str>) -> Self {
        Self(format!(
            "{}{}",
            Self::user_prefix(user_id),
            scope_name(organization_id)
        ))
    }

    /// Prefix shared by all of a user's keys
    pub fn user_prefix(user_id: &str) -> String {
        format!("{STORAGE_PREFIX}{STORAGE_VERSION}_{user_id}_")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// How imported conversations combine with the stored ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportMode {
    /// The imported list replaces the scope
    #[default]
    Replace,
    /// Imported conversations first, then stored ones with other ids
    Merge,
}

/// File name suggested for a downloaded export
pub fn backup_file_name(
    user_id: &str,
    organization_id: Option<&str>,
    at: DateTime<Utc>,
) -> String {
    format!(
        "{STORAGE_PREFIX}{user_id}_{}_{}.json",
        scope_name(organization_id),
        at.format("%Y%m%d-%H%M%S")
    )
}

/// Scoped conversation list persistence over an injected backend
pub struct ConversationStore<B> {
    backend: B,
}

impl<B: StorageBackend> ConversationStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Load a scope's conversations
    ///
    /// Returns an empty list if nothing is stored or the data can't be read.
    pub fn load(&self, user_id: &str, organization_id: Option<&str>) -> Vec<Conversation> {
        match self.try_load(user_id, organization_id) {
            Ok(conversations) => conversations,
            Err(e) => {
                tracing::warn!(
                    "Failed to load conversations for {}, using empty list: {}",
                    StorageKey::for_scope(user_id, organization_id),
                    e
                );
                Vec::new()
            }
        }
    }

    /// Load with error propagation
    pub fn try_load(
        &self,
        user_id: &str,
        organization_id: Option<&str>,
    ) -> Result<Vec<Conversation>, StorageError> {
        let key = StorageKey::for_scope(user_id, organization_id);

        let Some(data) = self.backend.get_item(key.as_str())? else {
            return Ok(Vec::new());
        };
        if data.is_empty() {
            return Ok(Vec::new());
        }

        Ok(serde_json::from_str(&data)?)
    }

    /// Overwrite a scope with `conversations`
    pub fn save(
        &self,
        user_id: &str,
        organization_id: Option<&str>,
        conversations: &[Conversation],
    ) -> Result<(), StorageError> {
        let key = StorageKey::for_scope(user_id, organization_id);

        let result = serde_json::to_string(conversations)
            .map_err(StorageError::from)
            .and_then(|data| self.backend.set_item(key.as_str(), &data));

        match &result {
            Ok(()) => tracing::debug!("Saved {} conversations to {}", conversations.len(), key),
            Err(e) if e.is_quota_exceeded() => {
                tracing::warn!("Storage quota exceeded while saving {}: {}", key, e)
            }
            Err(e) => tracing::error!("Failed to save conversations to {}: {}", key, e),
        }

        result
    }

    /// Replace the conversation with the same id in place, or add it first
    pub fn upsert(
        &self,
        user_id: &str,
        organization_id: Option<&str>,
        conversation: Conversation,
    ) -> Result<(), StorageError> {
        let mut conversations = self.load(user_id, organization_id);

        match conversations.iter().position(|c| c.id == conversation.id) {
            Some(index) => conversations[index] = conversation,
            None => conversations.insert(0, conversation),
        }

        self.save(user_id, organization_id, &conversations)
    }

    /// Remove every conversation with `conversation_id`
    ///
    /// Deleting an unknown id still rewrites the list and succeeds.
    pub fn delete(
        &self,
        user_id: &str,
        organization_id: Option<&str>,
        conversation_id: &str,
    ) -> Result<(), StorageError> {
        let mut conversations = self.load(user_id, organization_id);
        conversations.retain(|c| c.id != conversation_id);

        self.save(user_id, organization_id, &conversations)
    }

    /// Remove the scope's record entirely
    pub fn clear(&self, user_id: &str, organization_id: Option<&str>) -> Result<(), StorageError> {
        let key = StorageKey::for_scope(user_id, organization_id);

        self.backend.remove_item(key.as_str()).map_err(|e| {
            tracing::error!("Failed to clear conversations at {}: {}", key, e);
            e
        })
    }

    /// All keys stored for `user_id`, across organizations
    pub fn list_scope_keys(&self, user_id: &str) -> BTreeSet<StorageKey> {
        let prefix = StorageKey::user_prefix(user_id);

        match self.backend.keys() {
            Ok(keys) => keys
                .into_iter()
                .filter(|key| key.starts_with(&prefix))
                .map(StorageKey)
                .collect(),
            Err(e) => {
                tracing::warn!("Failed to enumerate storage keys: {}", e);
                BTreeSet::new()
            }
        }
    }

    /// Approximate bytes used by `user_id`: two per UTF-16 code unit
    pub fn estimate_storage_bytes(&self, user_id: &str) -> u64 {
        self.list_scope_keys(user_id)
            .iter()
            .filter_map(|key| match self.backend.get_item(key.as_str()) {
                Ok(data) => data,
                Err(e) => {
                    tracing::warn!("Skipping unreadable key {}: {}", key, e);
                    None
                }
            })
            .map(|data| utf16_bytes(&data))
            .sum()
    }

    /// Usage of `user_id` measured against `quota`
    pub fn quota_status(&self, user_id: &str, quota: &QuotaConfig) -> QuotaStatus {
        quota.status(self.estimate_storage_bytes(user_id))
    }

    /// Pretty-printed JSON snapshot of a scope, for backups
    pub fn export_scope(&self, user_id: &str, organization_id: Option<&str>) -> String {
        let conversations = self.load(user_id, organization_id);

        serde_json::to_string_pretty(&conversations).unwrap_or_else(|e| {
            tracing::error!("Failed to serialize export: {}", e);
            "[]".to_string()
        })
    }

    /// Import a JSON conversation list
    ///
    /// The text must be a JSON array of conversations. In merge mode imported
    /// entries win on id collisions and come first, followed by the surviving
    /// stored entries in their previous order. On any error the stored scope is
    /// left untouched.
    pub fn import_scope(
        &self,
        user_id: &str,
        organization_id: Option<&str>,
        text: &str,
        mode: ImportMode,
    ) -> Result<(), StorageError> {
        let imported = parse_import(text).map_err(|e| {
            tracing::error!("Failed to import conversations: {}", e);
            e
        })?;

        let conversations = match mode {
            ImportMode::Replace => imported,
            ImportMode::Merge => {
                let existing = self.load(user_id, organization_id);
                merge_imported(imported, existing)
            }
        };

        tracing::info!(
            "Importing {} conversations into {}",
            conversations.len(),
            StorageKey::for_scope(user_id, organization_id)
        );
        self.save(user_id, organization_id, &conversations)
    }
}

fn parse_import(text: &str) -> Result<Vec<Conversation>, StorageError> {
    let value: Value = serde_json::from_str(text)?;
    if !value.is_array() {
        return Err(StorageError::InvalidFormat(
            "expected a JSON array of conversations".to_string(),
        ));
    }
    Ok(serde_json::from_value(value)?)
}

fn merge_imported(imported: Vec<Conversation>, existing: Vec<Conversation>) -> Vec<Conversation> {
    let imported_ids: HashSet<String> = imported.iter().map(|c| c.id.clone()).collect();

    let mut merged = imported;
    for conversation in existing {
        if !imported_ids.contains(&conversation.id) {
            merged.push(conversation);
        }
    }
    merged
}
