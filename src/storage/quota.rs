//! Storage quota accounting
//!
//! Byte estimates follow the browser convention of two bytes per UTF-16 code
//! unit. They are approximations, not an exact account of on-disk size.

use crate::types::conversation::Conversation;
use serde::{Deserialize, Serialize};

/// Default per-user quota (100 MiB)
pub const DEFAULT_QUOTA_BYTES: u64 = 100 * 1024 * 1024;

/// Estimated stored size of `text`
pub fn utf16_bytes(text: &str) -> u64 {
    text.encode_utf16().count() as u64 * 2
}

/// Quota size and warning thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Quota per user in bytes (0 disables quota checks)
    pub quota_bytes: u64,
    /// Fraction of the quota at which a warning is raised
    pub warning_threshold: f64,
    /// Fraction of the quota at which the warning becomes critical
    pub critical_threshold: f64,
    /// Fraction of the quota considered full
    pub max_threshold: f64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            quota_bytes: DEFAULT_QUOTA_BYTES,
            warning_threshold: 0.8,
            critical_threshold: 0.95,
            max_threshold: 1.0,
        }
    }
}

/// Severity of storage usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageLevel {
    Warning,
    Critical,
    Full,
}

impl std::fmt::Display for StorageLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageLevel::Warning => write!(f, "warning"),
            StorageLevel::Critical => write!(f, "critical"),
            StorageLevel::Full => write!(f, "full"),
        }
    }
}

impl QuotaConfig {
    /// A config with the default thresholds and a custom quota
    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            quota_bytes,
            ..Self::default()
        }
    }

    fn ratio(&self, used_bytes: u64) -> Option<f64> {
        if self.quota_bytes == 0 {
            return None;
        }
        Some(used_bytes as f64 / self.quota_bytes as f64)
    }

    /// Usage as a percentage of the quota, capped at 100
    pub fn percentage(&self, used_bytes: u64) -> f64 {
        self.ratio(used_bytes)
            .map(|ratio| (ratio * 100.0).min(100.0))
            .unwrap_or(0.0)
    }

    pub fn level(&self, used_bytes: u64) -> Option<StorageLevel> {
        let ratio = self.ratio(used_bytes)?;
        if ratio >= self.max_threshold {
            Some(StorageLevel::Full)
        } else if ratio >= self.critical_threshold {
            Some(StorageLevel::Critical)
        } else if ratio >= self.warning_threshold {
            Some(StorageLevel::Warning)
        } else {
            None
        }
    }

    pub fn is_warning(&self, used_bytes: u64) -> bool {
        self.ratio(used_bytes).is_some_and(|ratio| {
            ratio >= self.warning_threshold && ratio < self.critical_threshold
        })
    }

    pub fn is_critical(&self, used_bytes: u64) -> bool {
        self.ratio(used_bytes)
            .is_some_and(|ratio| ratio >= self.critical_threshold && ratio < self.max_threshold)
    }

    pub fn is_full(&self, used_bytes: u64) -> bool {
        self.ratio(used_bytes)
            .is_some_and(|ratio| ratio >= self.max_threshold)
    }

    pub fn remaining(&self, used_bytes: u64) -> u64 {
        self.quota_bytes.saturating_sub(used_bytes)
    }

    /// Snapshot of usage against this config
    pub fn status(&self, used_bytes: u64) -> QuotaStatus {
        QuotaStatus {
            used_bytes,
            quota_bytes: self.quota_bytes,
            percentage: self.percentage(used_bytes),
            remaining_bytes: self.remaining(used_bytes),
            level: self.level(used_bytes),
        }
    }
}

/// Usage report for one user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuotaStatus {
    pub used_bytes: u64,
    pub quota_bytes: u64,
    pub percentage: f64,
    pub remaining_bytes: u64,
    pub level: Option<StorageLevel>,
}

/// Estimate usage from message contents plus uploaded document sizes
pub fn calculate_usage<I>(conversations: &[Conversation], document_sizes: I) -> u64
where
    I: IntoIterator<Item = u64>,
{
    let messages: u64 = conversations
        .iter()
        .flat_map(|conversation| conversation.message_contents())
        .map(utf16_bytes)
        .sum();

    messages + document_sizes.into_iter().sum::<u64>()
}

/// Format a byte count for display, e.g. `1.5 KB`
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}
