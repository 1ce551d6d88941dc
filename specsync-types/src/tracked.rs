use crate::version::Version;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sync state of a tracked resource.
///
/// ```text
/// in_sync --edit--> pending --breaking diff--> breaking_pending
///    ^                 |                             |
///    +----- sync ------+------ sync (forced) --------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    InSync,
    Pending,
    BreakingPending,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncStatus::InSync => "in_sync",
            SyncStatus::Pending => "pending",
            SyncStatus::BreakingPending => "breaking_pending",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-resource record owned by the fingerprint tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedSpec {
    pub schema: String,
    pub name: String,
    /// Fingerprint of the contract as last versioned or synced.
    pub last_fingerprint: String,

    /// Version the generated artifacts were last synced to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_version: Option<Version>,

    pub sync_status: SyncStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<DateTime<Utc>>,

    /// Incremented on every write; compare-and-swap key.
    #[serde(default)]
    pub revision: u64,
}

impl TrackedSpec {
    /// A freshly discovered resource: nothing generated yet.
    pub fn new(name: impl Into<String>, fingerprint: impl Into<String>) -> Self {
        Self {
            schema: crate::schema::SPECSYNC_TRACKED_V1.to_string(),
            name: name.into(),
            last_fingerprint: fingerprint.into(),
            current_version: None,
            sync_status: SyncStatus::Pending,
            last_synced_at: None,
            revision: 0,
        }
    }
}
