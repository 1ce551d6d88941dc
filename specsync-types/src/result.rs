use crate::version::Version;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Execution log of a sync plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub schema: String,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_version: Option<Version>,

    pub version: Version,
    pub status: SyncOutcome,

    #[serde(default)]
    pub forced: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<BackupRef>,

    #[serde(default)]
    pub actions: Vec<ActionResult>,

    pub started_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl SyncResult {
    pub fn new(name: impl Into<String>, version: Version, started_at: DateTime<Utc>) -> Self {
        Self {
            schema: crate::schema::SPECSYNC_RESULT_V1.to_string(),
            name: name.into(),
            from_version: None,
            version,
            status: SyncOutcome::NoOp,
            forced: false,
            backup: None,
            actions: vec![],
            started_at,
            ended_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    Applied,
    NoOp,
    RolledBack,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    pub action_id: String,
    pub kind: String,
    pub target: String,
    pub status: ActionStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default)]
    pub files_written: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Applied,
    Failed,
    RolledBack,
    Skipped,
}

/// Location of an append-only backup of a resource's artifact set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRef {
    pub name: String,
    /// Unique, collision-free id (UTC timestamp plus optional sequence suffix).
    pub id: String,
    pub location: String,
    pub files: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(SyncOutcome::RolledBack).unwrap(),
            serde_json::json!("rolled_back")
        );
        assert_eq!(
            serde_json::to_value(ActionStatus::Applied).unwrap(),
            serde_json::json!("applied")
        );
    }

    #[test]
    fn result_omits_absent_backup() {
        let r = SyncResult::new("users", Version::new(1, 0, 0), Utc::now());
        let v = serde_json::to_value(&r).unwrap();
        assert!(v.get("backup").is_none());
        assert_eq!(v["status"], "no_op");
    }
}
