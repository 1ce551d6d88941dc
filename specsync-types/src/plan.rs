use crate::change::ChangeCounts;
use crate::migration::MigrationPlan;
use crate::version::Version;
use serde::{Deserialize, Serialize};

/// An ordered, previewable set of actions reconciling generated artifacts
/// with a resource's latest version.
///
/// Plans carry no timestamps: identical inputs yield identical plans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPlan {
    pub schema: String,
    pub name: String,

    /// Version the artifacts currently reflect, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_version: Option<Version>,

    pub target_version: Version,
    pub target_fingerprint: String,

    #[serde(default)]
    pub requires_acknowledgement: bool,

    #[serde(default)]
    pub actions: Vec<SyncAction>,

    #[serde(default)]
    pub changes: ChangeCounts,
}

impl SyncPlan {
    pub fn new(
        name: impl Into<String>,
        target_version: Version,
        target_fingerprint: impl Into<String>,
    ) -> Self {
        Self {
            schema: crate::schema::SPECSYNC_PLAN_V1.to_string(),
            name: name.into(),
            from_version: None,
            target_version,
            target_fingerprint: target_fingerprint.into(),
            requires_acknowledgement: false,
            actions: vec![],
            changes: ChangeCounts::default(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.actions.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncAction {
    /// Deterministic id (UUID v5).
    pub id: String,
    pub kind: SyncActionKind,
    pub target: ArtifactTarget,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncActionKind {
    Generate,
    Update,
    Backup,
    WriteMigrationGuide {
        file_name: String,
        migration: MigrationPlan,
    },
}

impl SyncActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncActionKind::Generate => "generate",
            SyncActionKind::Update => "update",
            SyncActionKind::Backup => "backup",
            SyncActionKind::WriteMigrationGuide { .. } => "write_migration_guide",
        }
    }
}

/// Identifier of the artifact an action touches, e.g. `generated/users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactTarget {
    pub id: String,
}
