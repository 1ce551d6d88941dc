use crate::version::Version;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effort {
    Low,
    Medium,
    High,
}

impl Effort {
    pub fn as_str(self) -> &'static str {
        match self {
            Effort::Low => "low",
            Effort::Medium => "medium",
            Effort::High => "high",
        }
    }
}

/// Consumer-facing guidance for moving between two versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationPlan {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_version: Option<Version>,

    pub to_version: Version,

    /// `path: message` for each breaking change.
    #[serde(default)]
    pub breaking_changes: Vec<String>,

    #[serde(default)]
    pub steps: Vec<String>,

    pub requires_manual_intervention: bool,
    pub estimated_effort: Effort,
}
