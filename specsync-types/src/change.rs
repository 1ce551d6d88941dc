use serde::{Deserialize, Serialize};
use std::fmt;

/// Compatibility impact of a change.
///
/// Variants are declared from least to most severe so that `Ord`/`max`
/// yield the aggregate classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Classification {
    Informational,
    NonBreaking,
    Breaking,
}

impl Classification {
    pub fn is_breaking(self) -> bool {
        matches!(self, Classification::Breaking)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Classification::Informational => "informational",
            Classification::NonBreaking => "non-breaking",
            Classification::Breaking => "breaking",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeCategory {
    Addition,
    Removal,
    Modification,
}

/// Which side of the contract a change lives on. Request covers
/// parameters and request bodies; component schemas are shared by both
/// directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Document,
    Route,
    Operation,
    Request,
    Response,
    Component,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeEffect {
    /// New type accepts every value of the old one.
    Widened,
    /// New type accepts a strict subset of the old one.
    Narrowed,
    Incompatible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintEffect {
    Loosened,
    Tightened,
    Changed,
}

/// Location of a change inside a contract document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangePath(pub Vec<String>);

impl ChangePath {
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn dotted(&self) -> String {
        self.0.join(".")
    }
}

impl fmt::Display for ChangePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dotted())
    }
}

impl<S: Into<String>> FromIterator<S> for ChangePath {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        ChangePath(iter.into_iter().map(Into::into).collect())
    }
}

/// What changed. The variant determines the change category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeDetail {
    RouteAdded,
    RouteRemoved,
    /// Routes present in both documents appear in a different order.
    RouteOrderChanged {
        from: Vec<String>,
        to: Vec<String>,
    },
    OperationAdded {
        method: String,
    },
    OperationRemoved {
        method: String,
    },
    OperationIdChanged {
        from: String,
        to: String,
    },
    ParameterAdded {
        location: String,
        required: bool,
        has_default: bool,
    },
    ParameterRemoved {
        location: String,
        required: bool,
    },
    ParameterRequiredChanged {
        from: bool,
        to: bool,
    },
    RequestBodyAdded {
        required: bool,
    },
    RequestBodyRemoved {
        required: bool,
    },
    RequestBodyRequiredChanged {
        from: bool,
        to: bool,
    },
    ResponseAdded {
        status: String,
    },
    ResponseRemoved {
        status: String,
    },
    SchemaAdded,
    SchemaRemoved,
    PropertyAdded {
        required: bool,
        has_default: bool,
    },
    PropertyRemoved {
        required: bool,
    },
    PropertyRequiredChanged {
        from: bool,
        to: bool,
    },
    TypeChanged {
        from: String,
        to: String,
        effect: TypeEffect,
    },
    ReferenceChanged {
        from: String,
        to: String,
    },
    ConstraintChanged {
        constraint: String,
        #[serde(default)]
        from: serde_json::Value,
        #[serde(default)]
        to: serde_json::Value,
        effect: ConstraintEffect,
    },
    DefaultChanged {
        #[serde(default)]
        from: serde_json::Value,
        #[serde(default)]
        to: serde_json::Value,
    },
    ComponentAdded,
    ComponentRemoved,
    TextChanged {
        field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<String>,
    },
    ExampleChanged {
        #[serde(default)]
        from: serde_json::Value,
        #[serde(default)]
        to: serde_json::Value,
    },
}

impl ChangeDetail {
    pub fn category(&self) -> ChangeCategory {
        use ChangeDetail::*;
        match self {
            RouteAdded
            | OperationAdded { .. }
            | ParameterAdded { .. }
            | RequestBodyAdded { .. }
            | ResponseAdded { .. }
            | SchemaAdded
            | PropertyAdded { .. }
            | ComponentAdded => ChangeCategory::Addition,
            RouteRemoved
            | OperationRemoved { .. }
            | ParameterRemoved { .. }
            | RequestBodyRemoved { .. }
            | ResponseRemoved { .. }
            | SchemaRemoved
            | PropertyRemoved { .. }
            | ComponentRemoved => ChangeCategory::Removal,
            OperationIdChanged { .. }
            | ParameterRequiredChanged { .. }
            | RequestBodyRequiredChanged { .. }
            | PropertyRequiredChanged { .. }
            | TypeChanged { .. }
            | ReferenceChanged { .. }
            | ConstraintChanged { .. }
            | DefaultChanged { .. }
            | RouteOrderChanged { .. }
            | TextChanged { .. }
            | ExampleChanged { .. } => ChangeCategory::Modification,
        }
    }
}

/// A single classified difference between two contract documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub path: ChangePath,
    pub scope: Scope,
    pub detail: ChangeDetail,
    pub classification: Classification,
    /// Id of the classification rule that matched.
    pub rule: String,
    pub message: String,
}

impl Change {
    pub fn category(&self) -> ChangeCategory {
        self.detail.category()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeCounts {
    pub breaking: u64,
    pub non_breaking: u64,
    pub informational: u64,
}

impl ChangeCounts {
    pub fn total(&self) -> u64 {
        self.breaking + self.non_breaking + self.informational
    }
}

/// Result of diffing two documents of the same resource.
///
/// Each vector is in document traversal order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub schema: String,
    pub name: String,
    pub old_fingerprint: String,
    pub new_fingerprint: String,

    #[serde(default)]
    pub additions: Vec<Change>,

    #[serde(default)]
    pub removals: Vec<Change>,

    #[serde(default)]
    pub modifications: Vec<Change>,
}

impl ChangeSet {
    pub fn empty(
        name: impl Into<String>,
        old_fingerprint: impl Into<String>,
        new_fingerprint: impl Into<String>,
    ) -> Self {
        Self {
            schema: crate::schema::SPECSYNC_CHANGESET_V1.to_string(),
            name: name.into(),
            old_fingerprint: old_fingerprint.into(),
            new_fingerprint: new_fingerprint.into(),
            additions: vec![],
            removals: vec![],
            modifications: vec![],
        }
    }

    /// Partition changes (already in traversal order) by category, keeping
    /// relative order within each category.
    pub fn from_changes(
        name: impl Into<String>,
        old_fingerprint: impl Into<String>,
        new_fingerprint: impl Into<String>,
        changes: impl IntoIterator<Item = Change>,
    ) -> Self {
        let mut set = Self::empty(name, old_fingerprint, new_fingerprint);
        for change in changes {
            match change.category() {
                ChangeCategory::Addition => set.additions.push(change),
                ChangeCategory::Removal => set.removals.push(change),
                ChangeCategory::Modification => set.modifications.push(change),
            }
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty() && self.modifications.is_empty()
    }

    pub fn len(&self) -> usize {
        self.additions.len() + self.removals.len() + self.modifications.len()
    }

    /// Additions, then removals, then modifications.
    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.additions
            .iter()
            .chain(self.removals.iter())
            .chain(self.modifications.iter())
    }

    /// Most severe classification present; informational when empty.
    pub fn aggregate(&self) -> Classification {
        self.iter()
            .map(|c| c.classification)
            .max()
            .unwrap_or(Classification::Informational)
    }

    pub fn has_breaking(&self) -> bool {
        self.iter().any(|c| c.classification.is_breaking())
    }

    pub fn breaking(&self) -> impl Iterator<Item = &Change> {
        self.iter().filter(|c| c.classification.is_breaking())
    }

    pub fn counts(&self) -> ChangeCounts {
        let mut counts = ChangeCounts::default();
        for c in self.iter() {
            match c.classification {
                Classification::Breaking => counts.breaking += 1,
                Classification::NonBreaking => counts.non_breaking += 1,
                Classification::Informational => counts.informational += 1,
            }
        }
        counts
    }

    /// One-line human summary, e.g. `1 breaking change, 2 non-breaking changes`.
    pub fn summary(&self) -> String {
        let counts = self.counts();
        if counts.total() == 0 {
            return "no changes".to_string();
        }
        let mut parts = Vec::new();
        for (n, label) in [
            (counts.breaking, "breaking"),
            (counts.non_breaking, "non-breaking"),
            (counts.informational, "informational"),
        ] {
            if n > 0 {
                let noun = if n == 1 { "change" } else { "changes" };
                parts.push(format!("{n} {label} {noun}"));
            }
        }
        parts.join(", ")
    }
}
