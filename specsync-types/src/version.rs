use crate::change::Classification;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Semantic version `major.minor.patch`.
///
/// Field order matters: the derived `Ord` is the lexicographic
/// major/minor/patch ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub const INITIAL: Version = Version::new(1, 0, 0);

    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn bump(self, bump: Bump) -> Self {
        match bump {
            Bump::Major => Version::new(self.major.saturating_add(1), 0, 0),
            Bump::Minor => Version::new(self.major, self.minor.saturating_add(1), 0),
            Bump::Patch => Version::new(self.major, self.minor, self.patch.saturating_add(1)),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version {input:?}: expected major.minor.patch")]
pub struct ParseVersionError {
    pub input: String,
}

impl FromStr for Version {
    type Err = ParseVersionError;

    /// Accepts `1.2.3` and `v1.2.3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseVersionError {
            input: s.to_string(),
        };
        let trimmed = s.trim();
        let body = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let mut parts = body.split('.');
        let mut next = || -> Result<u64, ParseVersionError> {
            let part = parts.next().ok_or_else(err)?;
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(err());
            }
            part.parse().map_err(|_| err())
        };
        let version = Version::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(err());
        }
        Ok(version)
    }
}

impl Serialize for Version {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Explicit version bump requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bump {
    Major,
    Minor,
    Patch,
}

impl Bump {
    /// The bump implied by an aggregate classification.
    pub fn for_classification(classification: Classification) -> Self {
        match classification {
            Classification::Breaking => Bump::Major,
            Classification::NonBreaking => Bump::Minor,
            Classification::Informational => Bump::Patch,
        }
    }
}

/// Result of comparing two version records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionOrdering {
    Equal,
    ANewer,
    BNewer,
}

impl From<Ordering> for VersionOrdering {
    fn from(o: Ordering) -> Self {
        match o {
            Ordering::Equal => VersionOrdering::Equal,
            Ordering::Greater => VersionOrdering::ANewer,
            Ordering::Less => VersionOrdering::BNewer,
        }
    }
}

/// Pointer to the immutable stored document for a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRef {
    /// Store-relative location of the snapshot bytes.
    pub path: String,
    /// sha256 of the snapshot bytes as written.
    pub sha256: String,
}

/// One entry in a resource's append-only version history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub schema: String,
    pub name: String,
    pub version: Version,
    pub snapshot: SnapshotRef,
    /// Contract fingerprint of the snapshotted document.
    pub fingerprint: String,

    /// Aggregate classification of the diff that produced this version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,

    pub created_at: DateTime<Utc>,
}

impl VersionRecord {
    pub fn new(
        name: impl Into<String>,
        version: Version,
        snapshot: SnapshotRef,
        fingerprint: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            schema: crate::schema::SPECSYNC_VERSION_RECORD_V1.to_string(),
            name: name.into(),
            version,
            snapshot,
            fingerprint: fingerprint.into(),
            classification: None,
            created_at,
        }
    }
}

/// One row of the compatibility matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityEntry {
    pub name: String,
    pub version: Version,
    /// Highest version recorded for the resource.
    pub is_latest: bool,
    /// Target of the resource's current pointer.
    pub is_current: bool,
    /// Major differs from the first recorded version's major.
    pub has_breaking_changes: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_and_without_prefix() {
        assert_eq!("1.2.3".parse::<Version>().unwrap(), Version::new(1, 2, 3));
        assert_eq!("v10.0.7".parse::<Version>().unwrap(), Version::new(10, 0, 7));
    }

    #[test]
    fn rejects_malformed() {
        for bad in ["", "1", "1.2", "1.2.3.4", "1.x.3", "-1.2.3", "1..3", "1.2.+3"] {
            assert!(bad.parse::<Version>().is_err(), "{bad:?}");
        }
    }

    #[test]
    fn ordering_is_lexicographic() {
        assert!(Version::new(2, 0, 0) > Version::new(1, 99, 99));
        assert!(Version::new(1, 3, 0) > Version::new(1, 2, 9));
        assert!(Version::new(1, 2, 4) > Version::new(1, 2, 3));
    }

    #[test]
    fn bump_resets_lower_components() {
        let v = Version::new(1, 2, 3);
        assert_eq!(v.bump(Bump::Major), Version::new(2, 0, 0));
        assert_eq!(v.bump(Bump::Minor), Version::new(1, 3, 0));
        assert_eq!(v.bump(Bump::Patch), Version::new(1, 2, 4));
    }

    #[test]
    fn serializes_as_string() {
        let json = serde_json::to_value(Version::new(3, 1, 4)).unwrap();
        assert_eq!(json, serde_json::json!("3.1.4"));
        let back: Version = serde_json::from_value(json).unwrap();
        assert_eq!(back, Version::new(3, 1, 4));
    }
}
