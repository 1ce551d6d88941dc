//! Port traits abstracting all persistence away from the tracker, the
//! version manager and the executor.

use chrono::{DateTime, Utc};
use specsync_types::result::BackupRef;
use specsync_types::tracked::TrackedSpec;
use specsync_types::version::{Version, VersionRecord};
use std::collections::BTreeMap;

/// File name to contents for one resource's generated artifacts.
pub type ArtifactSet = BTreeMap<String, Vec<u8>>;

/// Keyed store of [`TrackedSpec`] records.
pub trait MetadataStore: Send + Sync {
    fn get(&self, name: &str) -> anyhow::Result<Option<TrackedSpec>>;

    /// Unconditional write.
    fn set(&self, spec: &TrackedSpec) -> anyhow::Result<()>;

    /// Write `next` only if the stored record's revision equals `expected`
    /// (`None`: no record exists). Returns `false` when the expectation
    /// did not hold and nothing was written.
    fn compare_and_swap(
        &self,
        name: &str,
        expected: Option<u64>,
        next: &TrackedSpec,
    ) -> anyhow::Result<bool>;

    /// Returns whether a record existed.
    fn remove(&self, name: &str) -> anyhow::Result<bool>;

    /// Tracked names, sorted.
    fn names(&self) -> anyhow::Result<Vec<String>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// Written; `location` is the store-relative path of the bytes.
    Created { location: String },
    AlreadyExists,
}

/// Append-only snapshot store keyed by `(name, version)`, plus the
/// per-resource current pointer.
pub trait SnapshotStore: Send + Sync {
    /// Write snapshot bytes with create-new semantics.
    fn create(&self, name: &str, version: &Version, bytes: &[u8])
    -> anyhow::Result<CreateOutcome>;

    fn write_record(&self, record: &VersionRecord) -> anyhow::Result<()>;

    fn read(&self, name: &str, version: &Version) -> anyhow::Result<Option<Vec<u8>>>;

    fn record(&self, name: &str, version: &Version) -> anyhow::Result<Option<VersionRecord>>;

    /// Versions with a snapshot, ascending.
    fn versions(&self, name: &str) -> anyhow::Result<Vec<Version>>;

    fn current(&self, name: &str) -> anyhow::Result<Option<Version>>;

    fn set_current(&self, name: &str, version: &Version) -> anyhow::Result<()>;

    fn clear_current(&self, name: &str) -> anyhow::Result<()>;

    /// Remove the snapshot bytes and record of a version whose creation
    /// did not complete. Missing pieces are not an error.
    fn discard(&self, name: &str, version: &Version) -> anyhow::Result<()>;

    /// Names with at least one snapshot, sorted.
    fn names(&self) -> anyhow::Result<Vec<String>>;
}

/// Generated artifacts, their backups and migration guides.
pub trait ArtifactStore: Send + Sync {
    /// Identifier used as plan action target, e.g. `generated/users`.
    fn artifact_id(&self, name: &str) -> String;

    /// `None` when nothing has been generated for `name`.
    fn read_set(&self, name: &str) -> anyhow::Result<Option<ArtifactSet>>;

    /// Replace the whole set in one step.
    fn replace_set(&self, name: &str, files: &ArtifactSet) -> anyhow::Result<()>;

    fn remove_set(&self, name: &str) -> anyhow::Result<()>;

    /// Copy `files` to a new, never reused backup location.
    fn backup(&self, name: &str, files: &ArtifactSet, at: DateTime<Utc>)
    -> anyhow::Result<BackupRef>;

    fn read_backup(&self, backup: &BackupRef) -> anyhow::Result<ArtifactSet>;

    /// Returns the location written.
    fn write_guide(&self, name: &str, file_name: &str, contents: &[u8]) -> anyhow::Result<String>;

    fn remove_guide(&self, location: &str) -> anyhow::Result<()>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
