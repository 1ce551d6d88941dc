//! Version manager: immutable snapshots keyed by `(name, version)` and the
//! current-version pointer.

use crate::ports::{Clock, CreateOutcome, SnapshotStore};
use specsync_contract::{ContractDocument, ContractError};
use specsync_domain::{ChangeDetector, IncomparableDocuments};
use specsync_types::change::{ChangeSet, Classification};
use specsync_types::version::{
    Bump, CompatibilityEntry, SnapshotRef, Version, VersionOrdering, VersionRecord,
};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum VersionError {
    #[error("version {version} of {name:?} already exists; snapshots are immutable")]
    DuplicateVersion { name: String, version: Version },

    #[error("version {version} of {name:?} is lower than the latest version {latest}")]
    NotMonotonic {
        name: String,
        version: Version,
        latest: Version,
    },

    #[error("no snapshot of {name:?} at version {version}")]
    SnapshotNotFound { name: String, version: Version },

    #[error("{name:?} has no versions")]
    NoVersions { name: String },

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error(transparent)]
    Incomparable(#[from] IncomparableDocuments),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub struct VersionManager<'a> {
    store: &'a dyn SnapshotStore,
    clock: &'a dyn Clock,
}

impl<'a> VersionManager<'a> {
    pub fn new(store: &'a dyn SnapshotStore, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    /// Highest recorded version, if any.
    pub fn latest_version(&self, name: &str) -> Result<Option<Version>, VersionError> {
        Ok(self.store.versions(name)?.last().copied())
    }

    pub fn next_version(
        &self,
        name: &str,
        aggregate: Classification,
        explicit: Option<Bump>,
    ) -> Result<Version, VersionError> {
        let latest = self.latest_version(name)?;
        Ok(specsync_domain::next_version(
            latest.as_ref(),
            aggregate,
            explicit,
        ))
    }

    /// Persist `doc` as `version`. Never overwrites.
    pub fn create_snapshot(
        &self,
        doc: &ContractDocument,
        version: Version,
        classification: Option<Classification>,
    ) -> Result<VersionRecord, VersionError> {
        let name = doc.name();
        let existing = self.store.versions(name)?;
        if existing.contains(&version) {
            return Err(VersionError::DuplicateVersion {
                name: name.to_string(),
                version,
            });
        }
        if let Some(&latest) = existing.last()
            && version < latest
        {
            return Err(VersionError::NotMonotonic {
                name: name.to_string(),
                version,
                latest,
            });
        }

        let bytes = specsync_contract::serialize(doc)?;
        let location = match self.store.create(name, &version, &bytes)? {
            CreateOutcome::Created { location } => location,
            CreateOutcome::AlreadyExists => {
                return Err(VersionError::DuplicateVersion {
                    name: name.to_string(),
                    version,
                });
            }
        };

        let mut record = VersionRecord::new(
            name,
            version,
            SnapshotRef {
                path: location,
                sha256: specsync_hash::sha256_hex(&bytes),
            },
            doc.fingerprint(),
            self.clock.now(),
        );
        record.classification = classification;
        if let Err(e) = self.store.write_record(&record) {
            // Bytes without a record would claim the version forever.
            return Err(match self.store.discard(name, &version) {
                Ok(()) => e,
                Err(undo) => e.context(format!(
                    "discarding the partial snapshot of {name} v{version} also failed: {undo:#}"
                )),
            }
            .into());
        }
        info!(name, version = %version, "created snapshot");
        Ok(record)
    }

    /// Undo a [`create_snapshot`](Self::create_snapshot) whose surrounding
    /// operation failed, restoring the current pointer to `previous`.
    pub fn discard(
        &self,
        name: &str,
        version: &Version,
        previous: Option<&Version>,
    ) -> Result<(), VersionError> {
        match previous {
            Some(v) => self.store.set_current(name, v)?,
            None => self.store.clear_current(name)?,
        }
        self.store.discard(name, version)?;
        warn!(name, version = %version, "discarded snapshot");
        Ok(())
    }

    pub fn point_current(&self, name: &str, version: &Version) -> Result<(), VersionError> {
        if self.store.read(name, version)?.is_none() {
            return Err(VersionError::SnapshotNotFound {
                name: name.to_string(),
                version: *version,
            });
        }
        self.store.set_current(name, version)?;
        info!(name, version = %version, "pointed current");
        Ok(())
    }

    pub fn record(&self, name: &str, version: &Version) -> Result<VersionRecord, VersionError> {
        self.store
            .record(name, version)?
            .ok_or_else(|| VersionError::SnapshotNotFound {
                name: name.to_string(),
                version: *version,
            })
    }

    /// Every record of `name`, ascending.
    pub fn list(&self, name: &str) -> Result<Vec<VersionRecord>, VersionError> {
        self.store
            .versions(name)?
            .iter()
            .map(|v| self.record(name, v))
            .collect()
    }

    pub fn current_version(&self, name: &str) -> Result<Option<Version>, VersionError> {
        Ok(self.store.current(name)?)
    }

    pub fn current_record(&self, name: &str) -> Result<Option<VersionRecord>, VersionError> {
        match self.store.current(name)? {
            Some(v) => self.record(name, &v).map(Some),
            None => Ok(None),
        }
    }

    pub fn load_snapshot(
        &self,
        name: &str,
        version: &Version,
    ) -> Result<ContractDocument, VersionError> {
        let bytes =
            self.store
                .read(name, version)?
                .ok_or_else(|| VersionError::SnapshotNotFound {
                    name: name.to_string(),
                    version: *version,
                })?;
        Ok(specsync_contract::load(name, &bytes)?)
    }

    /// The document the serving layer should load: the current pointer's
    /// snapshot, never an uncommitted edit.
    pub fn current_snapshot(&self, name: &str) -> Result<ContractDocument, VersionError> {
        let version = self
            .store
            .current(name)?
            .ok_or_else(|| VersionError::NoVersions {
                name: name.to_string(),
            })?;
        self.load_snapshot(name, &version)
    }

    pub fn compare(&self, a: &VersionRecord, b: &VersionRecord) -> VersionOrdering {
        specsync_domain::compare(&a.version, &b.version)
    }

    /// Re-run the change detector between two stored snapshots.
    pub fn diff_summary(
        &self,
        name: &str,
        a: &Version,
        b: &Version,
    ) -> Result<ChangeSet, VersionError> {
        let old = self.load_snapshot(name, a)?;
        let new = self.load_snapshot(name, b)?;
        Ok(ChangeDetector::new().diff(&old, &new)?)
    }

    /// One row per stored version of every resource.
    pub fn compatibility_matrix(&self) -> Result<Vec<CompatibilityEntry>, VersionError> {
        let mut rows = Vec::new();
        for name in self.store.names()? {
            let records = self.list(&name)?;
            let current = self.store.current(&name)?;
            let (Some(first), Some(last)) = (records.first(), records.last()) else {
                continue;
            };
            let (first_major, latest) = (first.version.major, last.version);
            for r in &records {
                rows.push(CompatibilityEntry {
                    name: name.clone(),
                    version: r.version,
                    is_latest: r.version == latest,
                    is_current: Some(r.version) == current,
                    has_breaking_changes: r.version.major != first_major,
                    created_at: r.created_at,
                });
            }
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemorySnapshotStore;
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};

    const DOC: &str = "paths:\n  /ping:\n    get:\n      operationId: ping\n      responses:\n        '200':\n          description: pong\n";

    fn doc() -> ContractDocument {
        specsync_contract::load("ping", DOC.as_bytes()).unwrap()
    }

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn first_snapshot_and_pointer() {
        let store = InMemorySnapshotStore::new();
        let clock = clock();
        let vm = VersionManager::new(&store, &clock);

        let v = vm
            .next_version("ping", Classification::Informational, None)
            .unwrap();
        assert_eq!(v, Version::INITIAL);
        let rec = vm.create_snapshot(&doc(), v, None).unwrap();
        assert_eq!(rec.snapshot.path, "snapshots/ping/v1.0.0.yaml");
        assert_eq!(rec.fingerprint, doc().fingerprint());

        assert!(matches!(
            vm.current_snapshot("ping").unwrap_err(),
            VersionError::NoVersions { .. }
        ));
        vm.point_current("ping", &v).unwrap();
        assert_eq!(vm.current_snapshot("ping").unwrap(), doc());
        assert_eq!(vm.current_record("ping").unwrap(), Some(rec));
    }

    #[test]
    fn lower_version_is_rejected() {
        let store = InMemorySnapshotStore::new();
        let clock = clock();
        let vm = VersionManager::new(&store, &clock);
        vm.create_snapshot(&doc(), Version::new(2, 0, 0), None)
            .unwrap();
        let err = vm
            .create_snapshot(&doc(), Version::new(1, 5, 0), None)
            .unwrap_err();
        assert!(matches!(err, VersionError::NotMonotonic { .. }));
    }

    #[test]
    fn pointing_at_missing_version_fails() {
        let store = InMemorySnapshotStore::new();
        let clock = clock();
        let vm = VersionManager::new(&store, &clock);
        let err = vm.point_current("ping", &Version::INITIAL).unwrap_err();
        assert!(matches!(err, VersionError::SnapshotNotFound { .. }));
    }

    #[test]
    fn matrix_flags_major_changes() {
        let store = InMemorySnapshotStore::new();
        let clock = clock();
        let vm = VersionManager::new(&store, &clock);
        for v in [
            Version::new(1, 0, 0),
            Version::new(1, 1, 0),
            Version::new(2, 0, 0),
        ] {
            vm.create_snapshot(&doc(), v, None).unwrap();
        }
        vm.point_current("ping", &Version::new(1, 1, 0)).unwrap();

        let rows = vm.compatibility_matrix().unwrap();
        let flags: Vec<(String, bool, bool, bool)> = rows
            .iter()
            .map(|r| {
                (
                    r.version.to_string(),
                    r.is_latest,
                    r.is_current,
                    r.has_breaking_changes,
                )
            })
            .collect();
        assert_eq!(
            flags,
            vec![
                ("1.0.0".to_string(), false, false, false),
                ("1.1.0".to_string(), false, true, false),
                ("2.0.0".to_string(), true, false, true),
            ]
        );
    }

    /// Snapshot store whose record writes always fail.
    struct RecordlessStore(InMemorySnapshotStore);

    impl SnapshotStore for RecordlessStore {
        fn create(
            &self,
            name: &str,
            version: &Version,
            bytes: &[u8],
        ) -> anyhow::Result<CreateOutcome> {
            self.0.create(name, version, bytes)
        }
        fn write_record(&self, _: &VersionRecord) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
        fn read(&self, name: &str, version: &Version) -> anyhow::Result<Option<Vec<u8>>> {
            self.0.read(name, version)
        }
        fn record(&self, name: &str, version: &Version) -> anyhow::Result<Option<VersionRecord>> {
            self.0.record(name, version)
        }
        fn versions(&self, name: &str) -> anyhow::Result<Vec<Version>> {
            self.0.versions(name)
        }
        fn current(&self, name: &str) -> anyhow::Result<Option<Version>> {
            self.0.current(name)
        }
        fn set_current(&self, name: &str, version: &Version) -> anyhow::Result<()> {
            self.0.set_current(name, version)
        }
        fn clear_current(&self, name: &str) -> anyhow::Result<()> {
            self.0.clear_current(name)
        }
        fn discard(&self, name: &str, version: &Version) -> anyhow::Result<()> {
            self.0.discard(name, version)
        }
        fn names(&self) -> anyhow::Result<Vec<String>> {
            self.0.names()
        }
    }

    #[test]
    fn failed_record_write_leaves_no_version() {
        let store = RecordlessStore(InMemorySnapshotStore::new());
        let clock = clock();
        let vm = VersionManager::new(&store, &clock);

        let err = vm
            .create_snapshot(&doc(), Version::INITIAL, None)
            .unwrap_err();
        assert!(format!("{err:#}").contains("disk full"));
        assert_eq!(vm.latest_version("ping").unwrap(), None);

        // The version number is still free once the store recovers.
        let vm = VersionManager::new(&store.0, &clock);
        vm.create_snapshot(&doc(), Version::INITIAL, None).unwrap();
    }

    #[test]
    fn discard_restores_previous_pointer() {
        let store = InMemorySnapshotStore::new();
        let clock = clock();
        let vm = VersionManager::new(&store, &clock);
        vm.create_snapshot(&doc(), Version::INITIAL, None).unwrap();
        vm.point_current("ping", &Version::INITIAL).unwrap();
        let next = Version::new(1, 0, 1);
        vm.create_snapshot(&doc(), next, None).unwrap();
        vm.point_current("ping", &next).unwrap();

        vm.discard("ping", &next, Some(&Version::INITIAL)).unwrap();
        assert_eq!(vm.latest_version("ping").unwrap(), Some(Version::INITIAL));
        assert_eq!(vm.current_version("ping").unwrap(), Some(Version::INITIAL));

        vm.discard("ping", &Version::INITIAL, None).unwrap();
        assert_eq!(vm.current_version("ping").unwrap(), None);
        assert!(vm.list("ping").unwrap().is_empty());
    }
}
