//! In-memory port implementations for embedding and testing.

use crate::ports::{ArtifactSet, ArtifactStore, CreateOutcome, MetadataStore, SnapshotStore};
use chrono::{DateTime, Utc};
use specsync_types::result::BackupRef;
use specsync_types::tracked::TrackedSpec;
use specsync_types::version::{Version, VersionRecord};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

fn guard<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    specs: Mutex<BTreeMap<String, TrackedSpec>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn get(&self, name: &str) -> anyhow::Result<Option<TrackedSpec>> {
        Ok(guard(&self.specs).get(name).cloned())
    }

    fn set(&self, spec: &TrackedSpec) -> anyhow::Result<()> {
        guard(&self.specs).insert(spec.name.clone(), spec.clone());
        Ok(())
    }

    fn compare_and_swap(
        &self,
        name: &str,
        expected: Option<u64>,
        next: &TrackedSpec,
    ) -> anyhow::Result<bool> {
        let mut specs = guard(&self.specs);
        if specs.get(name).map(|s| s.revision) != expected {
            return Ok(false);
        }
        specs.insert(name.to_string(), next.clone());
        Ok(true)
    }

    fn remove(&self, name: &str) -> anyhow::Result<bool> {
        Ok(guard(&self.specs).remove(name).is_some())
    }

    fn names(&self) -> anyhow::Result<Vec<String>> {
        Ok(guard(&self.specs).keys().cloned().collect())
    }
}

#[derive(Debug, Default)]
struct Snapshots {
    bytes: BTreeMap<(String, Version), Vec<u8>>,
    records: BTreeMap<(String, Version), VersionRecord>,
    current: BTreeMap<String, Version>,
}

#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    inner: Mutex<Snapshots>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn create(
        &self,
        name: &str,
        version: &Version,
        bytes: &[u8],
    ) -> anyhow::Result<CreateOutcome> {
        let mut inner = guard(&self.inner);
        let key = (name.to_string(), *version);
        if inner.bytes.contains_key(&key) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        inner.bytes.insert(key, bytes.to_vec());
        Ok(CreateOutcome::Created {
            location: format!("snapshots/{name}/v{version}.yaml"),
        })
    }

    fn write_record(&self, record: &VersionRecord) -> anyhow::Result<()> {
        guard(&self.inner)
            .records
            .insert((record.name.clone(), record.version), record.clone());
        Ok(())
    }

    fn read(&self, name: &str, version: &Version) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(guard(&self.inner)
            .bytes
            .get(&(name.to_string(), *version))
            .cloned())
    }

    fn record(&self, name: &str, version: &Version) -> anyhow::Result<Option<VersionRecord>> {
        Ok(guard(&self.inner)
            .records
            .get(&(name.to_string(), *version))
            .cloned())
    }

    fn versions(&self, name: &str) -> anyhow::Result<Vec<Version>> {
        Ok(guard(&self.inner)
            .bytes
            .keys()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| *v)
            .collect())
    }

    fn current(&self, name: &str) -> anyhow::Result<Option<Version>> {
        Ok(guard(&self.inner).current.get(name).copied())
    }

    fn set_current(&self, name: &str, version: &Version) -> anyhow::Result<()> {
        guard(&self.inner)
            .current
            .insert(name.to_string(), *version);
        Ok(())
    }

    fn clear_current(&self, name: &str) -> anyhow::Result<()> {
        guard(&self.inner).current.remove(name);
        Ok(())
    }

    fn discard(&self, name: &str, version: &Version) -> anyhow::Result<()> {
        let mut inner = guard(&self.inner);
        let key = (name.to_string(), *version);
        inner.bytes.remove(&key);
        inner.records.remove(&key);
        Ok(())
    }

    fn names(&self) -> anyhow::Result<Vec<String>> {
        let mut names: Vec<String> = guard(&self.inner)
            .bytes
            .keys()
            .map(|(n, _)| n.clone())
            .collect();
        names.dedup();
        Ok(names)
    }
}

#[derive(Debug, Default)]
struct Artifacts {
    sets: BTreeMap<String, ArtifactSet>,
    backups: BTreeMap<String, ArtifactSet>,
    guides: BTreeMap<String, Vec<u8>>,
}

#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    inner: Mutex<Artifacts>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Guide locations currently present, sorted.
    pub fn guides(&self) -> Vec<String> {
        guard(&self.inner).guides.keys().cloned().collect()
    }

    pub fn backup_count(&self) -> usize {
        guard(&self.inner).backups.len()
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn artifact_id(&self, name: &str) -> String {
        format!("generated/{name}")
    }

    fn read_set(&self, name: &str) -> anyhow::Result<Option<ArtifactSet>> {
        Ok(guard(&self.inner).sets.get(name).cloned())
    }

    fn replace_set(&self, name: &str, files: &ArtifactSet) -> anyhow::Result<()> {
        guard(&self.inner)
            .sets
            .insert(name.to_string(), files.clone());
        Ok(())
    }

    fn remove_set(&self, name: &str) -> anyhow::Result<()> {
        guard(&self.inner).sets.remove(name);
        Ok(())
    }

    fn backup(
        &self,
        name: &str,
        files: &ArtifactSet,
        at: DateTime<Utc>,
    ) -> anyhow::Result<BackupRef> {
        let mut inner = guard(&self.inner);
        let stamp = at.format("%Y%m%dT%H%M%S%.6fZ").to_string();
        let mut id = stamp.clone();
        let mut seq = 0u32;
        while inner.backups.contains_key(&format!("backups/{name}/{id}")) {
            seq += 1;
            id = format!("{stamp}-{seq}");
        }
        let location = format!("backups/{name}/{id}");
        inner.backups.insert(location.clone(), files.clone());
        Ok(BackupRef {
            name: name.to_string(),
            id,
            location,
            files: files.len() as u64,
        })
    }

    fn read_backup(&self, backup: &BackupRef) -> anyhow::Result<ArtifactSet> {
        guard(&self.inner)
            .backups
            .get(&backup.location)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no backup at {}", backup.location))
    }

    fn write_guide(&self, name: &str, file_name: &str, contents: &[u8]) -> anyhow::Result<String> {
        let location = format!("generated/migrations/{name}/{file_name}");
        guard(&self.inner)
            .guides
            .insert(location.clone(), contents.to_vec());
        Ok(location)
    }

    fn remove_guide(&self, location: &str) -> anyhow::Result<()> {
        guard(&self.inner).guides.remove(location);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn snapshot_names_are_unique_and_sorted() {
        let store = InMemorySnapshotStore::new();
        store.create("orders", &Version::new(1, 0, 0), b"a").unwrap();
        store.create("orders", &Version::new(1, 1, 0), b"b").unwrap();
        store.create("users", &Version::new(1, 0, 0), b"c").unwrap();
        assert_eq!(store.names().unwrap(), vec!["orders", "users"]);
        assert_eq!(
            store.versions("orders").unwrap(),
            vec![Version::new(1, 0, 0), Version::new(1, 1, 0)]
        );
    }

    #[test]
    fn backups_get_sequence_suffix() {
        let store = InMemoryArtifactStore::new();
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let a = store.backup("users", &ArtifactSet::new(), at).unwrap();
        let b = store.backup("users", &ArtifactSet::new(), at).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(store.backup_count(), 2);
    }
}
