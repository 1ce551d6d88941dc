//! End-to-end pipeline runs over a temporary project directory.

use camino::Utf8PathBuf;
use pretty_assertions::assert_eq;
use specsync_core::adapters::{FsBackend, InMemoryContractSource};
use specsync_core::settings::ProjectSettings;
use specsync_core::{
    Bump, Classification, Pipeline, PipelineError, Ports, SyncOutcome, Version,
};
use specsync_store::{
    FixedClock, InMemoryArtifactStore, InMemoryMetadataStore, InMemorySnapshotStore,
    MetadataStore, ResourceLocks,
};
use specsync_types::tracked::{SyncStatus, TrackedSpec};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tempfile::TempDir;

const USERS: &str = include_str!("../../tests/fixtures/contracts/users.yaml");

const EMAIL_PARAM: &str = "      parameters:
        - name: email
          in: query
          required: true
          schema:
            type: string
            format: email
";

struct Project {
    _tmp: TempDir,
    settings: ProjectSettings,
}

impl Project {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
        let settings = ProjectSettings::for_root(root);
        std::fs::create_dir_all(&settings.specs_dir).unwrap();
        let project = Self {
            _tmp: tmp,
            settings,
        };
        project.write_users(USERS);
        project
    }

    fn write_users(&self, contents: &str) {
        std::fs::write(self.settings.specs_dir.join("users.yaml"), contents).unwrap();
    }
}

#[test]
fn full_lifecycle_with_breaking_change() {
    let project = Project::new();
    let backend = FsBackend::new(&project.settings);
    let pipeline = Pipeline::new(backend.ports());

    let status = pipeline.status("users").unwrap();
    assert!(status.changed);
    assert!(!status.tracked);
    assert_eq!(status.classification, None);

    let record = pipeline.create_version("users", None).unwrap();
    assert_eq!(record.version, Version::INITIAL);
    assert!(!pipeline.status("users").unwrap().changed);

    let first = pipeline.execute_sync("users", false).unwrap();
    assert_eq!(first.status, SyncOutcome::Applied);
    assert!(
        project
            .settings
            .artifacts_dir
            .join("users/contract.yaml")
            .is_file()
    );

    // Breaking edit: drop the required `email` parameter.
    project.write_users(&USERS.replacen(EMAIL_PARAM, "", 1));
    let status = pipeline.status("users").unwrap();
    assert!(status.changed);
    assert_eq!(status.classification, Some(Classification::Breaking));

    let v2 = pipeline.create_version("users", None).unwrap();
    assert_eq!(v2.version, Version::new(2, 0, 0));
    assert_eq!(v2.classification, Some(Classification::Breaking));

    let planned = pipeline.plan_sync("users").unwrap();
    assert!(planned.plan.requires_acknowledgement);
    assert_eq!(planned.plan.actions.len(), 3);
    assert!(
        planned
            .patch
            .lines()
            .any(|l| l.starts_with('-') && l.contains("email")),
        "{}",
        planned.patch
    );

    let err = pipeline.execute_sync("users", false).unwrap_err();
    assert_eq!(err.exit_code(), 2);
    let tracked = backend_status(&pipeline);
    assert_eq!(tracked, Some(SyncStatus::BreakingPending));

    let forced = pipeline.execute_sync("users", true).unwrap();
    assert_eq!(forced.status, SyncOutcome::Applied);
    assert!(forced.forced);
    assert_eq!(backend_status(&pipeline), Some(SyncStatus::InSync));
    assert!(
        project
            .settings
            .artifacts_dir
            .join("migrations/users/users-v1.0.0-to-v2.0.0.md")
            .is_file()
    );

    // Idempotence: nothing left to do.
    let again = pipeline.execute_sync("users", false).unwrap();
    assert_eq!(again.status, SyncOutcome::NoOp);
    assert!(pipeline.plan_sync("users").unwrap().plan.is_noop());

    let served = pipeline.current_snapshot("users").unwrap();
    assert_eq!(served.fingerprint(), v2.fingerprint);

    let changes = pipeline
        .compare_versions("users", &Version::INITIAL, &Version::new(2, 0, 0))
        .unwrap();
    assert_eq!(changes.aggregate(), Classification::Breaking);
    let guide = pipeline
        .migration_plan("users", &Version::INITIAL, &Version::new(2, 0, 0))
        .unwrap();
    assert!(guide.requires_manual_intervention);

    let matrix = pipeline.compatibility_matrix().unwrap();
    assert_eq!(matrix.len(), 2);
    assert!(matrix[1].is_latest && matrix[1].is_current && matrix[1].has_breaking_changes);
}

fn backend_status(pipeline: &Pipeline<'_>) -> Option<SyncStatus> {
    pipeline.status("users").unwrap().sync_status
}

#[test]
fn unchanged_contract_has_nothing_to_version() {
    let project = Project::new();
    let backend = FsBackend::new(&project.settings);
    let pipeline = Pipeline::new(backend.ports());
    pipeline.create_version("users", None).unwrap();

    let err = pipeline.create_version("users", Some(Bump::Minor)).unwrap_err();
    assert!(matches!(err, PipelineError::NoChanges { .. }));
    assert_eq!(err.exit_code(), 3);
    assert_eq!(pipeline.list_versions("users").unwrap().len(), 1);
}

#[test]
fn explicit_bump_overrides_classification() {
    let project = Project::new();
    let backend = FsBackend::new(&project.settings);
    let pipeline = Pipeline::new(backend.ports());
    pipeline.create_version("users", None).unwrap();

    project.write_users(&USERS.replace("Manage user accounts.", "Manage accounts."));
    let record = pipeline.create_version("users", Some(Bump::Major)).unwrap();
    assert_eq!(record.version, Version::new(2, 0, 0));
    assert_eq!(record.classification, Some(Classification::Informational));
}

#[test]
fn invalid_edit_is_reported_and_state_untouched() {
    let project = Project::new();
    let backend = FsBackend::new(&project.settings);
    let pipeline = Pipeline::new(backend.ports());
    pipeline.create_version("users", None).unwrap();

    project.write_users(&USERS.replace("operationId: getUser", "operationId: listUsers"));
    let err = pipeline.create_version("users", None).unwrap_err();
    assert!(matches!(err, PipelineError::Contract(_)), "{err}");
    assert_eq!(err.exit_code(), 1);
    assert_eq!(pipeline.list_versions("users").unwrap().len(), 1);
}

#[test]
fn missing_contract_and_unknown_sync() {
    let project = Project::new();
    let backend = FsBackend::new(&project.settings);
    let pipeline = Pipeline::new(backend.ports());

    assert!(matches!(
        pipeline.status("orders").unwrap_err(),
        PipelineError::ContractNotFound { .. }
    ));
    assert!(matches!(
        pipeline.execute_sync("users", false).unwrap_err(),
        PipelineError::Tracker(_)
    ));
    assert_eq!(pipeline.discover().unwrap(), vec!["users"]);
}

#[test]
fn untrack_keeps_snapshots() {
    let project = Project::new();
    let backend = FsBackend::new(&project.settings);
    let pipeline = Pipeline::new(backend.ports());
    pipeline.create_version("users", None).unwrap();

    pipeline.untrack("users").unwrap();
    let status = pipeline.status("users").unwrap();
    assert!(!status.tracked);
    assert_eq!(status.latest_version, Some(Version::INITIAL));
    assert_eq!(pipeline.list_all_versions().unwrap().len(), 1);
    assert!(pipeline.untrack("users").is_err());
}

#[test]
fn parallel_resources_do_not_interfere() {
    let contracts = InMemoryContractSource::new();
    for name in ["users", "orders", "billing", "search"] {
        contracts.insert(name, USERS.as_bytes());
    }
    let metadata = InMemoryMetadataStore::new();
    let snapshots = InMemorySnapshotStore::new();
    let artifacts = InMemoryArtifactStore::new();
    let clock = FixedClock(chrono::Utc::now());
    let ports = Ports {
        contracts: &contracts,
        metadata: &metadata,
        snapshots: &snapshots,
        artifacts: &artifacts,
        clock: &clock,
    };
    let locks = ResourceLocks::new();

    thread::scope(|s| {
        for name in ["users", "orders", "billing", "search"] {
            let locks = locks.clone();
            s.spawn(move || {
                let pipeline = Pipeline::new(ports).with_locks(locks);
                pipeline.create_version(name, None).unwrap();
                pipeline.execute_sync(name, false).unwrap();
            });
        }
    });

    let pipeline = Pipeline::new(ports);
    for report in pipeline.status_all().unwrap() {
        assert_eq!(report.sync_status, Some(SyncStatus::InSync), "{}", report.name);
        assert_eq!(report.synced_version, Some(Version::INITIAL));
    }
}

/// Metadata store whose writes fail while `failing` is set.
#[derive(Default)]
struct FlakyMetadataStore {
    inner: InMemoryMetadataStore,
    failing: AtomicBool,
}

impl FlakyMetadataStore {
    fn fail(&self, on: bool) {
        self.failing.store(on, Ordering::SeqCst);
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("metadata store unavailable");
        }
        Ok(())
    }
}

impl MetadataStore for FlakyMetadataStore {
    fn get(&self, name: &str) -> anyhow::Result<Option<TrackedSpec>> {
        self.inner.get(name)
    }

    fn set(&self, spec: &TrackedSpec) -> anyhow::Result<()> {
        self.inner.set(spec)
    }

    fn compare_and_swap(
        &self,
        name: &str,
        expected: Option<u64>,
        next: &TrackedSpec,
    ) -> anyhow::Result<bool> {
        self.check()?;
        self.inner.compare_and_swap(name, expected, next)
    }

    fn remove(&self, name: &str) -> anyhow::Result<bool> {
        self.inner.remove(name)
    }

    fn names(&self) -> anyhow::Result<Vec<String>> {
        self.inner.names()
    }
}

#[test]
fn failed_tracker_update_leaves_no_partial_version() {
    let contracts = InMemoryContractSource::new();
    contracts.insert("users", USERS.as_bytes());
    let metadata = FlakyMetadataStore::default();
    let snapshots = InMemorySnapshotStore::new();
    let artifacts = InMemoryArtifactStore::new();
    let clock = FixedClock(chrono::Utc::now());
    let ports = Ports {
        contracts: &contracts,
        metadata: &metadata,
        snapshots: &snapshots,
        artifacts: &artifacts,
        clock: &clock,
    };
    let pipeline = Pipeline::new(ports);

    // First version: nothing tracked yet, nothing may survive.
    metadata.fail(true);
    let err = pipeline.create_version("users", None).unwrap_err();
    assert!(matches!(err, PipelineError::Tracker(_)), "{err}");
    assert!(pipeline.list_versions("users").unwrap().is_empty());
    assert!(pipeline.current_snapshot("users").is_err());
    assert!(!pipeline.status("users").unwrap().tracked);

    metadata.fail(false);
    let v1 = pipeline.create_version("users", None).unwrap();

    // Second version: the pointer and tracker go back to v1.
    let edited = USERS.replacen(EMAIL_PARAM, "", 1);
    contracts.insert("users", edited.as_bytes());
    metadata.fail(true);
    pipeline.create_version("users", None).unwrap_err();
    let versions: Vec<Version> = pipeline
        .list_versions("users")
        .unwrap()
        .iter()
        .map(|r| r.version)
        .collect();
    assert_eq!(versions, vec![Version::INITIAL]);
    let served = pipeline.current_snapshot("users").unwrap();
    assert_eq!(served.fingerprint(), v1.fingerprint);
    let status = pipeline.status("users").unwrap();
    assert!(status.changed);
    assert_eq!(status.sync_status, Some(SyncStatus::Pending));

    metadata.fail(false);
    let v2 = pipeline.create_version("users", None).unwrap();
    assert_eq!(v2.version, Version::new(2, 0, 0));
    assert!(!pipeline.status("users").unwrap().changed);
}

#[test]
fn half_committed_version_is_completed_on_retry() {
    let project = Project::new();
    let backend = FsBackend::new(&project.settings);
    let pipeline = Pipeline::new(backend.ports());
    let record = pipeline.create_version("users", None).unwrap();

    // Tracker lost after the snapshot landed.
    pipeline.untrack("users").unwrap();
    let again = pipeline.create_version("users", None).unwrap();
    assert_eq!(again, record);
    let status = pipeline.status("users").unwrap();
    assert!(status.tracked);
    assert!(!status.changed);

    let err = pipeline.create_version("users", None).unwrap_err();
    assert_eq!(err.exit_code(), 3);
}
