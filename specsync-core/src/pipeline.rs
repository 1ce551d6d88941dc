//! Core status / version / plan / sync pipelines, extracted from the CLI.
//!
//! These entry points are I/O-agnostic: every read and write goes through
//! the port traits bundled in [`Ports`]. Mutating entry points
//! (`create_version`, `execute_sync`, `untrack`) hold the per-resource lock
//! for their whole duration; read-only ones never mutate state.

use crate::ports::{ArtifactStore, Clock, ContractSource, MetadataStore, SnapshotStore};
use serde::Serialize;
use specsync_contract::{ContractDocument, ContractError};
use specsync_domain::{ChangeDetector, IncomparableDocuments, PlanContext, Planner};
use specsync_edit::{SyncError, SyncExecutor, generate, render_patch};
use specsync_store::{
    FingerprintTracker, ResourceLocks, TrackerError, VersionError, VersionManager,
};
use specsync_types::change::{ChangeSet, Classification};
use specsync_types::migration::MigrationPlan;
use specsync_types::plan::SyncPlan;
use specsync_types::result::SyncResult;
use specsync_types::tracked::{SyncStatus, TrackedSpec};
use specsync_types::version::{Bump, CompatibilityEntry, Version, VersionRecord};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Error type for pipeline results. See [`PipelineError::exit_code`].
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no contract named {name:?} in {location}")]
    ContractNotFound { name: String, location: String },

    #[error("{name:?} is unchanged since v{version}; nothing to version")]
    NoChanges { name: String, version: Version },

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error(transparent)]
    Incomparable(#[from] IncomparableDocuments),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

impl PipelineError {
    /// 1 hard failure, 2 breaking change requires `--force`, 3 no changes.
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineError::NoChanges { .. } => 3,
            PipelineError::Sync(e) => e.exit_code(),
            _ => 1,
        }
    }
}

/// Every port the pipeline reads or writes through.
#[derive(Clone, Copy)]
pub struct Ports<'a> {
    pub contracts: &'a dyn ContractSource,
    pub metadata: &'a dyn MetadataStore,
    pub snapshots: &'a dyn SnapshotStore,
    pub artifacts: &'a dyn ArtifactStore,
    pub clock: &'a dyn Clock,
}

/// Outcome of [`Pipeline::status`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub name: String,
    pub fingerprint: String,
    pub tracked: bool,
    /// Working copy differs from the last fingerprint the tracker saw.
    pub changed: bool,
    /// Aggregate classification against the latest snapshot, when one
    /// exists and the working copy changed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_status: Option<SyncStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<Version>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synced_version: Option<Version>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changes: Option<ChangeSet>,
}

/// Outcome of [`Pipeline::plan_sync`].
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub plan: SyncPlan,
    /// Diff from the version the artifacts reflect to the plan target.
    pub changes: ChangeSet,
    /// Unified diff of the artifact files the plan would write.
    pub patch: String,
}

/// Everything needed to plan or execute a sync for one resource.
struct Prepared {
    plan: SyncPlan,
    changes: ChangeSet,
    target: ContractDocument,
}

pub struct Pipeline<'a> {
    ports: Ports<'a>,
    locks: ResourceLocks,
    deadline: Option<Duration>,
}

impl<'a> Pipeline<'a> {
    pub fn new(ports: Ports<'a>) -> Self {
        Self {
            ports,
            locks: ResourceLocks::new(),
            deadline: None,
        }
    }

    /// Share a lock table with other pipelines in the same process.
    pub fn with_locks(mut self, locks: ResourceLocks) -> Self {
        self.locks = locks;
        self
    }

    /// Bound the I/O phase of every `execute_sync`.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    fn tracker(&self) -> FingerprintTracker<'a> {
        FingerprintTracker::new(self.ports.metadata, self.ports.clock)
    }

    fn versions(&self) -> VersionManager<'a> {
        VersionManager::new(self.ports.snapshots, self.ports.clock)
    }

    /// Load and validate the working copy of `name`.
    pub fn load_working(&self, name: &str) -> Result<ContractDocument, PipelineError> {
        let bytes =
            self.ports
                .contracts
                .read(name)?
                .ok_or_else(|| PipelineError::ContractNotFound {
                    name: name.to_string(),
                    location: self.ports.contracts.describe(),
                })?;
        Ok(specsync_contract::load(name, &bytes)?)
    }

    /// Names of every contract in the working copy.
    pub fn discover(&self) -> Result<Vec<String>, PipelineError> {
        Ok(self.ports.contracts.names()?)
    }

    pub fn status(&self, name: &str) -> Result<StatusReport, PipelineError> {
        let doc = self.load_working(name)?;
        let tracker = self.tracker();
        let tracked = tracker.get(name)?;
        let changed = tracker.has_changed(name, doc.fingerprint())?;
        let vm = self.versions();
        let latest_version = vm.latest_version(name)?;

        let changes = match latest_version {
            Some(v) if changed => {
                let latest = vm.load_snapshot(name, &v)?;
                Some(ChangeDetector::new().diff(&latest, &doc)?)
            }
            _ => None,
        };

        debug!(name, changed, "computed status");
        Ok(StatusReport {
            name: name.to_string(),
            fingerprint: doc.fingerprint().to_string(),
            tracked: tracked.is_some(),
            changed,
            classification: changes.as_ref().map(ChangeSet::aggregate),
            sync_status: tracked.as_ref().map(|t| t.sync_status),
            latest_version,
            synced_version: tracked.and_then(|t| t.current_version),
            changes,
        })
    }

    /// Status of every discovered contract, in name order.
    pub fn status_all(&self) -> Result<Vec<StatusReport>, PipelineError> {
        self.discover()?
            .iter()
            .map(|name| self.status(name))
            .collect()
    }

    /// Snapshot the working copy as the next version and point `current`
    /// at it. The bump follows the aggregate classification against the
    /// latest snapshot unless `bump` overrides it.
    ///
    /// Fails closed: if pointing `current` or updating the tracker fails,
    /// the new snapshot is discarded and both are restored. A version left
    /// half-committed by an earlier crash is completed instead of
    /// reporting `NoChanges`.
    pub fn create_version(
        &self,
        name: &str,
        bump: Option<Bump>,
    ) -> Result<VersionRecord, PipelineError> {
        self.locks.with_lock(name, || {
            let doc = self.load_working(name)?;
            let vm = self.versions();
            let latest = vm.latest_version(name)?;
            let previous_current = vm.current_version(name)?;
            let previous_tracked = self.tracker().get(name)?;

            let classification = match latest {
                Some(v) => {
                    let previous = vm.load_snapshot(name, &v)?;
                    let changes = ChangeDetector::new().diff(&previous, &doc)?;
                    if changes.is_empty() {
                        return self.reconcile(
                            name,
                            &doc,
                            v,
                            previous_current,
                            previous_tracked.as_ref(),
                        );
                    }
                    Some(changes.aggregate())
                }
                None => None,
            };

            let version = specsync_domain::next_version(
                latest.as_ref(),
                classification.unwrap_or(Classification::Informational),
                bump,
            );
            let record = vm.create_snapshot(&doc, version, classification)?;
            if let Err(e) = self.commit_version(
                name,
                &doc,
                &version,
                classification,
                previous_tracked.is_some(),
            ) {
                self.undo_version(
                    name,
                    &version,
                    previous_current.as_ref(),
                    previous_tracked.as_ref(),
                );
                return Err(e);
            }

            info!(
                name,
                version = %version,
                classification = classification.map_or("initial", Classification::as_str),
                "created version"
            );
            Ok(record)
        })
    }

    /// Point `current` at `version` and record the new fingerprint.
    fn commit_version(
        &self,
        name: &str,
        doc: &ContractDocument,
        version: &Version,
        classification: Option<Classification>,
        tracked: bool,
    ) -> Result<(), PipelineError> {
        self.versions().point_current(name, version)?;
        let tracker = self.tracker();
        if !tracked {
            tracker.track(name, doc.fingerprint())?;
            if let Some(c) = classification {
                tracker.record_change(name, doc.fingerprint(), c)?;
            }
        } else {
            tracker.record_change(
                name,
                doc.fingerprint(),
                classification.unwrap_or(Classification::Informational),
            )?;
        }
        Ok(())
    }

    /// Best-effort restore after a failed commit. The caller reports the
    /// original failure; a failed restore is left for the next
    /// `create_version` to reconcile.
    fn undo_version(
        &self,
        name: &str,
        version: &Version,
        previous_current: Option<&Version>,
        previous_tracked: Option<&TrackedSpec>,
    ) {
        let tracker_restored = match previous_tracked {
            Some(spec) => self.ports.metadata.set(spec),
            None => self.ports.metadata.remove(name).map(|_| ()),
        };
        if let Err(e) = tracker_restored {
            error!(name, error = %format!("{e:#}"), "could not restore tracker state");
        }
        if let Err(e) = self.versions().discard(name, version, previous_current) {
            error!(name, version = %version, error = %e, "could not discard snapshot");
        }
        warn!(name, version = %version, "rolled back version creation");
    }

    /// The working copy matches the latest snapshot. Finish any commit an
    /// earlier run left incomplete, otherwise report `NoChanges`.
    fn reconcile(
        &self,
        name: &str,
        doc: &ContractDocument,
        latest: Version,
        previous_current: Option<Version>,
        previous_tracked: Option<&TrackedSpec>,
    ) -> Result<VersionRecord, PipelineError> {
        let vm = self.versions();
        let record = vm.record(name, &latest)?;
        let pointer_ok = previous_current == Some(latest);
        // A sync stores the snapshot's fingerprint, which may differ
        // from the working copy's only in ways the detector ignores.
        let tracker_ok = previous_tracked.is_some_and(|t| {
            t.last_fingerprint == doc.fingerprint() || t.last_fingerprint == record.fingerprint
        });
        if pointer_ok && tracker_ok {
            return Err(PipelineError::NoChanges {
                name: name.to_string(),
                version: latest,
            });
        }

        if !pointer_ok {
            vm.point_current(name, &latest)?;
        }
        if !tracker_ok {
            let tracker = self.tracker();
            if previous_tracked.is_none() {
                tracker.track(name, doc.fingerprint())?;
            } else {
                tracker.record_change(
                    name,
                    doc.fingerprint(),
                    record.classification.unwrap_or(Classification::Informational),
                )?;
            }
        }
        info!(name, version = %latest, "reconciled version state");
        Ok(record)
    }

    /// Read-only: the plan `execute_sync` would run, plus a diff preview.
    pub fn plan_sync(&self, name: &str) -> Result<PlanOutcome, PipelineError> {
        let prepared = self.prepare(name)?;
        let patch = if prepared.plan.is_noop() {
            String::new()
        } else {
            let current = self.ports.artifacts.read_set(name)?;
            let next = generate(&prepared.target, prepared.plan.target_version)?;
            render_patch(
                &self.ports.artifacts.artifact_id(name),
                current.as_ref(),
                &next,
            )
        };
        Ok(PlanOutcome {
            plan: prepared.plan,
            changes: prepared.changes,
            patch,
        })
    }

    /// Plan and execute a sync under the resource lock.
    pub fn execute_sync(&self, name: &str, force: bool) -> Result<SyncResult, PipelineError> {
        self.locks.with_lock(name, || {
            let prepared = self.prepare(name)?;
            let mut executor =
                SyncExecutor::new(self.ports.artifacts, self.ports.metadata, self.ports.clock);
            if let Some(d) = self.deadline {
                executor = executor.with_deadline(Instant::now() + d);
            }
            Ok(executor.execute(&prepared.plan, &prepared.target, force)?)
        })
    }

    fn prepare(&self, name: &str) -> Result<Prepared, PipelineError> {
        let tracked = self.tracker().require(name)?;
        let vm = self.versions();
        let latest_version = vm
            .latest_version(name)?
            .ok_or_else(|| VersionError::NoVersions {
                name: name.to_string(),
            })?;
        let latest = vm.record(name, &latest_version)?;
        let target = vm.load_snapshot(name, &latest_version)?;

        let changes = match tracked.current_version {
            Some(synced) if synced != latest_version => {
                vm.diff_summary(name, &synced, &latest_version)?
            }
            _ => ChangeSet::empty(name, target.fingerprint(), target.fingerprint()),
        };

        let ctx = PlanContext {
            artifacts_present: self.ports.artifacts.read_set(name)?.is_some(),
            artifact_root: self.ports.artifacts.artifact_id(name),
        };
        let plan = Planner::new().plan(&ctx, &tracked, &latest, &changes);
        Ok(Prepared {
            plan,
            changes,
            target,
        })
    }

    pub fn compare_versions(
        &self,
        name: &str,
        from: &Version,
        to: &Version,
    ) -> Result<ChangeSet, PipelineError> {
        Ok(self.versions().diff_summary(name, from, to)?)
    }

    /// Consumer guidance for moving from `from` to `to`.
    pub fn migration_plan(
        &self,
        name: &str,
        from: &Version,
        to: &Version,
    ) -> Result<MigrationPlan, PipelineError> {
        let changes = self.compare_versions(name, from, to)?;
        Ok(specsync_domain::migration_plan(&changes, Some(*from), *to))
    }

    /// The snapshot the serving layer should load.
    pub fn current_snapshot(&self, name: &str) -> Result<ContractDocument, PipelineError> {
        Ok(self.versions().current_snapshot(name)?)
    }

    pub fn list_versions(&self, name: &str) -> Result<Vec<VersionRecord>, PipelineError> {
        Ok(self.versions().list(name)?)
    }

    /// Records of every versioned resource, grouped by name.
    pub fn list_all_versions(&self) -> Result<Vec<VersionRecord>, PipelineError> {
        let mut out = Vec::new();
        for name in self.ports.snapshots.names()? {
            out.extend(self.list_versions(&name)?);
        }
        Ok(out)
    }

    pub fn compatibility_matrix(&self) -> Result<Vec<CompatibilityEntry>, PipelineError> {
        Ok(self.versions().compatibility_matrix()?)
    }

    /// Forget tracker state for `name`. Snapshots and backups are kept.
    pub fn untrack(&self, name: &str) -> Result<(), PipelineError> {
        self.locks
            .with_lock(name, || Ok(self.tracker().untrack(name)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        let no_changes = PipelineError::NoChanges {
            name: "users".to_string(),
            version: Version::INITIAL,
        };
        assert_eq!(no_changes.exit_code(), 3);

        let gate = PipelineError::from(SyncError::UnacknowledgedBreakingChange {
            name: "users".to_string(),
            version: Version::new(2, 0, 0),
        });
        assert_eq!(gate.exit_code(), 2);

        let missing = PipelineError::ContractNotFound {
            name: "users".to_string(),
            location: "specifications".to_string(),
        };
        assert_eq!(missing.exit_code(), 1);
        assert_eq!(
            PipelineError::from(anyhow::anyhow!("disk")).exit_code(),
            1
        );
    }
}
