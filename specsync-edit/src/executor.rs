//! Sync executor: applies a [`SyncPlan`] action by action and rolls the
//! whole invocation back if any step fails.

use crate::error::SyncError;
use crate::generator::generate;
use anyhow::{Context, bail};
use specsync_contract::ContractDocument;
use specsync_render::render_migration_guide_md;
use specsync_store::{ArtifactSet, ArtifactStore, Clock, FingerprintTracker, MetadataStore};
use specsync_types::plan::{SyncAction, SyncActionKind, SyncPlan};
use specsync_types::result::{ActionResult, ActionStatus, BackupRef, SyncOutcome, SyncResult};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// What this invocation has done so far; drives rollback.
#[derive(Debug, Default)]
struct Journal {
    backup: Option<BackupRef>,
    set_written: bool,
    guides: Vec<String>,
}

pub struct SyncExecutor<'a> {
    artifacts: &'a dyn ArtifactStore,
    tracker: FingerprintTracker<'a>,
    clock: &'a dyn Clock,
    deadline: Option<Instant>,
}

impl<'a> SyncExecutor<'a> {
    pub fn new(
        artifacts: &'a dyn ArtifactStore,
        metadata: &'a dyn MetadataStore,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            artifacts,
            tracker: FingerprintTracker::new(metadata, clock),
            clock,
            deadline: None,
        }
    }

    /// Abort (and roll back) if an I/O action would start after `deadline`.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Apply `plan`, generating artifacts from `target` (the document of
    /// `plan.target_version`).
    ///
    /// A plan that requires acknowledgement fails with
    /// [`SyncError::UnacknowledgedBreakingChange`] unless `force` is set,
    /// before anything is read or written.
    pub fn execute(
        &self,
        plan: &SyncPlan,
        target: &ContractDocument,
        force: bool,
    ) -> Result<SyncResult, SyncError> {
        if plan.requires_acknowledgement && !force {
            warn!(
                name = %plan.name,
                version = %plan.target_version,
                "breaking changes not acknowledged; nothing touched"
            );
            return Err(SyncError::UnacknowledgedBreakingChange {
                name: plan.name.clone(),
                version: plan.target_version,
            });
        }
        if target.name() != plan.name || target.fingerprint() != plan.target_fingerprint {
            return Err(anyhow::anyhow!(
                "plan for {} v{} is stale: target document does not match its fingerprint",
                plan.name,
                plan.target_version
            )
            .into());
        }

        let mut result = SyncResult::new(&plan.name, plan.target_version, self.clock.now());
        result.from_version = plan.from_version;
        result.forced = force && plan.requires_acknowledgement;

        if plan.is_noop() {
            result.ended_at = Some(self.clock.now());
            info!(name = %plan.name, version = %plan.target_version, "artifacts already in sync");
            return Ok(result);
        }

        let pre_state = self
            .artifacts
            .read_set(&plan.name)
            .with_context(|| format!("read current artifacts of {}", plan.name))?;
        let generated = generate(target, plan.target_version)?;
        let mut journal = Journal::default();

        for action in &plan.actions {
            let mut entry = ActionResult {
                action_id: action.id.clone(),
                kind: action.kind.as_str().to_string(),
                target: action.target.id.clone(),
                status: ActionStatus::Applied,
                message: None,
                files_written: vec![],
            };
            match self.apply(action, &plan.name, pre_state.as_ref(), &generated, &mut journal) {
                Ok(files) => {
                    debug!(name = %plan.name, action = %entry.kind, "applied action");
                    entry.files_written = files;
                    result.actions.push(entry);
                }
                Err(err) => {
                    entry.status = ActionStatus::Failed;
                    entry.message = Some(format!("{err:#}"));
                    result.actions.push(entry);
                    let kind = action.kind.as_str();
                    return Err(self.fail(result, &journal, pre_state.as_ref(), kind, err));
                }
            }
        }

        if let Err(err) = self.tracker.update_after_sync(
            &plan.name,
            &plan.target_fingerprint,
            plan.target_version,
        ) {
            let err = anyhow::Error::new(err);
            return Err(self.fail(result, &journal, pre_state.as_ref(), "update_tracker", err));
        }

        result.backup = journal.backup;
        result.status = SyncOutcome::Applied;
        result.ended_at = Some(self.clock.now());
        info!(
            name = %plan.name,
            version = %plan.target_version,
            actions = result.actions.len(),
            forced = result.forced,
            "sync applied"
        );
        Ok(result)
    }

    fn apply(
        &self,
        action: &SyncAction,
        name: &str,
        pre_state: Option<&ArtifactSet>,
        generated: &ArtifactSet,
        journal: &mut Journal,
    ) -> anyhow::Result<Vec<String>> {
        self.check_deadline(action.kind.as_str())?;
        match &action.kind {
            SyncActionKind::Backup => {
                let Some(files) = pre_state else {
                    bail!("no artifacts to back up for {name}");
                };
                let backup = self
                    .artifacts
                    .backup(name, files, self.clock.now())
                    .with_context(|| format!("back up artifacts of {name}"))?;
                let location = backup.location.clone();
                journal.backup = Some(backup);
                Ok(vec![location])
            }
            SyncActionKind::Generate | SyncActionKind::Update => {
                journal.set_written = true;
                self.artifacts
                    .replace_set(name, generated)
                    .with_context(|| format!("write artifacts of {name}"))?;
                Ok(generated
                    .keys()
                    .map(|file| format!("{}/{file}", action.target.id))
                    .collect())
            }
            SyncActionKind::WriteMigrationGuide {
                file_name,
                migration,
            } => {
                let md = render_migration_guide_md(migration);
                let location = self
                    .artifacts
                    .write_guide(name, file_name, md.as_bytes())
                    .with_context(|| format!("write migration guide {file_name}"))?;
                journal.guides.push(location.clone());
                Ok(vec![location])
            }
        }
    }

    fn check_deadline(&self, action: &str) -> anyhow::Result<()> {
        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            bail!("deadline exceeded before {action}");
        }
        Ok(())
    }

    fn fail(
        &self,
        mut result: SyncResult,
        journal: &Journal,
        pre_state: Option<&ArtifactSet>,
        action: &str,
        err: anyhow::Error,
    ) -> SyncError {
        let message = format!("{err:#}");
        error!(name = %result.name, action, error = %message, "sync action failed");

        let rolled_back = self.rollback(&result.name, journal, pre_state);
        if rolled_back {
            for entry in &mut result.actions {
                if entry.status == ActionStatus::Applied {
                    entry.status = ActionStatus::RolledBack;
                }
            }
        }
        result.status = SyncOutcome::RolledBack;
        result.backup = journal.backup.clone();
        result.ended_at = Some(self.clock.now());

        SyncError::ExecutionFailure {
            name: result.name.clone(),
            action: action.to_string(),
            message,
            rolled_back,
            result: Box::new(result),
        }
    }

    /// Undo the journal. Runs to completion regardless of the deadline;
    /// returns false if any step could not be undone.
    fn rollback(&self, name: &str, journal: &Journal, pre_state: Option<&ArtifactSet>) -> bool {
        let mut ok = true;

        for location in journal.guides.iter().rev() {
            if let Err(err) = self.artifacts.remove_guide(location) {
                error!(name, location = %location, error = %format!("{err:#}"), "could not remove migration guide");
                ok = false;
            }
        }

        if journal.set_written {
            let restored = match (&journal.backup, pre_state) {
                (Some(backup), _) => self
                    .artifacts
                    .read_backup(backup)
                    .and_then(|files| self.artifacts.replace_set(name, &files)),
                (None, Some(files)) => self.artifacts.replace_set(name, files),
                (None, None) => self.artifacts.remove_set(name),
            };
            if let Err(err) = restored {
                error!(name, error = %format!("{err:#}"), "could not restore artifacts");
                ok = false;
            }
        }

        if ok {
            warn!(name, "sync rolled back");
        }
        ok
    }
}
