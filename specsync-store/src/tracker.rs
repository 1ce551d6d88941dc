//! Fingerprint tracker: durable "what we last saw" per resource.

use crate::ports::{Clock, MetadataStore};
use specsync_types::change::Classification;
use specsync_types::tracked::{SyncStatus, TrackedSpec};
use specsync_types::version::Version;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("resource {name:?} is already tracked; reset it first")]
    AlreadyTracked { name: String },

    #[error("resource {name:?} is not tracked")]
    NotTracked { name: String },

    #[error("concurrent update of {name:?} detected; retry")]
    Conflict { name: String },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub struct FingerprintTracker<'a> {
    store: &'a dyn MetadataStore,
    clock: &'a dyn Clock,
}

impl<'a> FingerprintTracker<'a> {
    pub fn new(store: &'a dyn MetadataStore, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    pub fn get(&self, name: &str) -> Result<Option<TrackedSpec>, TrackerError> {
        Ok(self.store.get(name)?)
    }

    pub fn require(&self, name: &str) -> Result<TrackedSpec, TrackerError> {
        self.get(name)?.ok_or_else(|| TrackerError::NotTracked {
            name: name.to_string(),
        })
    }

    pub fn names(&self) -> Result<Vec<String>, TrackerError> {
        Ok(self.store.names()?)
    }

    /// Register a new resource as `pending` with no synced version.
    pub fn track(&self, name: &str, fingerprint: &str) -> Result<TrackedSpec, TrackerError> {
        let spec = TrackedSpec::new(name, fingerprint);
        if !self.store.compare_and_swap(name, None, &spec)? {
            return Err(TrackerError::AlreadyTracked {
                name: name.to_string(),
            });
        }
        info!(name, fingerprint, "tracking contract");
        Ok(spec)
    }

    /// `true` for untracked names.
    pub fn has_changed(&self, name: &str, fingerprint: &str) -> Result<bool, TrackerError> {
        Ok(self
            .get(name)?
            .is_none_or(|spec| spec.last_fingerprint != fingerprint))
    }

    /// Record a newly versioned fingerprint. A breaking aggregate moves the
    /// resource to `breaking_pending`, which only a sync clears.
    pub fn record_change(
        &self,
        name: &str,
        fingerprint: &str,
        aggregate: Classification,
    ) -> Result<TrackedSpec, TrackerError> {
        self.update(name, |spec| {
            spec.last_fingerprint = fingerprint.to_string();
            spec.sync_status =
                if aggregate.is_breaking() || spec.sync_status == SyncStatus::BreakingPending {
                    SyncStatus::BreakingPending
                } else {
                    SyncStatus::Pending
                };
        })
    }

    pub fn update_after_sync(
        &self,
        name: &str,
        fingerprint: &str,
        version: Version,
    ) -> Result<TrackedSpec, TrackerError> {
        let now = self.clock.now();
        let spec = self.update(name, |spec| {
            spec.last_fingerprint = fingerprint.to_string();
            spec.current_version = Some(version);
            spec.sync_status = SyncStatus::InSync;
            spec.last_synced_at = Some(now);
        })?;
        info!(name, version = %version, "marked in sync");
        Ok(spec)
    }

    /// Forget everything known about `name` and start over as `pending`.
    pub fn reset(&self, name: &str, fingerprint: &str) -> Result<TrackedSpec, TrackerError> {
        let previous = self.get(name)?;
        let mut spec = TrackedSpec::new(name, fingerprint);
        let expected = previous.as_ref().map(|p| p.revision);
        spec.revision = expected.map_or(0, |r| r + 1);
        if !self.store.compare_and_swap(name, expected, &spec)? {
            return Err(TrackerError::Conflict {
                name: name.to_string(),
            });
        }
        info!(name, "reset tracking");
        Ok(spec)
    }

    pub fn untrack(&self, name: &str) -> Result<(), TrackerError> {
        if !self.store.remove(name)? {
            return Err(TrackerError::NotTracked {
                name: name.to_string(),
            });
        }
        info!(name, "untracked contract");
        Ok(())
    }

    fn update(
        &self,
        name: &str,
        f: impl FnOnce(&mut TrackedSpec),
    ) -> Result<TrackedSpec, TrackerError> {
        let current = self.require(name)?;
        let mut next = current.clone();
        f(&mut next);
        next.revision = current.revision + 1;
        if !self
            .store
            .compare_and_swap(name, Some(current.revision), &next)?
        {
            return Err(TrackerError::Conflict {
                name: name.to_string(),
            });
        }
        debug!(
            name,
            status = %next.sync_status,
            revision = next.revision,
            "updated tracked spec"
        );
        Ok(next)
    }
}
