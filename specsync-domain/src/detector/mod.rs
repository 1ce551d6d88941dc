//! Structural diff between two contract documents with compatibility
//! classification.

mod rules;
mod walk;

pub use rules::{ClassificationRule, FAIL_SAFE_RULE, RULES, classify};

use specsync_contract::ContractDocument;
use specsync_types::change::ChangeSet;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot diff contract {old:?} against contract {new:?}")]
pub struct IncomparableDocuments {
    pub old: String,
    pub new: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeDetector;

impl ChangeDetector {
    pub fn new() -> Self {
        Self
    }

    /// Diff `old` against `new`. Both must describe the same resource.
    pub fn diff(
        &self,
        old: &ContractDocument,
        new: &ContractDocument,
    ) -> Result<ChangeSet, IncomparableDocuments> {
        if old.name() != new.name() {
            return Err(IncomparableDocuments {
                old: old.name().to_string(),
                new: new.name().to_string(),
            });
        }

        if old.fingerprint() == new.fingerprint() {
            return Ok(ChangeSet::empty(
                new.name(),
                old.fingerprint(),
                new.fingerprint(),
            ));
        }

        let mut walker = walk::Walker::new();
        walker.document(old, new);
        let set = ChangeSet::from_changes(
            new.name(),
            old.fingerprint(),
            new.fingerprint(),
            walker.finish(),
        );
        debug!(
            name = %new.name(),
            changes = set.len(),
            aggregate = %set.aggregate(),
            "diffed contract"
        );
        Ok(set)
    }
}
