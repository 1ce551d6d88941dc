//! Error types for specsync-edit.
//!
//! Errors distinguish between:
//! - Safety gate blocks (exit code 2): breaking changes without `--force`
//! - Runtime errors (exit code 1): stale plans, I/O failures, failed actions

use specsync_types::result::SyncResult;
use specsync_types::version::Version;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The plan carries breaking changes and the caller did not force it.
    /// Nothing was touched.
    #[error(
        "sync of {name:?} to v{version} contains breaking changes; re-run with --force to acknowledge"
    )]
    UnacknowledgedBreakingChange { name: String, version: Version },

    /// An action failed part-way. `result` is the execution log including
    /// the rollback outcome of every action already applied.
    #[error(
        "sync of {name:?} failed during {action}: {message} (rolled back: {rolled_back})"
    )]
    ExecutionFailure {
        name: String,
        action: String,
        message: String,
        rolled_back: bool,
        result: Box<SyncResult>,
    },

    /// Failed before any artifact was touched.
    #[error("runtime error: {0:#}")]
    Runtime(#[from] anyhow::Error),
}

impl SyncError {
    /// Returns true if this is the acknowledgement gate (exit code 2).
    pub fn is_gate(&self) -> bool {
        matches!(self, SyncError::UnacknowledgedBreakingChange { .. })
    }

    /// Returns the recommended exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            SyncError::UnacknowledgedBreakingChange { .. } => 2,
            SyncError::ExecutionFailure { .. } | SyncError::Runtime(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn gate_reports_exit_code_2() {
        let err = SyncError::UnacknowledgedBreakingChange {
            name: "users".to_string(),
            version: Version::new(2, 0, 0),
        };
        assert!(err.is_gate());
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("--force"));
    }

    #[test]
    fn failures_report_exit_code_1() {
        let err = SyncError::from(anyhow::anyhow!("boom"));
        assert!(!err.is_gate());
        assert_eq!(err.exit_code(), 1);

        let err = SyncError::ExecutionFailure {
            name: "users".to_string(),
            action: "update".to_string(),
            message: "disk full".to_string(),
            rolled_back: true,
            result: Box::new(SyncResult::new("users", Version::INITIAL, Utc::now())),
        };
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("rolled back: true"));
    }
}
