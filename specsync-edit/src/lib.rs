//! Sync engine for specsync plans.
//!
//! Responsibilities:
//! - Generate the artifact set for a contract version.
//! - Execute a plan with an acknowledgement gate, backups and rollback.
//! - Render a unified diff preview of what a plan would write.

mod error;
mod executor;
mod generator;
mod preview;

pub use error::SyncError;
pub use executor::SyncExecutor;
pub use generator::{CONTRACT_FILE, ROUTES_FILE, ROUTES_SCHEMA_V1, generate};
pub use preview::render_patch;
