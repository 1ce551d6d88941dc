//! Embeddable core library for specsync.
//!
//! Provides a clap-free, I/O-abstracted entry point for contract status,
//! versioning and artifact sync.
//!
//! # Port traits
//!
//! All I/O is abstracted behind port traits in [`ports`]:
//! - [`ContractSource`](ports::ContractSource): working-copy contracts
//! - `MetadataStore`, `SnapshotStore`, `ArtifactStore` and `Clock` from
//!   `specsync-store`
//!
//! The [`adapters`] module provides default filesystem-backed
//! implementations, bundled as [`FsBackend`](adapters::FsBackend).
//!
//! # Entry points
//!
//! [`Pipeline`](pipeline::Pipeline): `status`, `create_version`,
//! `plan_sync`, `execute_sync`, `compare_versions`, `current_snapshot`,
//! `list_versions`, `compatibility_matrix`, `discover`, `untrack`.

pub mod adapters;
pub mod pipeline;
pub mod ports;
pub mod settings;

pub use pipeline::{PipelineError, PlanOutcome, Pipeline, Ports, StatusReport};

// Re-export the DTOs callers handle so they don't need specsync-types directly.
pub use specsync_types::change::{ChangeSet, Classification};
pub use specsync_types::plan::SyncPlan;
pub use specsync_types::result::{SyncOutcome, SyncResult};
pub use specsync_types::version::{Bump, CompatibilityEntry, Version, VersionRecord};
