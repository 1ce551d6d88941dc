//! Port traits abstracting all I/O away from the pipeline.
//!
//! Persistence ports live in `specsync-store` and are re-exported here so
//! embedders can depend on this crate alone.

pub use specsync_store::{ArtifactStore, Clock, MetadataStore, SnapshotStore};

/// Source of working-copy contract documents (the files authors edit).
pub trait ContractSource: Send + Sync {
    /// Logical names of every available contract, sorted.
    fn names(&self) -> anyhow::Result<Vec<String>>;

    /// Raw bytes of `name`, or `None` if there is no such contract.
    fn read(&self, name: &str) -> anyhow::Result<Option<Vec<u8>>>;

    /// Human-readable location used in error messages.
    fn describe(&self) -> String;
}
