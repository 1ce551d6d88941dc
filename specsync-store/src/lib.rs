//! Persistence for specsync: ports, adapters, the fingerprint tracker and
//! the version manager.
//!
//! Components take their stores as `&dyn` ports; nothing here reads
//! ambient configuration.

mod fs;
mod locks;
mod memory;
mod ports;
mod tracker;
mod versions;

pub use fs::{FsArtifactStore, FsMetadataStore, FsSnapshotStore, MIGRATIONS_DIR, atomic_write};
pub use locks::{FileLock, ResourceLocks};
pub use memory::{InMemoryArtifactStore, InMemoryMetadataStore, InMemorySnapshotStore};
pub use ports::{
    ArtifactSet, ArtifactStore, Clock, CreateOutcome, FixedClock, MetadataStore, SnapshotStore,
    SystemClock,
};
pub use tracker::{FingerprintTracker, TrackerError};
pub use versions::{VersionError, VersionManager};
