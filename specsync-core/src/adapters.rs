//! Default filesystem-backed port implementations.

use crate::pipeline::Ports;
use crate::ports::ContractSource;
use crate::settings::ProjectSettings;
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use specsync_store::{FsArtifactStore, FsMetadataStore, FsSnapshotStore, SystemClock};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Extensions recognised as contracts, in lookup priority order.
const EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// Reads `<specs_dir>/<name>.{yaml,yml,json}`.
#[derive(Debug, Clone)]
pub struct FsContractSource {
    pub specs_dir: Utf8PathBuf,
}

impl FsContractSource {
    pub fn new(specs_dir: Utf8PathBuf) -> Self {
        Self { specs_dir }
    }

    /// The file backing `name`, if any.
    pub fn path_of(&self, name: &str) -> Option<Utf8PathBuf> {
        EXTENSIONS
            .iter()
            .map(|ext| self.specs_dir.join(format!("{name}.{ext}")))
            .find(|p| p.is_file())
    }
}

impl ContractSource for FsContractSource {
    fn names(&self) -> anyhow::Result<Vec<String>> {
        let mut by_name: BTreeMap<String, Utf8PathBuf> = BTreeMap::new();
        for ext in EXTENSIONS {
            let pattern = format!(
                "{}/*.{ext}",
                glob::Pattern::escape(self.specs_dir.as_str())
            );
            for entry in glob::glob(&pattern).with_context(|| format!("glob {}", pattern))? {
                let path = entry.with_context(|| format!("glob {}", pattern))?;
                let Ok(path) = Utf8PathBuf::from_path_buf(path) else {
                    continue;
                };
                let Some(stem) = path.file_stem() else {
                    continue;
                };
                if let Some(first) = by_name.get(stem) {
                    warn!(kept = %first, ignored = %path, "two contract files share a name");
                    continue;
                }
                by_name.insert(stem.to_string(), path);
            }
        }
        debug!(dir = %self.specs_dir, count = by_name.len(), "discovered contracts");
        Ok(by_name.into_keys().collect())
    }

    fn read(&self, name: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let Some(path) = self.path_of(name) else {
            return Ok(None);
        };
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read {}", path)),
        }
    }

    fn describe(&self) -> String {
        self.specs_dir.to_string()
    }
}

/// In-memory contract source for embedding and testing. Contracts can be
/// replaced while a pipeline holds a reference to the source.
#[derive(Debug, Default)]
pub struct InMemoryContractSource {
    contracts: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryContractSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.guard().insert(name.into(), bytes.into());
    }

    fn guard(&self) -> MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.contracts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ContractSource for InMemoryContractSource {
    fn names(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.guard().keys().cloned().collect())
    }

    fn read(&self, name: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.guard().get(name).cloned())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Every filesystem adapter for one project, owned together.
#[derive(Debug)]
pub struct FsBackend {
    pub contracts: FsContractSource,
    pub metadata: FsMetadataStore,
    pub snapshots: FsSnapshotStore,
    pub artifacts: FsArtifactStore,
    pub clock: SystemClock,
}

impl FsBackend {
    pub fn new(settings: &ProjectSettings) -> Self {
        Self {
            contracts: FsContractSource::new(settings.specs_dir.clone()),
            metadata: FsMetadataStore::new(settings.state_dir.clone()),
            snapshots: FsSnapshotStore::new(settings.state_dir.clone()),
            artifacts: FsArtifactStore::new(
                settings.artifacts_dir.clone(),
                settings.state_dir.clone(),
            ),
            clock: SystemClock,
        }
    }

    pub fn ports(&self) -> Ports<'_> {
        Ports {
            contracts: &self.contracts,
            metadata: &self.metadata,
            snapshots: &self.snapshots,
            artifacts: &self.artifacts,
            clock: &self.clock,
        }
    }
}

/// `true` if `dir` exists and holds at least one contract file.
pub fn has_contracts(dir: &Utf8Path) -> anyhow::Result<bool> {
    Ok(!FsContractSource::new(dir.to_path_buf()).names()?.is_empty())
}
