//! Clap-free project settings.

use camino::{Utf8Path, Utf8PathBuf};
use std::time::Duration;

/// Resolved locations and limits for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSettings {
    pub project_root: Utf8PathBuf,
    /// Working-copy contracts (`*.yaml`, `*.yml`, `*.json`).
    pub specs_dir: Utf8PathBuf,
    /// Tracker state, snapshots, backups and locks.
    pub state_dir: Utf8PathBuf,
    /// Generated artifacts and migration guides.
    pub artifacts_dir: Utf8PathBuf,
    /// Upper bound on the I/O phase of a sync.
    pub deadline: Option<Duration>,
}

impl ProjectSettings {
    /// Default layout under `root`.
    pub fn for_root(root: impl Into<Utf8PathBuf>) -> Self {
        let root = root.into();
        Self {
            specs_dir: root.join("specifications"),
            state_dir: root.join(".specsync"),
            artifacts_dir: root.join("generated"),
            project_root: root,
            deadline: None,
        }
    }

    /// Resolve `path` against the project root unless already absolute.
    pub fn resolve(&self, path: &Utf8Path) -> Utf8PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self::for_root(".")
    }
}
