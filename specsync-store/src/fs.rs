//! Filesystem-backed port implementations.
//!
//! State directory layout (default `.specsync/`):
//!
//! ```text
//! tracked/<name>.json               TrackedSpec
//! locks/<name>.lock                 cross-process lock for tracker writes
//! snapshots/<name>/v<ver>.yaml      immutable snapshot bytes
//! snapshots/<name>/v<ver>.json      VersionRecord sidecar
//! snapshots/<name>/CURRENT          current version pointer
//! backups/<name>/<timestamp>[-n]/   artifact backups, never pruned
//! ```
//!
//! Artifacts live under their own directory (default `generated/`):
//! `<name>/` holds the artifact set, `migrations/<name>/` the guides.

use crate::locks::FileLock;
use crate::ports::{ArtifactSet, ArtifactStore, CreateOutcome, MetadataStore, SnapshotStore};
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use fs_err as fs;
use specsync_types::result::BackupRef;
use specsync_types::tracked::TrackedSpec;
use specsync_types::version::{Version, VersionRecord};
use std::collections::BTreeSet;
use std::io::{ErrorKind, Write};
use tracing::{debug, warn};

/// Directory name reserved for migration guides inside the artifacts root.
pub const MIGRATIONS_DIR: &str = "migrations";

/// Write-to-temp-then-rename.
pub fn atomic_write(path: &Utf8Path, bytes: &[u8]) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("{} has no parent directory", path))?;
    fs::create_dir_all(parent).with_context(|| format!("create {}", parent))?;
    let file_name = path.file_name().unwrap_or("file");
    let tmp = parent.join(format!(".{file_name}.tmp-{}", std::process::id()));
    fs::write(&tmp, bytes).with_context(|| format!("write {}", tmp))?;
    fs::rename(&tmp, path).with_context(|| format!("rename {} -> {}", tmp, path))
}

fn remove_optional(path: &Utf8Path) -> anyhow::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("remove {}", path)),
    }
}

fn read_optional(path: &Utf8Path) -> anyhow::Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("read {}", path)),
    }
}

/// Paths matching `pattern` relative to `root`, with `root` escaped.
fn glob_under(root: &Utf8Path, pattern: &str) -> anyhow::Result<Vec<Utf8PathBuf>> {
    let full = format!("{}/{}", glob::Pattern::escape(root.as_str()), pattern);
    let mut out = Vec::new();
    for entry in glob::glob(&full).with_context(|| format!("glob {}", full))? {
        let path = entry.with_context(|| format!("glob {}", full))?;
        match Utf8PathBuf::from_path_buf(path) {
            Ok(p) => out.push(p),
            Err(p) => debug!(path = %p.display(), "skipping non-UTF-8 path"),
        }
    }
    out.sort();
    Ok(out)
}

/// Regular files directly inside `dir`, keyed by file name.
fn read_dir_files(dir: &Utf8Path) -> anyhow::Result<ArtifactSet> {
    let mut files = ArtifactSet::new();
    for path in glob_under(dir, "*")? {
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name() else {
            continue;
        };
        let bytes = fs::read(&path).with_context(|| format!("read {}", path))?;
        files.insert(name.to_string(), bytes);
    }
    Ok(files)
}

fn write_dir_files(dir: &Utf8Path, files: &ArtifactSet) -> anyhow::Result<()> {
    for (name, bytes) in files {
        let path = dir.join(name);
        fs::write(&path, bytes).with_context(|| format!("write {}", path))?;
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct FsMetadataStore {
    root: Utf8PathBuf,
}

impl FsMetadataStore {
    pub fn new(state_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: state_dir.into(),
        }
    }

    fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join("tracked").join(format!("{name}.json"))
    }

    fn lock(&self, name: &str) -> anyhow::Result<FileLock> {
        FileLock::acquire(&self.root.join("locks").join(format!("{name}.lock")))
    }
}

impl MetadataStore for FsMetadataStore {
    fn get(&self, name: &str) -> anyhow::Result<Option<TrackedSpec>> {
        let path = self.path(name);
        let Some(bytes) = read_optional(&path)? else {
            return Ok(None);
        };
        let spec = serde_json::from_slice(&bytes).with_context(|| format!("parse {}", path))?;
        Ok(Some(spec))
    }

    fn set(&self, spec: &TrackedSpec) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec_pretty(spec).context("serialize tracked spec")?;
        atomic_write(&self.path(&spec.name), &bytes)
    }

    fn compare_and_swap(
        &self,
        name: &str,
        expected: Option<u64>,
        next: &TrackedSpec,
    ) -> anyhow::Result<bool> {
        let _lock = self.lock(name)?;
        let stored = self.get(name)?.map(|s| s.revision);
        if stored != expected {
            debug!(name, ?expected, ?stored, "compare-and-swap lost");
            return Ok(false);
        }
        self.set(next)?;
        Ok(true)
    }

    fn remove(&self, name: &str) -> anyhow::Result<bool> {
        let _lock = self.lock(name)?;
        let path = self.path(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("remove {}", path)),
        }
    }

    fn names(&self) -> anyhow::Result<Vec<String>> {
        Ok(glob_under(&self.root, "tracked/*.json")?
            .iter()
            .filter_map(|p| p.file_stem().map(str::to_string))
            .collect())
    }
}

#[derive(Debug, Clone)]
pub struct FsSnapshotStore {
    root: Utf8PathBuf,
}

impl FsSnapshotStore {
    pub fn new(state_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: state_dir.into(),
        }
    }

    fn relative(name: &str, version: &Version, ext: &str) -> String {
        format!("snapshots/{name}/v{version}.{ext}")
    }

    fn dir(&self, name: &str) -> Utf8PathBuf {
        self.root.join("snapshots").join(name)
    }
}

impl SnapshotStore for FsSnapshotStore {
    fn create(
        &self,
        name: &str,
        version: &Version,
        bytes: &[u8],
    ) -> anyhow::Result<CreateOutcome> {
        let dir = self.dir(name);
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir))?;
        let location = Self::relative(name, version, "yaml");
        let path = self.root.join(&location);

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Ok(CreateOutcome::AlreadyExists);
            }
            Err(e) => return Err(e).with_context(|| format!("create {}", path)),
        };
        if let Err(e) = file.write_all(bytes).and_then(|()| file.sync_all()) {
            drop(file);
            // A torn snapshot would block this version forever.
            if let Err(cleanup) = remove_optional(&path) {
                warn!(path = %path, error = %cleanup, "could not remove torn snapshot");
            }
            return Err(e).with_context(|| format!("write {}", path));
        }
        Ok(CreateOutcome::Created { location })
    }

    fn write_record(&self, record: &VersionRecord) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec_pretty(record).context("serialize version record")?;
        let path = self
            .root
            .join(Self::relative(&record.name, &record.version, "json"));
        atomic_write(&path, &bytes)
    }

    fn read(&self, name: &str, version: &Version) -> anyhow::Result<Option<Vec<u8>>> {
        read_optional(&self.root.join(Self::relative(name, version, "yaml")))
    }

    fn record(&self, name: &str, version: &Version) -> anyhow::Result<Option<VersionRecord>> {
        let path = self.root.join(Self::relative(name, version, "json"));
        let Some(bytes) = read_optional(&path)? else {
            return Ok(None);
        };
        let record = serde_json::from_slice(&bytes).with_context(|| format!("parse {}", path))?;
        Ok(Some(record))
    }

    fn versions(&self, name: &str) -> anyhow::Result<Vec<Version>> {
        let mut versions: Vec<Version> = glob_under(&self.dir(name), "v*.yaml")?
            .iter()
            .filter_map(|p| p.file_stem().and_then(|s| s.parse().ok()))
            .collect();
        versions.sort();
        Ok(versions)
    }

    fn current(&self, name: &str) -> anyhow::Result<Option<Version>> {
        let path = self.dir(name).join("CURRENT");
        let Some(bytes) = read_optional(&path)? else {
            return Ok(None);
        };
        let text = String::from_utf8_lossy(&bytes);
        let version = text
            .trim()
            .parse()
            .with_context(|| format!("parse {}", path))?;
        Ok(Some(version))
    }

    fn set_current(&self, name: &str, version: &Version) -> anyhow::Result<()> {
        atomic_write(
            &self.dir(name).join("CURRENT"),
            format!("{version}\n").as_bytes(),
        )
    }

    fn clear_current(&self, name: &str) -> anyhow::Result<()> {
        remove_optional(&self.dir(name).join("CURRENT"))
    }

    fn discard(&self, name: &str, version: &Version) -> anyhow::Result<()> {
        // Record first: a record without bytes is never listed.
        remove_optional(&self.root.join(Self::relative(name, version, "json")))?;
        remove_optional(&self.root.join(Self::relative(name, version, "yaml")))
    }

    fn names(&self) -> anyhow::Result<Vec<String>> {
        let names: BTreeSet<String> = glob_under(&self.root, "snapshots/*/v*.yaml")?
            .iter()
            .filter_map(|p| p.parent()?.file_name().map(str::to_string))
            .collect();
        Ok(names.into_iter().collect())
    }
}

#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    artifacts_dir: Utf8PathBuf,
    state_dir: Utf8PathBuf,
}

impl FsArtifactStore {
    pub fn new(artifacts_dir: impl Into<Utf8PathBuf>, state_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            artifacts_dir: artifacts_dir.into(),
            state_dir: state_dir.into(),
        }
    }

    fn set_dir(&self, name: &str) -> anyhow::Result<Utf8PathBuf> {
        if name == MIGRATIONS_DIR {
            anyhow::bail!("resource name {name:?} is reserved for migration guides");
        }
        Ok(self.artifacts_dir.join(name))
    }
}

impl ArtifactStore for FsArtifactStore {
    fn artifact_id(&self, name: &str) -> String {
        let root = self.artifacts_dir.file_name().unwrap_or("generated");
        format!("{root}/{name}")
    }

    fn read_set(&self, name: &str) -> anyhow::Result<Option<ArtifactSet>> {
        let dir = self.set_dir(name)?;
        if !dir.is_dir() {
            return Ok(None);
        }
        read_dir_files(&dir).map(Some)
    }

    fn replace_set(&self, name: &str, files: &ArtifactSet) -> anyhow::Result<()> {
        let target = self.set_dir(name)?;
        let pid = std::process::id();
        let staging = self.artifacts_dir.join(format!(".staging-{name}-{pid}"));
        let retired = self.artifacts_dir.join(format!(".retired-{name}-{pid}"));

        if staging.exists() {
            fs::remove_dir_all(&staging).with_context(|| format!("clear {}", staging))?;
        }
        fs::create_dir_all(&staging).with_context(|| format!("create {}", staging))?;
        write_dir_files(&staging, files)?;

        let had_previous = target.exists();
        if had_previous {
            if retired.exists() {
                fs::remove_dir_all(&retired).with_context(|| format!("clear {}", retired))?;
            }
            fs::rename(&target, &retired)
                .with_context(|| format!("rename {} -> {}", target, retired))?;
        }
        if let Err(e) = fs::rename(&staging, &target) {
            let err = anyhow::Error::new(e).context(format!("rename {} -> {}", staging, target));
            if had_previous && let Err(restore) = fs::rename(&retired, &target) {
                return Err(err.context(format!(
                    "restoring {} from {} also failed: {}",
                    target, retired, restore
                )));
            }
            return Err(err);
        }
        if had_previous {
            fs::remove_dir_all(&retired).with_context(|| format!("remove {}", retired))?;
        }
        debug!(name, files = files.len(), dir = %target, "replaced artifact set");
        Ok(())
    }

    fn remove_set(&self, name: &str) -> anyhow::Result<()> {
        let dir = self.set_dir(name)?;
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove {}", dir)),
        }
    }

    fn backup(
        &self,
        name: &str,
        files: &ArtifactSet,
        at: DateTime<Utc>,
    ) -> anyhow::Result<BackupRef> {
        let base = self.state_dir.join("backups").join(name);
        fs::create_dir_all(&base).with_context(|| format!("create {}", base))?;
        let stamp = at.format("%Y%m%dT%H%M%S%.6fZ").to_string();

        let mut seq = 0u32;
        let (id, dir) = loop {
            let id = if seq == 0 {
                stamp.clone()
            } else {
                format!("{stamp}-{seq}")
            };
            let dir = base.join(&id);
            match fs::create_dir(&dir) {
                Ok(()) => break (id, dir),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => seq += 1,
                Err(e) => return Err(e).with_context(|| format!("create {}", dir)),
            }
        };
        write_dir_files(&dir, files)?;
        Ok(BackupRef {
            name: name.to_string(),
            id,
            location: dir.to_string(),
            files: files.len() as u64,
        })
    }

    fn read_backup(&self, backup: &BackupRef) -> anyhow::Result<ArtifactSet> {
        read_dir_files(Utf8Path::new(&backup.location))
    }

    fn write_guide(&self, name: &str, file_name: &str, contents: &[u8]) -> anyhow::Result<String> {
        let path = self
            .artifacts_dir
            .join(MIGRATIONS_DIR)
            .join(name)
            .join(file_name);
        atomic_write(&path, contents)?;
        Ok(path.to_string())
    }

    fn remove_guide(&self, location: &str) -> anyhow::Result<()> {
        match fs::remove_file(location) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove {}", location)),
        }
    }
}
