use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Per-resource mutexes. Operations on different names never contend.
#[derive(Debug, Clone, Default)]
pub struct ResourceLocks {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl ResourceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `name`.
    pub fn with_lock<T>(&self, name: &str, f: impl FnOnce() -> T) -> T {
        let slot = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(map.entry(name.to_string()).or_default())
        };
        let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }
}

const LOCK_ATTEMPTS: u32 = 200;
const LOCK_BACKOFF: Duration = Duration::from_millis(10);

/// Exclusive lock file created with create-new semantics; removed on drop.
/// Serializes read-modify-write across processes.
#[derive(Debug)]
pub struct FileLock {
    path: Utf8PathBuf,
}

impl FileLock {
    pub fn acquire(path: &Utf8Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create lock directory {}", parent))?;
        }
        for attempt in 0..LOCK_ATTEMPTS {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(path)
            {
                Ok(_) => {
                    if attempt > 0 {
                        debug!(path = %path, attempt, "acquired lock after waiting");
                    }
                    return Ok(Self {
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => thread::sleep(LOCK_BACKOFF),
                Err(e) => return Err(e).with_context(|| format!("create lock file {}", path)),
            }
        }
        anyhow::bail!(
            "resource is locked by another process: {} (remove it if no specsync process is running)",
            path
        )
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path, error = %e, "failed to release lock file");
        }
    }
}
