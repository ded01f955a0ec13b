// ABOUTME: Single-flight deploy lock so only one run per spec is active at a time.
// ABOUTME: Uses atomic file creation with lock info stored under the state directory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Information about who holds a deploy lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    /// Spec being deployed.
    pub spec: String,
}

impl LockInfo {
    pub fn new(spec_path: &Path) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
            spec: spec_path.display().to_string(),
        }
    }

    /// Locks older than an hour are considered abandoned.
    pub fn is_stale(&self) -> bool {
        let age = Utc::now() - self.started_at;
        age.num_hours() >= 1
    }

    /// `<state_dir>/<spec file stem>.lock`
    pub fn lock_path(state_dir: &Path, spec_path: &Path) -> PathBuf {
        let stem = spec_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "deployment".to_string());
        state_dir.join(format!("{stem}.lock"))
    }
}

/// A held deploy lock. Released explicitly or on drop.
#[derive(Debug)]
pub struct DeployLock {
    path: PathBuf,
    released: bool,
}

impl DeployLock {
    /// Acquire the lock for `spec_path`.
    ///
    /// Fails with `Error::LockHeld` if another live run holds it. Stale,
    /// corrupted, or forced locks are broken with a warning.
    pub fn acquire(state_dir: &Path, spec_path: &Path, force: bool) -> Result<Self> {
        fs::create_dir_all(state_dir)
            .map_err(|e| Error::Lock(format!("failed to create state directory: {e}")))?;

        let path = LockInfo::lock_path(state_dir, spec_path);
        let info = LockInfo::new(spec_path);
        let json = serde_json::to_string(&info)
            .map_err(|e| Error::Lock(format!("failed to serialize lock: {e}")))?;

        if Self::try_create(&path, &json)? {
            return Ok(Self {
                path,
                released: false,
            });
        }

        if let Some(existing) = Self::existing_holder(&path, force) {
            return Err(Error::LockHeld {
                holder: existing.holder,
                pid: existing.pid,
                since: existing.started_at,
            });
        }

        tracing::debug!(path = %path.display(), "removing stale/forced lock");
        let _ = fs::remove_file(&path);

        if !Self::try_create(&path, &json)? {
            return Err(Error::Lock(
                "lock acquired by another process during break".to_string(),
            ));
        }

        Ok(Self {
            path,
            released: false,
        })
    }

    fn try_create(path: &Path, json: &str) -> Result<bool> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                file.write_all(json.as_bytes())
                    .map_err(|e| Error::Lock(format!("failed to write lock: {e}")))?;
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(Error::Lock(format!("failed to acquire lock: {e}"))),
        }
    }

    /// The current holder, or `None` when the lock should be broken.
    fn existing_holder(path: &Path, force: bool) -> Option<LockInfo> {
        let Ok(content) = fs::read_to_string(path) else {
            tracing::warn!("lock info unreadable, breaking lock");
            return None;
        };

        match serde_json::from_str::<LockInfo>(&content) {
            Ok(existing) if force => {
                tracing::warn!(
                    "breaking lock held by {} (pid {}) since {}",
                    existing.holder,
                    existing.pid,
                    existing.started_at
                );
                None
            }
            Ok(existing) if existing.is_stale() => {
                tracing::warn!(
                    "auto-breaking stale lock held by {} (pid {}) since {}",
                    existing.holder,
                    existing.pid,
                    existing.started_at
                );
                None
            }
            Ok(existing) => Some(existing),
            Err(_) => {
                tracing::warn!("lock info corrupted, breaking lock");
                None
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(mut self) -> Result<()> {
        self.released = true;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Lock(format!("failed to remove lock file: {e}"))),
        }
    }
}

impl Drop for DeployLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = fs::remove_file(&self.path);
        }
    }
}
