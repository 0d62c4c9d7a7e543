//! Single active run per project.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::RunId;
use crate::error::{PromoteError, Result};

/// Lock file held for the duration of a run.
///
/// The file is created with `create_new`, so two processes racing for it
/// cannot both succeed. It is removed when the guard is dropped.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Lock file location for a work directory.
    pub fn path_for(work_dir: &Path) -> PathBuf {
        work_dir.join("run.lock")
    }

    /// Take the lock for `run_id`.
    ///
    /// # Errors
    ///
    /// Returns `RunInProgress` naming the current holder if the lock exists.
    pub fn acquire(work_dir: &Path, run_id: &RunId) -> Result<Self> {
        fs::create_dir_all(work_dir)?;
        let path = Self::path_for(work_dir);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                writeln!(file, "{} pid={}", run_id, std::process::id())?;
                tracing::debug!(run_id = %run_id, "acquired run lock");
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let holder = fs::read_to_string(&path)
                    .map(|s| s.trim().to_string())
                    .unwrap_or_default();
                Err(PromoteError::RunInProgress {
                    holder: if holder.is_empty() {
                        "unknown run".to_string()
                    } else {
                        holder
                    },
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a stale lock. Returns whether one existed.
    pub fn break_lock(work_dir: &Path) -> Result<bool> {
        let path = Self::path_for(work_dir);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::warn!("removed run lock {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!("failed to release run lock {}: {}", self.path.display(), e);
        }
    }
}
