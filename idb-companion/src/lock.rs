//! Cross-process advisory lock on `<state_file>.lock`.
//!
//! The in-process `tokio::sync::Mutex` only serializes tasks sharing one
//! [`CompanionRegistry`](crate::CompanionRegistry). Mutations additionally hold
//! an exclusive `flock` so separate registries (and separate processes)
//! pointed at the same file cannot interleave read-modify-write cycles.

use std::fs::{File, OpenOptions};
use std::path::PathBuf;

use fs2::FileExt;

use crate::error::{io_err, RegistryError};

/// Held for the duration of one mutation. Unlocks on drop.
#[derive(Debug)]
pub(crate) struct StateFileLock {
    file: File,
    path: PathBuf,
}

impl StateFileLock {
    /// Block (on the blocking pool) until the exclusive lock is held.
    ///
    /// Creates the lock file and its parent directory if absent.
    pub(crate) async fn acquire(path: PathBuf) -> Result<Self, RegistryError> {
        tokio::task::spawn_blocking(move || Self::acquire_blocking(path)).await?
    }

    fn acquire_blocking(path: PathBuf) -> Result<Self, RegistryError> {
        if let Some(dir) = path.parent() {
            crate::registry::ensure_state_dir(dir)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| io_err(&path, e))?;
        FileExt::lock_exclusive(&file).map_err(|e| io_err(&path, e))?;
        tracing::trace!(path = %path.display(), "state file lock acquired");
        Ok(Self { file, path })
    }
}

impl Drop for StateFileLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            tracing::warn!(
                path = %self.path.display(),
                error = %err,
                "failed to release state file lock"
            );
        }
    }
}
