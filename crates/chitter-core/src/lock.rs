//! Cross-process session lock
//!
//! One lock file per session under `locks/`. Acquisition blocks with no
//! timeout: a stuck holder stalls its siblings, which is accepted because
//! holders are short-lived processes. The lock is released when the guard
//! is dropped, on every exit path.
//!
//! Lock files are never deleted; removing one while another process holds
//! it would let a third process lock a fresh inode concurrently.

use std::{
    fs::File,
    path::{Path, PathBuf},
    time::Instant,
};

use fs2::FileExt;

use crate::{ids::SessionId, Error, Result};

/// Exclusive lock on one session, released on drop
#[derive(Debug)]
pub struct SessionLock {
    file: File,
    lock_path: PathBuf,
}

impl SessionLock {
    /// Block until the session lock is held.
    ///
    /// Creates the lock artifact (and its directory) on demand.
    pub fn acquire(locks_dir: &Path, session: &SessionId) -> Result<Self> {
        std::fs::create_dir_all(locks_dir)
            .map_err(|e| Error::Io(format!("Failed to create lock directory: {e}")))?;
        let lock_path = locks_dir.join(format!("{session}.lock"));

        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| {
                Error::Io(format!(
                    "Failed to open lock file '{}': {e}",
                    lock_path.display()
                ))
            })?;

        let started = Instant::now();
        file.lock_exclusive().map_err(|e| {
            Error::Io(format!(
                "Failed to acquire session lock '{}': {e}",
                lock_path.display()
            ))
        })?;

        tracing::debug!(
            session = %session,
            waited_ms = started.elapsed().as_millis(),
            "acquired session lock"
        );
        Ok(Self { file, lock_path })
    }

    /// Get the path to the lock file
    #[must_use]
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("Failed to release session lock {}: {e}", self.lock_path.display());
        } else {
            tracing::debug!("Released session lock: {}", self.lock_path.display());
        }
    }
}
