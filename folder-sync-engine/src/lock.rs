//! Single-instance run lock.
//!
//! An exclusive, non-blocking `flock` on the configured lockfile. The lock
//! belongs to the open file, so it is released when the guard drops or the
//! process dies; a stale lockfile on disk never blocks a later run.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{io_err, SyncError};

/// Held for the duration of a run.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Try to take the lock at `path`.
    ///
    /// Returns `Ok(None)` when another holder has it.
    pub fn try_acquire(path: &Path) -> Result<Option<Self>, SyncError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| io_err(path, e))?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                tracing::debug!(lockfile = %path.display(), "lock held elsewhere");
                return Ok(None);
            }
            Err(e) => return Err(io_err(path, e)),
        }

        // Informational only; the flock is what excludes other runs.
        if file.set_len(0).is_ok() {
            let _ = writeln!(file, "{}", std::process::id());
        }
        tracing::debug!(lockfile = %path.display(), "lock acquired");
        Ok(Some(Self {
            file,
            path: path.to_path_buf(),
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::debug!(lockfile = %self.path.display(), error = %e, "unlock failed");
        }
    }
}
