//! Advisory lock on `data/db.lock`, taken shared while the document is read
//! and exclusive while it is replaced.

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::ErrorCode;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// Another `popo` process held the lock for the whole timeout.
    #[error("{} still locked after {waited:?}", path.display())]
    Timeout { path: PathBuf, waited: Duration },

    #[error("cannot open lock file: {0}")]
    Io(#[from] io::Error),
}

impl LockError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout { .. } => ErrorCode::LockContention,
            Self::Io(_) => ErrorCode::StoreIo,
        }
    }
}

/// Held for the duration of one read or one write; unlocks on drop.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
}

impl StoreLock {
    /// Lock for reading. Readers share; a writer excludes them.
    ///
    /// # Errors
    ///
    /// [`LockError::Timeout`] if a writer holds the lock past `timeout`.
    pub fn shared(path: &Path, timeout: Duration) -> Result<Self, LockError> {
        Self::acquire(path, timeout, <File as FileExt>::try_lock_shared)
    }

    /// Lock for replacing the document.
    ///
    /// # Errors
    ///
    /// [`LockError::Timeout`] if any other holder outlasts `timeout`.
    pub fn exclusive(path: &Path, timeout: Duration) -> Result<Self, LockError> {
        Self::acquire(path, timeout, <File as FileExt>::try_lock_exclusive)
    }

    fn acquire(
        path: &Path,
        timeout: Duration,
        try_lock: fn(&File) -> io::Result<()>,
    ) -> Result<Self, LockError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        let start = Instant::now();
        while try_lock(&file).is_err() {
            if start.elapsed() >= timeout {
                return Err(LockError::Timeout {
                    path: path.to_path_buf(),
                    waited: start.elapsed(),
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
        Ok(Self { file })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
