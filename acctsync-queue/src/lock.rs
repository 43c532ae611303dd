//! Advisory exclusive lock on `<queue-dir>/.lock`.
//!
//! The lock file is opened with create-but-never-truncate semantics and then
//! locked with `flock(LOCK_EX | LOCK_NB)` (via `fs2`), retried with capped
//! exponential backoff until the queue directory's lock timeout expires.
//! Dropping the guard releases the lock on every exit path; the lock file
//! itself stays in place for the next writer.
//!
//! A missing queue directory surfaces immediately as
//! [`QueueError::QueueUnavailable`] rather than as a wait.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::dir::QueueDir;
use crate::error::{io_err, QueueError};

const BACKOFF_START: Duration = Duration::from_millis(5);
const BACKOFF_MAX: Duration = Duration::from_millis(200);

/// Held exclusive lock on a queue directory.
#[derive(Debug)]
pub struct QueueLock {
    file: File,
    path: PathBuf,
}

impl QueueLock {
    /// Block until the queue lock is held or the lock timeout expires.
    pub fn acquire(dir: &QueueDir) -> Result<Self, QueueError> {
        let path = dir.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| QueueError::QueueUnavailable {
                path: path.clone(),
                source,
            })?;

        let start = Instant::now();
        let mut backoff = BACKOFF_START;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    tracing::debug!("acquired {}", path.display());
                    return Ok(Self { file, path });
                }
                Err(e) if is_contended(&e) => {}
                Err(e) => return Err(io_err(path, e)),
            }

            let waited = start.elapsed();
            if waited >= dir.lock_timeout() {
                tracing::warn!(
                    "gave up on {} after {}ms",
                    path.display(),
                    waited.as_millis()
                );
                return Err(QueueError::LockTimeout { path, waited });
            }
            std::thread::sleep(backoff.min(dir.lock_timeout() - waited));
            backoff = (backoff * 2).min(BACKOFF_MAX);
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for QueueLock {
    fn drop(&mut self) {
        match FileExt::unlock(&self.file) {
            Ok(()) => tracing::debug!("released {}", self.path.display()),
            Err(e) => tracing::warn!("failed to unlock {}: {e}", self.path.display()),
        }
    }
}

fn is_contended(err: &std::io::Error) -> bool {
    err.kind() == ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
