//! The queue directory resource handle.
//!
//! ```text
//! <queue-dir>/
//!   .lock                                       (mutual-exclusion token)
//!   .tmp-<pid>-<nanos>                           (in-flight write, never read)
//!   <principal>-<domain>-<timestamp>             (sentinel, zero-length)
//!   <principal>-<domain>-<op>-<timestamp>-<NN>   (queue entry, mode 0600)
//! ```
//!
//! The directory is created and removed by external setup; nothing in this
//! crate creates it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use acctsync_core::SyncConfig;

pub const LOCK_FILE: &str = ".lock";
pub(crate) const TMP_PREFIX: &str = ".tmp-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueDir {
    path: PathBuf,
    lock_timeout: Duration,
}

impl QueueDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: Duration::from_millis(acctsync_core::config::DEFAULT_LOCK_TIMEOUT_MS),
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(&config.queue_dir).with_lock_timeout(config.lock_timeout())
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> PathBuf {
        self.path.join(LOCK_FILE)
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }
}
