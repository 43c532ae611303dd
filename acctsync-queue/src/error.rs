//! Error types for acctsync-queue.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use acctsync_core::CoreError;

/// All errors that can arise from queue operations.
///
/// None of them are retried internally; each is terminal for the call that
/// produced it.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The lock file could not be opened, almost always because the queue
    /// directory is missing.
    #[error("cannot open lock file {path}: {}", os_message(.source))]
    QueueUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out after {}ms waiting for lock file {path}", .waited.as_millis())]
    LockTimeout { path: PathBuf, waited: Duration },

    /// Every sequence suffix for one principal/domain/operation/second is taken.
    #[error("no free queue name for {base}: all sequence suffixes are taken")]
    ExhaustedNamespace { base: String },

    #[error("I/O error at {path}: {}", os_message(.source))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A queue entry on disk is not a valid change record.
    #[error("cannot parse queue entry {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: CoreError,
    },
}

impl QueueError {
    /// OS-style error number for hosts that report failures as errno values.
    pub fn code(&self) -> i32 {
        match self {
            QueueError::QueueUnavailable { source, .. } | QueueError::Io { source, .. } => {
                source.raw_os_error().unwrap_or(libc::EIO)
            }
            QueueError::LockTimeout { .. } => libc::ETIMEDOUT,
            QueueError::ExhaustedNamespace { .. } => libc::EEXIST,
            QueueError::Parse { .. } => libc::EINVAL,
        }
    }
}

/// The system error text without the ` (os error N)` suffix std appends,
/// so messages read like `strerror(3)` output.
pub fn os_message(err: &std::io::Error) -> String {
    let text = err.to_string();
    match err.raw_os_error() {
        Some(code) => match text.strip_suffix(&format!(" (os error {code})")) {
            Some(bare) => bare.to_owned(),
            None => text,
        },
        None => text,
    }
}

/// Convenience constructor for [`QueueError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> QueueError {
    QueueError::Io {
        path: path.into(),
        source,
    }
}
