//! Host-facing error type.

use thiserror::Error;

use acctsync_core::{Domain, Operation};
use acctsync_queue::QueueError;

/// Why an account change could not be propagated.
///
/// `Display` is the human-readable message the host logs; [`SyncError::code`]
/// is the matching OS-style error number.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Queueing was required and failed. Shown exactly as the queue reported
    /// it, e.g. `cannot open lock file <path>: No such file or directory`.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// The delivery client rejected the change as permanently undeliverable.
    #[error("cannot sync {operation} change for {principal} to {domain}: {message}")]
    Delivery {
        principal: String,
        domain: Domain,
        operation: Operation,
        message: String,
    },
}

impl SyncError {
    pub fn code(&self) -> i32 {
        match self {
            SyncError::Queue(e) => e.code(),
            SyncError::Delivery { .. } => libc::EIO,
        }
    }
}
