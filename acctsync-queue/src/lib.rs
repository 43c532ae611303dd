//! # acctsync-queue
//!
//! Durable, lock-serialised on-disk queue of account changes.
//!
//! Call [`enqueue`] to persist a [`ChangeRecord`](acctsync_core::ChangeRecord)
//! under a [`QueueDir`], [`sentinel::is_blocked_for`] to ask whether
//! immediate delivery is currently suppressed, and [`reader::list`] to
//! inspect what is waiting.

pub mod dir;
pub mod error;
pub mod lock;
pub mod namer;
pub mod reader;
pub mod sentinel;
pub mod writer;

pub use dir::QueueDir;
pub use error::QueueError;
pub use lock::QueueLock;
pub use namer::{FileKind, QueueFileName};
pub use writer::{enqueue, enqueue_at, Enqueued};
