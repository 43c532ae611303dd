//! Queue writer.
//!
//! ## Publish protocol
//!
//! 1. Acquire the queue lock (held until return).
//! 2. Read the clock, so suffixes follow lock-acquisition order.
//! 3. Write the serialized record to `.tmp-<pid>-<nanos>`, created with
//!    `create_new` and mode `0600`, then `fsync`.
//! 4. Ask the namer for the first free `<base>-NN`.
//! 5. `hard_link` the temporary onto that name. Linking never replaces an
//!    existing file, so a name taken behind the namer's back just moves on
//!    to the next suffix.
//! 6. Remove the temporary and `fsync` the directory.
//!
//! Readers never see a partially written entry: the entry name only appears
//! once the content is complete and on disk.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use acctsync_core::ChangeRecord;

use crate::dir::{QueueDir, TMP_PREFIX};
use crate::error::{io_err, QueueError};
use crate::lock::QueueLock;
use crate::namer::{self, QueueFileName, SEQ_LIMIT};

/// A change record that is now durably queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enqueued {
    pub name: QueueFileName,
    pub path: PathBuf,
}

/// Persist `record` in the queue, stamped with the current UTC second.
pub fn enqueue(dir: &QueueDir, record: &ChangeRecord) -> Result<Enqueued, QueueError> {
    let _lock = QueueLock::acquire(dir)?;
    publish_locked(dir, record, Utc::now())
}

/// Persist `record` in the queue, stamped with `at` instead of the clock.
pub fn enqueue_at(
    dir: &QueueDir,
    record: &ChangeRecord,
    at: DateTime<Utc>,
) -> Result<Enqueued, QueueError> {
    let _lock = QueueLock::acquire(dir)?;
    publish_locked(dir, record, at)
}

fn publish_locked(
    dir: &QueueDir,
    record: &ChangeRecord,
    at: DateTime<Utc>,
) -> Result<Enqueued, QueueError> {
    let tmp = write_temporary(dir, record)?;
    let result = link_into_place(dir, record, at, &tmp);

    // On success the entry keeps its own link; on failure this is the only one.
    if let Err(e) = fs::remove_file(&tmp) {
        tracing::warn!("could not remove {}: {e}", tmp.display());
    }
    if result.is_ok() {
        sync_dir(dir.path());
    }
    result
}

fn write_temporary(dir: &QueueDir, record: &ChangeRecord) -> Result<PathBuf, QueueError> {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let tmp = dir
        .path()
        .join(format!("{TMP_PREFIX}{}-{nanos}", std::process::id()));

    let mut file = owner_only()
        .write(true)
        .create_new(true)
        .open(&tmp)
        .map_err(|e| io_err(&tmp, e))?;

    let text = record.to_text();
    if let Err(e) = file.write_all(text.as_bytes()).and_then(|()| file.sync_all()) {
        drop(file);
        let _ = fs::remove_file(&tmp);
        return Err(io_err(tmp, e));
    }
    Ok(tmp)
}

fn link_into_place(
    dir: &QueueDir,
    record: &ChangeRecord,
    at: DateTime<Utc>,
    tmp: &Path,
) -> Result<Enqueued, QueueError> {
    let mut from = 0;
    loop {
        let name = namer::next_free(dir, record, at, from)?;
        let path = dir.path().join(name.to_string());
        match fs::hard_link(tmp, &path) {
            Ok(()) => {
                tracing::info!(
                    "queued {} change for {}: {name}",
                    record.operation(),
                    record.principal()
                );
                return Ok(Enqueued { name, path });
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                tracing::debug!("lost race for {name}, trying next suffix");
                from = name.seq.map_or(SEQ_LIMIT, |seq| seq + 1);
            }
            Err(e) => return Err(io_err(path, e)),
        }
    }
}

#[cfg(unix)]
fn owner_only() -> OpenOptions {
    use std::os::unix::fs::OpenOptionsExt;

    let mut options = OpenOptions::new();
    options.mode(0o600);
    options
}

#[cfg(not(unix))]
fn owner_only() -> OpenOptions {
    OpenOptions::new()
}

/// Make the new directory entry durable. Failure is logged, not returned:
/// the entry is already visible and the caller must not re-queue it.
fn sync_dir(path: &Path) {
    if let Err(e) = File::open(path).and_then(|d| d.sync_all()) {
        tracing::warn!("could not fsync {}: {e}", path.display());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
