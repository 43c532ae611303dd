//! Reading the queue back: decoding entries, listing, crash recovery.
//!
//! Listing takes no lock and tolerates concurrent writers and consumers.
//! Results are sorted by `(timestamp, seq)`, the order in which entries for
//! one principal/domain/operation were assigned under the lock. Across
//! processes that order is not the order in which callers *started* their
//! enqueue calls.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use zeroize::Zeroizing;

use acctsync_core::ChangeRecord;

use crate::dir::QueueDir;
use crate::error::{io_err, QueueError};
use crate::lock::QueueLock;
use crate::namer::{is_temporary, FileKind, QueueFileName};

/// One recognised file in the queue directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueListing {
    pub name: QueueFileName,
    pub path: PathBuf,
}

impl QueueListing {
    pub fn kind(&self) -> FileKind {
        self.name.kind()
    }
}

/// Decode the change record stored in a queue entry file.
pub fn read_entry(path: &Path) -> Result<ChangeRecord, QueueError> {
    let text = Zeroizing::new(fs::read_to_string(path).map_err(|e| io_err(path, e))?);
    ChangeRecord::parse(&text).map_err(|source| QueueError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Every entry, sentinel and class marker in the queue, oldest first.
pub fn list(dir: &QueueDir) -> Result<Vec<QueueListing>, QueueError> {
    let entries = fs::read_dir(dir.path()).map_err(|e| io_err(dir.path(), e))?;

    let mut listings: Vec<QueueListing> = entries
        .filter_map(|e| e.ok())
        .filter_map(|entry| {
            let name = QueueFileName::parse(entry.file_name().to_str()?)?;
            Some(QueueListing {
                name,
                path: entry.path(),
            })
        })
        .collect();
    listings.sort_by(|a, b| {
        (a.name.timestamp, a.name.seq)
            .cmp(&(b.name.timestamp, b.name.seq))
            .then_with(|| a.path.cmp(&b.path))
    });
    Ok(listings)
}

/// Only the queue entries (files carrying a change record), oldest first.
pub fn entries(dir: &QueueDir) -> Result<Vec<QueueListing>, QueueError> {
    Ok(list(dir)?
        .into_iter()
        .filter(|l| l.kind() == FileKind::Entry)
        .collect())
}

/// Remove temporaries left behind by writers that died mid-enqueue.
///
/// Runs under the queue lock, so no live writer can own a temporary.
pub fn recover(dir: &QueueDir) -> Result<usize, QueueError> {
    let _lock = QueueLock::acquire(dir)?;
    let entries = fs::read_dir(dir.path()).map_err(|e| io_err(dir.path(), e))?;

    let mut removed = 0;
    for entry in entries.filter_map(|e| e.ok()) {
        let is_tmp = entry.file_name().to_str().is_some_and(is_temporary);
        if !is_tmp {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => {
                tracing::warn!("removed abandoned write {}", entry.path().display());
                removed += 1;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(io_err(entry.path(), e)),
        }
    }
    Ok(removed)
}
