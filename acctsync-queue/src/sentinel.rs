//! Sentinel index: is immediate delivery suppressed for a principal/domain?
//!
//! Checks are presence-only. File contents are never read and the timestamp
//! in a sentinel's name is never compared with the clock, so a sentinel
//! named `test-ad-19700101T000000Z` blocks exactly as well as a fresh one.
//! Sentinels never expire; they are removed by an administrator.
//!
//! Scans hold the queue lock, so the routing decision never races a writer
//! or an administrator. A missing queue directory is therefore reported as
//! [`QueueError::QueueUnavailable`] before any delivery is attempted.

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use acctsync_core::{Domain, Operation};

use crate::dir::QueueDir;
use crate::error::{io_err, QueueError};
use crate::lock::QueueLock;
use crate::namer::{FileKind, QueueFileName};

/// True if a sentinel (`<p>-<d>-<timestamp>` or `<p>-<d>-*-<timestamp>`)
/// exists for the pair. Such a sentinel blocks every operation.
///
/// This is the administrative query behind `acctsync block`; dispatch asks
/// [`is_blocked_for`], which also honours class markers and pending entries.
pub fn is_blocked(dir: &QueueDir, principal: &str, domain: &Domain) -> Result<bool, QueueError> {
    let _lock = QueueLock::acquire(dir)?;
    Ok(!sentinels_for(dir, principal, domain)?.is_empty())
}

/// True if `operation` must be queued rather than delivered for the pair:
/// a sentinel exists, a class marker for the operation's class exists, or
/// an earlier change of the same class is still waiting in the queue.
pub fn is_blocked_for(
    dir: &QueueDir,
    principal: &str,
    domain: &Domain,
    operation: Operation,
) -> Result<bool, QueueError> {
    let _lock = QueueLock::acquire(dir)?;
    let blocking = scan(dir, |name| {
        name.blocks(principal, domain, Some(operation.class()))
    })?;
    if let Some((name, _)) = blocking.first() {
        tracing::debug!("{name} blocks immediate delivery");
    }
    Ok(!blocking.is_empty())
}

/// Plain and wildcard sentinels for the pair. Caller holds the lock.
fn sentinels_for(
    dir: &QueueDir,
    principal: &str,
    domain: &Domain,
) -> Result<Vec<(QueueFileName, PathBuf)>, QueueError> {
    scan(dir, |name| {
        name.kind() == FileKind::Sentinel && name.blocks(principal, domain, None)
    })
}

fn scan(
    dir: &QueueDir,
    mut matches: impl FnMut(&QueueFileName) -> bool,
) -> Result<Vec<(QueueFileName, PathBuf)>, QueueError> {
    let entries = fs::read_dir(dir.path()).map_err(|e| io_err(dir.path(), e))?;
    let mut found = Vec::new();
    for entry in entries.filter_map(|e| e.ok()) {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str().and_then(QueueFileName::parse) else {
            continue;
        };
        if matches(&name) {
            found.push((name, entry.path()));
        }
    }
    Ok(found)
}

// ---------------------------------------------------------------------------
// Administration
// ---------------------------------------------------------------------------

/// Create a zero-length sentinel for the pair, stamped with `at`.
///
/// This is the administrative "mark unreachable" action; the dispatch path
/// never calls it. Holds the queue lock.
pub fn block(
    dir: &QueueDir,
    principal: &str,
    domain: &Domain,
    at: DateTime<Utc>,
) -> Result<PathBuf, QueueError> {
    let _lock = QueueLock::acquire(dir)?;
    let name = QueueFileName::sentinel(principal, domain, at);
    let path = dir.path().join(name.to_string());
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .map_err(|e| io_err(&path, e))?;
    tracing::info!("blocked immediate delivery for {principal} to {domain}");
    Ok(path)
}

/// Remove every sentinel for the pair. Queue entries and class markers are
/// left alone. Returns the number of sentinels removed. Holds the queue lock.
pub fn unblock(dir: &QueueDir, principal: &str, domain: &Domain) -> Result<usize, QueueError> {
    let _lock = QueueLock::acquire(dir)?;

    let mut removed = 0;
    for (_, path) in sentinels_for(dir, principal, domain)? {
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(io_err(path, e)),
        }
    }
    tracing::info!("removed {removed} sentinel(s) for {principal} to {domain}");
    Ok(removed)
}
