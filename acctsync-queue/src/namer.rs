//! Queue file names and the timestamp namer.
//!
//! Entry names are `<principal>-<domain>-<operation>-<YYYYMMDDThhmmssZ>-<NN>`.
//! Within one second, `NN` runs from `00` to `99` in lock-acquisition order,
//! so `(timestamp, seq)` is the total order of entries written through the
//! lock. Names are parsed from the right: the timestamp, sequence and
//! operation segments never contain `-` and domains are restricted to
//! hyphen-free identifiers, so whatever remains on the left is the principal.

use std::fmt;
use std::io::ErrorKind;

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};

use acctsync_core::{ChangeRecord, Domain, Operation, OperationClass};

use crate::dir::{QueueDir, TMP_PREFIX};
use crate::error::{io_err, QueueError};

/// `chrono` format of the fixed-width UTC timestamp segment.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Number of sequence suffixes available per second.
pub const SEQ_LIMIT: u8 = 100;

const WILDCARD: &str = "*";

pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(segment: &str) -> Option<DateTime<Utc>> {
    if segment.len() != 16 {
        return None;
    }
    NaiveDateTime::parse_from_str(segment, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// What a file in the queue directory means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// A persisted change record.
    Entry,
    /// A marker blocking every operation for a principal/domain pair.
    Sentinel,
    /// An entry-shaped name without a sequence suffix: blocks one class.
    ClassMarker,
}

/// A parsed (or about-to-be-created) queue directory file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueFileName {
    pub principal: String,
    pub domain: Domain,
    /// `None` for sentinels, which cover every operation.
    pub operation: Option<Operation>,
    pub timestamp: DateTime<Utc>,
    pub seq: Option<u8>,
}

impl QueueFileName {
    pub fn entry(record: &ChangeRecord, at: DateTime<Utc>, seq: u8) -> Self {
        Self {
            principal: record.principal().to_owned(),
            domain: record.domain().clone(),
            operation: Some(record.operation()),
            timestamp: at.trunc_subsecs(0),
            seq: Some(seq),
        }
    }

    pub fn sentinel(principal: &str, domain: &Domain, at: DateTime<Utc>) -> Self {
        Self {
            principal: principal.to_owned(),
            domain: domain.clone(),
            operation: None,
            timestamp: at.trunc_subsecs(0),
            seq: None,
        }
    }

    /// Parse a directory entry name. Dot-files and anything not following
    /// the naming convention yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        if name.starts_with('.') {
            return None;
        }

        let (mut rest, mut seq) = (name, None);
        let (head, last) = rest.rsplit_once('-')?;
        if last.len() == 2 && last.bytes().all(|b| b.is_ascii_digit()) {
            seq = Some(last.parse::<u8>().ok()?);
            rest = head;
        }

        let (head, timestamp) = rest.rsplit_once('-')?;
        let timestamp = parse_timestamp(timestamp)?;

        let (head, segment) = head.rsplit_once('-')?;
        let (principal, domain, operation) = if segment == WILDCARD {
            let (principal, domain) = head.rsplit_once('-')?;
            (principal, domain, None)
        } else if let Ok(op) = segment.parse::<Operation>() {
            let (principal, domain) = head.rsplit_once('-')?;
            (principal, domain, Some(op))
        } else {
            (head, segment, None)
        };

        if principal.is_empty() || (seq.is_some() && operation.is_none()) {
            return None;
        }

        Some(Self {
            principal: principal.to_owned(),
            domain: Domain::new(domain).ok()?,
            operation,
            timestamp,
            seq,
        })
    }

    pub fn kind(&self) -> FileKind {
        match (self.operation, self.seq) {
            (Some(_), Some(_)) => FileKind::Entry,
            (Some(_), None) => FileKind::ClassMarker,
            (None, _) => FileKind::Sentinel,
        }
    }

    /// Whether this file suppresses immediate delivery of `class` changes
    /// for `principal`/`domain`. `None` asks about sentinels only.
    pub fn blocks(&self, principal: &str, domain: &Domain, class: Option<OperationClass>) -> bool {
        if self.principal != principal || &self.domain != domain {
            return false;
        }
        match (self.operation, class) {
            (None, _) => true,
            (Some(op), Some(class)) => op.class() == class,
            (Some(_), None) => false,
        }
    }

    /// `<principal>-<domain>[-<operation>]-<timestamp>`, without the suffix.
    pub fn base(&self) -> String {
        let ts = format_timestamp(&self.timestamp);
        match self.operation {
            Some(op) => format!("{}-{}-{}-{}", self.principal, self.domain, op, ts),
            None => format!("{}-{}-{}", self.principal, self.domain, ts),
        }
    }
}

impl fmt::Display for QueueFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base())?;
        if let Some(seq) = self.seq {
            write!(f, "-{seq:02}")?;
        }
        Ok(())
    }
}

/// First entry name for `record` at second `at`, with suffix `from` or
/// later, that does not already exist in `dir`.
///
/// Must be called under the queue lock; the caller still publishes with an
/// atomic create-if-absent so a writer ignoring the lock cannot be clobbered.
pub fn next_free(
    dir: &QueueDir,
    record: &ChangeRecord,
    at: DateTime<Utc>,
    from: u8,
) -> Result<QueueFileName, QueueError> {
    for seq in from..SEQ_LIMIT {
        let name = QueueFileName::entry(record, at, seq);
        let path = dir.path().join(name.to_string());
        match std::fs::symlink_metadata(&path) {
            Ok(_) => tracing::debug!("queue name taken: {name}"),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(name),
            Err(e) => return Err(io_err(path, e)),
        }
    }

    let base = QueueFileName::entry(record, at, 0).base();
    tracing::error!("queue namespace exhausted for {base}");
    Err(QueueError::ExhaustedNamespace { base })
}

/// Whether a directory entry name is an in-flight (or abandoned) write.
pub(crate) fn is_temporary(name: &str) -> bool {
    name.starts_with(TMP_PREFIX)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
