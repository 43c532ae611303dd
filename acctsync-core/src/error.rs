//! Error types for acctsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// Validation failures for domain values and serialized change records.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid principal {value:?}: {reason}")]
    InvalidPrincipal { value: String, reason: &'static str },

    #[error("invalid domain {value:?}: {reason}")]
    InvalidDomain { value: String, reason: &'static str },

    #[error("unknown operation {0:?}; expected: password, enable, disable")]
    UnknownOperation(String),

    /// A serialized change record did not have the expected line layout.
    #[error("malformed change record: {0}")]
    MalformedRecord(String),
}

/// All errors that can arise while loading sync configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file exists but could not be read.
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error, with file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
