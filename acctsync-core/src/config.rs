//! Sync configuration.
//!
//! # File format
//!
//! ```yaml
//! queue_dir: /var/spool/acctsync
//! lock_timeout_ms: 5000
//! targets:
//!   - domain: ad
//!     realms: [EXAMPLE.COM]
//!     passwords: true
//!     status: true
//!     queue_only: false
//! ```
//!
//! An empty file, or a file without `targets`, is a valid configuration in
//! which synchronisation is disabled.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{Domain, OperationClass, Principal};

pub const DEFAULT_QUEUE_DIR: &str = "/var/spool/acctsync";
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;

fn default_queue_dir() -> PathBuf {
    PathBuf::from(DEFAULT_QUEUE_DIR)
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

fn enabled() -> bool {
    true
}

/// Root of the YAML configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    #[serde(default = "default_queue_dir")]
    pub queue_dir: PathBuf,
    /// Upper bound on waiting for the queue lock, in milliseconds.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

/// One secondary system that account changes are propagated to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    pub domain: Domain,
    /// Realms whose principals are synced; empty means every realm.
    #[serde(default)]
    pub realms: Vec<String>,
    #[serde(default = "enabled")]
    pub passwords: bool,
    #[serde(default = "enabled")]
    pub status: bool,
    /// Always queue; never attempt immediate delivery.
    #[serde(default)]
    pub queue_only: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            queue_dir: default_queue_dir(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            targets: Vec::new(),
        }
    }
}

impl SyncConfig {
    /// Load and parse the configuration at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Like [`SyncConfig::load`], but a missing file yields the disabled
    /// default configuration.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Parse YAML text. Empty or comment-only documents give the default.
    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        let blank = contents
            .lines()
            .map(str::trim)
            .all(|line| line.is_empty() || line.starts_with('#'));
        if blank {
            return Ok(Self::default());
        }
        let value: serde_yaml::Value = serde_yaml::from_str(contents)?;
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_yaml::from_value(value)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn is_enabled(&self) -> bool {
        !self.targets.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Policy seam
// ---------------------------------------------------------------------------

/// A resolved sync destination for one account change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTarget {
    pub domain: Domain,
    pub queue_only: bool,
}

/// Decides where (if anywhere) a principal's changes are propagated.
///
/// An empty result means synchronisation is disabled for that change.
pub trait SyncPolicy {
    fn targets_for(&self, principal: &Principal, class: OperationClass) -> Vec<SyncTarget>;
}

impl SyncPolicy for SyncConfig {
    fn targets_for(&self, principal: &Principal, class: OperationClass) -> Vec<SyncTarget> {
        // Service and admin instances are never mirrored to the secondary.
        if principal.instance().is_some() {
            return Vec::new();
        }
        self.targets
            .iter()
            .filter(|t| match class {
                OperationClass::Password => t.passwords,
                OperationClass::Status => t.status,
            })
            .filter(|t| {
                t.realms.is_empty()
                    || principal
                        .realm()
                        .is_some_and(|realm| t.realms.iter().any(|r| r == realm))
            })
            .map(|t| SyncTarget {
                domain: t.domain.clone(),
                queue_only: t.queue_only,
            })
            .collect()
    }
}

impl<P: SyncPolicy + ?Sized> SyncPolicy for &P {
    fn targets_for(&self, principal: &Principal, class: OperationClass) -> Vec<SyncTarget> {
        (**self).targets_for(principal, class)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const FULL: &str = r#"
queue_dir: /tmp/queue
lock_timeout_ms: 250
targets:
  - domain: ad
    realms: [EXAMPLE.COM]
  - domain: ldap
    passwords: false
    queue_only: true
"#;

    fn principal(s: &str) -> Principal {
        Principal::parse(s).unwrap()
    }

    #[rstest]
    #[case("")]
    #[case("# nothing configured\n")]
    #[case("targets: []\n")]
    fn empty_documents_are_disabled(#[case] yaml: &str) {
        let config = SyncConfig::from_yaml(yaml).unwrap();
        assert!(!config.is_enabled());
        assert!(config
            .targets_for(&principal("test@EXAMPLE.COM"), OperationClass::Password)
            .is_empty());
    }

    #[test]
    fn full_document_parses() {
        let config = SyncConfig::from_yaml(FULL).unwrap();
        assert_eq!(config.queue_dir, PathBuf::from("/tmp/queue"));
        assert_eq!(config.lock_timeout(), Duration::from_millis(250));
        assert_eq!(config.targets.len(), 2);
        assert!(config.targets[0].passwords && config.targets[0].status);
        assert!(!config.targets[0].queue_only);
        assert!(config.targets[1].queue_only);
    }

    #[test]
    fn defaults_apply() {
        let config = SyncConfig::from_yaml("targets:\n  - domain: ad\n").unwrap();
        assert_eq!(config.queue_dir, PathBuf::from(DEFAULT_QUEUE_DIR));
        assert_eq!(config.lock_timeout_ms, DEFAULT_LOCK_TIMEOUT_MS);
    }

    #[test]
    fn invalid_domain_is_rejected() {
        assert!(SyncConfig::from_yaml("targets:\n  - domain: ad-west\n").is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(SyncConfig::from_yaml("queue_directory: /tmp\n").is_err());
    }

    #[test]
    fn targets_filter_by_class_and_realm() {
        let config = SyncConfig::from_yaml(FULL).unwrap();

        let pw = config.targets_for(&principal("test@EXAMPLE.COM"), OperationClass::Password);
        assert_eq!(pw.len(), 1);
        assert_eq!(pw[0].domain.as_str(), "ad");

        let status = config.targets_for(&principal("test@EXAMPLE.COM"), OperationClass::Status);
        assert_eq!(status.len(), 2);
        assert!(status[1].queue_only);

        let other_realm = config.targets_for(&principal("test@OTHER.ORG"), OperationClass::Status);
        assert_eq!(other_realm.len(), 1);
        assert_eq!(other_realm[0].domain.as_str(), "ldap");
    }

    #[test]
    fn instances_are_never_synced() {
        let config = SyncConfig::from_yaml(FULL).unwrap();
        assert!(config
            .targets_for(&principal("test/admin@EXAMPLE.COM"), OperationClass::Status)
            .is_empty());
    }
}
