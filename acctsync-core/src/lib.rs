//! acctsync core library: domain types, configuration and errors.
//!
//! - [`types`]: principals, target domains, operations, change records
//! - [`config`]: YAML sync configuration and the [`SyncPolicy`] seam
//! - [`error`]: [`CoreError`] and [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{SyncConfig, SyncPolicy, SyncTarget, TargetConfig};
pub use error::{ConfigError, CoreError};
pub use types::{ChangeRecord, Domain, Operation, OperationClass, Password, Principal};
