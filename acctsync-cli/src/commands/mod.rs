pub mod block;
pub mod enqueue;
pub mod queue;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use acctsync_core::{Principal, SyncConfig};
use acctsync_queue::QueueDir;

/// Options shared by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// YAML configuration file. A missing file means defaults.
    #[arg(
        long,
        global = true,
        env = "ACCTSYNC_CONFIG",
        default_value = "/etc/acctsync.yaml"
    )]
    pub config: PathBuf,

    /// Override the queue directory named in the configuration.
    #[arg(long, global = true, value_name = "DIR")]
    pub queue_dir: Option<PathBuf>,
}

impl GlobalArgs {
    pub fn load_config(&self) -> Result<SyncConfig> {
        let mut config = SyncConfig::load_or_default(&self.config)
            .with_context(|| format!("failed to load config {}", self.config.display()))?;
        if let Some(dir) = &self.queue_dir {
            config.queue_dir = dir.clone();
        }
        Ok(config)
    }

    pub fn queue(&self) -> Result<QueueDir> {
        Ok(QueueDir::from_config(&self.load_config()?))
    }
}

pub(crate) fn parse_principal(value: &str) -> Result<Principal> {
    Principal::parse(value).with_context(|| format!("invalid principal '{value}'"))
}
