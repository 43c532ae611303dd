//! `acctsync block` and `acctsync unblock`

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;

use acctsync_core::Domain;
use acctsync_queue::sentinel;

use super::{parse_principal, GlobalArgs};

#[derive(Args, Debug)]
pub struct PairArgs {
    /// Principal whose changes are affected (e.g. "alice@EXAMPLE.COM").
    pub principal: String,

    /// Target domain as named in the configuration.
    pub domain: String,
}

impl PairArgs {
    pub fn block(self, global: &GlobalArgs) -> Result<()> {
        let (name, domain) = self.resolve()?;
        let queue = global.queue()?;
        let blocked = sentinel::is_blocked(&queue, &name, &domain)
            .with_context(|| format!("failed to check sentinels for {name} to {domain}"))?;
        if blocked {
            println!("{name} is already blocked for {domain}.");
            return Ok(());
        }
        let path = sentinel::block(&queue, &name, &domain, Utc::now())
            .with_context(|| format!("failed to block {name} for {domain}"))?;
        println!("Blocked {name} for {domain}: {}", path.display());
        Ok(())
    }

    pub fn unblock(self, global: &GlobalArgs) -> Result<()> {
        let (name, domain) = self.resolve()?;
        let queue = global.queue()?;
        let removed = sentinel::unblock(&queue, &name, &domain)
            .with_context(|| format!("failed to unblock {name} for {domain}"))?;
        if removed == 0 {
            println!("{name} was not blocked for {domain}.");
        } else {
            println!("Unblocked {name} for {domain} ({removed} sentinel(s) removed).");
        }
        Ok(())
    }

    fn resolve(&self) -> Result<(String, Domain)> {
        let principal = parse_principal(&self.principal)?;
        let domain = Domain::new(self.domain.as_str())
            .with_context(|| format!("invalid domain '{}'", self.domain))?;
        Ok((principal.name().to_owned(), domain))
    }
}
