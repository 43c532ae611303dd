//! `acctsync enqueue password|enable|disable <principal>`
//!
//! Administrative replay: writes a queue entry for every target the
//! configuration selects for the principal, without attempting delivery.
//! Sentinels are not consulted; the entries are queued either way.

use std::io::{self, BufRead};

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};

use acctsync_core::{ChangeRecord, Operation, Password, SyncPolicy};
use acctsync_queue::{enqueue, QueueDir};

use super::{parse_principal, GlobalArgs};

#[derive(Subcommand, Debug)]
pub enum EnqueueCommand {
    /// Queue a password change. The new password is read from stdin.
    Password(PrincipalArgs),

    /// Queue an account enable.
    Enable(PrincipalArgs),

    /// Queue an account disable.
    Disable(PrincipalArgs),
}

#[derive(Args, Debug)]
pub struct PrincipalArgs {
    /// Principal the change applies to (e.g. "alice@EXAMPLE.COM").
    pub principal: String,
}

pub fn run(global: &GlobalArgs, cmd: EnqueueCommand) -> Result<()> {
    let (operation, args) = match cmd {
        EnqueueCommand::Password(args) => (Operation::Password, args),
        EnqueueCommand::Enable(args) => (Operation::Enable, args),
        EnqueueCommand::Disable(args) => (Operation::Disable, args),
    };
    let principal = parse_principal(&args.principal)?;
    let config = global.load_config()?;

    let targets = config.targets_for(&principal, operation.class());
    if targets.is_empty() {
        println!("No sync targets configured for {principal}; nothing queued.");
        return Ok(());
    }

    let password = match operation {
        Operation::Password => Some(read_password(io::stdin().lock())?),
        Operation::Enable | Operation::Disable => None,
    };

    let queue = QueueDir::from_config(&config);
    for target in targets {
        let record = match &password {
            Some(password) => ChangeRecord::password(&principal, target.domain, password.clone()),
            None => ChangeRecord::status(&principal, target.domain, operation == Operation::Enable),
        };
        let queued = enqueue(&queue, &record).with_context(|| {
            format!(
                "failed to queue {operation} change for {principal} to {}",
                record.domain()
            )
        })?;
        println!("Queued {}", queued.path.display());
    }
    Ok(())
}

/// One line from `input`, without its line terminator.
fn read_password(mut input: impl BufRead) -> Result<Password> {
    let mut line = String::new();
    input
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    while line.ends_with(['\n', '\r']) {
        line.pop();
    }
    if line.is_empty() {
        bail!("no password given on stdin");
    }
    Ok(Password::new(line))
}
