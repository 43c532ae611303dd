//! `acctsync queue list|show|recover`

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use acctsync_queue::{reader, FileKind, QueueDir};

use super::GlobalArgs;

#[derive(Subcommand, Debug)]
pub enum QueueCommand {
    /// List queued entries, sentinels and class markers, oldest first.
    List(ListArgs),

    /// Decode one queue entry.
    Show(ShowArgs),

    /// Remove temporaries abandoned by writers that died mid-enqueue.
    Recover,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Entry file name inside the queue directory, or a path to one.
    pub file: PathBuf,

    /// Print the password instead of redacting it.
    #[arg(long)]
    pub reveal: bool,
}

pub fn run(global: &GlobalArgs, cmd: QueueCommand) -> Result<()> {
    let queue = global.queue()?;
    match cmd {
        QueueCommand::List(args) => list(&queue, args),
        QueueCommand::Show(args) => show(&queue, args),
        QueueCommand::Recover => recover(&queue),
    }
}

#[derive(Serialize)]
struct ListingJson {
    file: String,
    kind: &'static str,
    principal: String,
    domain: String,
    operation: Option<String>,
    queued_at: DateTime<Utc>,
    seq: Option<u8>,
}

#[derive(Tabled)]
struct ListingRow {
    #[tabled(rename = "kind")]
    kind: String,
    #[tabled(rename = "principal")]
    principal: String,
    #[tabled(rename = "domain")]
    domain: String,
    #[tabled(rename = "operation")]
    operation: String,
    #[tabled(rename = "queued at")]
    queued_at: String,
    #[tabled(rename = "file")]
    file: String,
}

fn list(queue: &QueueDir, args: ListArgs) -> Result<()> {
    let listings = reader::list(queue)
        .with_context(|| format!("failed to list queue {}", queue.path().display()))?;

    if args.json {
        let payload: Vec<ListingJson> = listings
            .iter()
            .map(|l| ListingJson {
                file: l.name.to_string(),
                kind: kind_key(l.kind()),
                principal: l.name.principal.clone(),
                domain: l.name.domain.to_string(),
                operation: l.name.operation.map(|op| op.to_string()),
                queued_at: l.name.timestamp,
                seq: l.name.seq,
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&payload).context("failed to serialize queue JSON")?
        );
        return Ok(());
    }

    if listings.is_empty() {
        println!("Queue {} is empty.", queue.path().display());
        return Ok(());
    }

    let pending = listings
        .iter()
        .filter(|l| l.kind() == FileKind::Entry)
        .count();
    let rows: Vec<ListingRow> = listings
        .iter()
        .map(|l| ListingRow {
            kind: kind_label(l.kind()),
            principal: l.name.principal.clone(),
            domain: l.name.domain.to_string(),
            operation: l
                .name
                .operation
                .map_or_else(|| "*".to_string(), |op| op.to_string()),
            queued_at: l.name.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            file: l.name.to_string(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    println!(
        "{} pending, {} blocking",
        pending,
        listings.len() - pending
    );
    Ok(())
}

fn show(queue: &QueueDir, args: ShowArgs) -> Result<()> {
    let path = if args.file.components().count() > 1 {
        args.file
    } else {
        queue.path().join(&args.file)
    };
    let record = reader::read_entry(&path)
        .with_context(|| format!("failed to read queue entry {}", path.display()))?;

    println!("principal: {}", record.principal());
    println!("domain:    {}", record.domain());
    println!("operation: {}", record.operation());
    if let Some(password) = record.payload() {
        if args.reveal {
            println!("password:  {}", password.expose());
        } else {
            println!("password:  {}", "<redacted>".bright_black());
        }
    }
    Ok(())
}

fn recover(queue: &QueueDir) -> Result<()> {
    let removed = reader::recover(queue)
        .with_context(|| format!("failed to recover queue {}", queue.path().display()))?;
    if removed == 0 {
        println!("No abandoned writes found.");
    } else {
        println!("Removed {removed} abandoned write(s).");
    }
    Ok(())
}

fn kind_key(kind: FileKind) -> &'static str {
    match kind {
        FileKind::Entry => "entry",
        FileKind::Sentinel => "sentinel",
        FileKind::ClassMarker => "class_marker",
    }
}

fn kind_label(kind: FileKind) -> String {
    match kind {
        FileKind::Entry => "ENTRY".green().to_string(),
        FileKind::Sentinel => "SENTINEL".yellow().bold().to_string(),
        FileKind::ClassMarker => "MARKER".yellow().to_string(),
    }
}
