//! acctsync: inspect and administer the account-change sync queue.
//!
//! # Usage
//!
//! ```text
//! acctsync [--config <file>] [--queue-dir <dir>] <command>
//!
//! acctsync queue list [--json]
//! acctsync queue show <file> [--reveal]
//! acctsync queue recover
//! acctsync block <principal> <domain>
//! acctsync unblock <principal> <domain>
//! acctsync enqueue password <principal>      # new password on stdin
//! acctsync enqueue enable|disable <principal>
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    block::PairArgs, enqueue::EnqueueCommand, queue::QueueCommand, GlobalArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "acctsync",
    version,
    about = "Inspect and administer the account-change sync queue",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Inspect or repair the queue directory.
    Queue {
        #[command(subcommand)]
        command: QueueCommand,
    },

    /// Hold back immediate delivery for a principal/domain pair.
    Block(PairArgs),

    /// Remove every sentinel for a principal/domain pair.
    Unblock(PairArgs),

    /// Queue a change for every configured target of a principal.
    Enqueue {
        #[command(subcommand)]
        command: EnqueueCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Queue { command } => commands::queue::run(&cli.global, command),
        Commands::Block(args) => args.block(&cli.global),
        Commands::Unblock(args) => args.unblock(&cli.global),
        Commands::Enqueue { command } => commands::enqueue::run(&cli.global, command),
    }
}

/// Diagnostics go to stderr so stdout stays parseable (`queue list --json`).
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
