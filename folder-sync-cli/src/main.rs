//! folder-sync: mirror source folders into a tree of symlinks.
//!
//! # Usage
//!
//! ```text
//! folder-sync [-c CONFIG] [-v] sync [SOURCE|timer] [--dry-run]
//! folder-sync [-c CONFIG] status [--json]
//! folder-sync [-c CONFIG] units -o DIR [--binary PATH] [--interval 15min]
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{status::StatusArgs, sync::SyncArgs, units::UnitsArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "folder-sync",
    version,
    about = "Incrementally mirror source folders into a destination of symlinks",
    long_about = None,
)]
struct Cli {
    /// YAML config file [default: <config dir>/folder-sync/config.yaml].
    #[arg(short, long, global = true, env = "FOLDER_SYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reconcile one source, or every source, then clean up stale links.
    Sync(SyncArgs),

    /// Show per-source counts from the state store.
    Status(StatusArgs),

    /// Generate systemd units that trigger syncs.
    Units(UnitsArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Sync(args) => args.run(config),
        Commands::Status(args) => args.run(config),
        Commands::Units(args) => args.run(config),
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
