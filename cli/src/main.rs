mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{
    check::CheckCommand, job::JobCommand, list::ListCommand, prune::PruneCommand,
    restore::RestoreCommand, snapshot::SnapshotCommand,
};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(
    name = "snapkeep",
    version,
    about = "Point-in-time directory snapshots",
    long_about = "Snapkeep captures a directory tree into a self-contained, content-deduplicated record, restores it exactly, and prunes old captures"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, env = "SNAPKEEP_STORE", help = "Snapshot store directory")]
    store: Option<PathBuf>,

    #[arg(long, global = true, help = "Config file (defaults to the user config directory)")]
    config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    verbose: bool,

    #[arg(short, long, global = true, help = "Enable quiet mode")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Take a snapshot of a directory")]
    Snapshot(SnapshotCommand),

    #[command(about = "List snapshots with size metrics")]
    List(ListCommand),

    #[command(about = "Restore files from a snapshot")]
    Restore(RestoreCommand),

    #[command(about = "Delete the oldest snapshots, keeping the most recent N")]
    Prune(PruneCommand),

    #[command(about = "Take snapshots on a fixed interval for a bounded duration")]
    Job(JobCommand),

    #[command(about = "Verify snapshot integrity")]
    Check(CheckCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    debug!("Starting snapkeep");

    let ctx = commands::Context::load(&cli).await?;

    match cli.command {
        Commands::Snapshot(ref cmd) => cmd.run(&ctx).await,
        Commands::List(ref cmd) => cmd.run(&ctx).await,
        Commands::Restore(ref cmd) => cmd.run(&ctx).await,
        Commands::Prune(ref cmd) => cmd.run(&ctx).await,
        Commands::Job(ref cmd) => cmd.run(&ctx).await,
        Commands::Check(ref cmd) => cmd.run(&ctx).await,
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let level = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("snapkeep={level},snapkeep_core={level}")));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Setting default subscriber failed");
}
