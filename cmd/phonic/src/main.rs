//! Phonic CLI - replay, calibrate and inspect the phoneme engine.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[cfg(feature = "mic")]
use commands::ListenCommand;
use commands::{CalibrateCommand, ReplayCommand, SnapshotsCommand};

/// Phonic CLI - exemplar-based phoneme recognition.
///
/// Snapshots are stored in ~/.phonic/phonic.redb unless --db is given.
/// Recordings are read as WAV files and replayed through the engine at
/// 60 ticks per second, the same cadence a live session uses.
#[derive(Parser)]
#[command(name = "phonic")]
#[command(about = "Exemplar-based phoneme recognition tool")]
#[command(version)]
pub struct Cli {
    /// Database file (default is ~/.phonic/phonic.redb)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Engine config file (YAML or JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a recording through a detection session
    Replay(ReplayCommand),
    /// Add positive snapshots from a recording
    Calibrate(CalibrateCommand),
    /// Inspect and delete stored snapshots
    Snapshots(SnapshotsCommand),
    /// Live microphone session
    #[cfg(feature = "mic")]
    Listen(ListenCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Replay(cmd) => cmd.run(&cli).await,
        Commands::Calibrate(cmd) => cmd.run(&cli).await,
        Commands::Snapshots(cmd) => cmd.run(&cli).await,
        #[cfg(feature = "mic")]
        Commands::Listen(cmd) => cmd.run(&cli).await,
    }
}
