// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! Firmrace CLI - races firmware mirrors for the first real archive.
//!
//! # Examples
//!
//! ```bash
//! # Race the default mirrors for a build
//! firmrace download -m SM-S906B -r EUX -V S906BXXU2AVB1/S906BOXM2AVB1/S906BXXU2AVB1
//!
//! # Save the archive somewhere specific, five cycles, fixed seed
//! firmrace download -m SM-S906B -r EUX -V <version> -o ~/firmware --cycles 5 --seed 42
//!
//! # JSON report
//! firmrace download -m SM-S906B -r EUX -V <version> --format json --pretty
//!
//! # Show the candidate plan without touching the network
//! firmrace plan -m SM-S906B -r EUX -V <version>
//! ```

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{download, plan};

// ============================================================================
// CLI Definition
// ============================================================================

/// Firmrace CLI - concurrent firmware download racer.
#[derive(Parser)]
#[command(name = "firmrace")]
#[command(about = "Races firmware mirrors for the first validated archive")]
#[command(long_about = r"
Firmrace enumerates every plausible way of asking the firmware mirrors for
a build (endpoint x parameter scheme x credential variant), probes them
concurrently under a bounded cap, and keeps the first response that
validates as a real archive. Everything else is cancelled.

Examples:
  firmrace download -m SM-S906B -r EUX -V <PDA/CSC/CP>   # race and save
  firmrace download ... --format json                    # JSON report
  firmrace plan -m SM-S906B -r EUX -V <PDA/CSC/CP>       # dry-run the plan
")]
#[command(version)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Quiet mode (result line only, no logging).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Race the mirrors and download the firmware archive.
    #[command(visible_alias = "d")]
    Download(download::DownloadArgs),

    /// Print the candidate plan without any network traffic.
    #[command(visible_alias = "p")]
    Plan(plan::PlanArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[repr(i32)]
pub enum ExitCode {
    /// An artifact was committed.
    Success = 0,
    /// Configuration or I/O error before or during the race.
    Error = 1,
    /// Every candidate failed; nothing was downloaded.
    Exhausted = 2,
    /// The race was cancelled (deadline or interrupt).
    Cancelled = 4,
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return; // No logging in quiet mode
    }

    let filter = if verbose {
        EnvFilter::new("firmrace=debug,info")
    } else {
        EnvFilter::new("firmrace=warn")
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Commands::Download(args) => download::run(args, &cli).await,
        Commands::Plan(args) => plan::run(args, &cli).await,
    };

    match result {
        Ok(code) => std::process::exit(code as i32),
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {e:#}");
            }
            std::process::exit(ExitCode::Error as i32);
        }
    }
}
