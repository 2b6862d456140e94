//! The `download` subcommand: run the race and commit the winner.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use tokio::sync::watch;
use tracing::debug;

use firmrace_core::RaceResult;
use firmrace_fetch::{
    DigestDeriver, FileSinkFactory, HttpTransport, ProbeScheduler, ResultAggregator,
};

use super::{TargetArgs, load_config};
use crate::{Cli, ExitCode, output};

/// Arguments for the download command.
#[derive(Args)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Path to a JSON race configuration file.
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Directory the committed archive is written into.
    #[arg(long, short, default_value = ".")]
    pub output_dir: PathBuf,

    /// Override the concurrency cap.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Override the global race deadline, in seconds.
    #[arg(long)]
    pub deadline: Option<u64>,

    /// Override the number of race cycles.
    #[arg(long)]
    pub cycles: Option<u32>,

    /// Override the per-request timeout, in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Replace the mirror list (repeatable).
    #[arg(long = "server")]
    pub servers: Vec<String>,

    /// Fixed seed for reproducible candidate order and header synthesis.
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Runs the download command.
pub async fn run(args: &DownloadArgs, cli: &Cli) -> Result<ExitCode> {
    let target = args.target.target();
    let mut config = load_config(args.config.as_deref())?;

    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(deadline) = args.deadline {
        config.race_deadline_secs = deadline;
    }
    if let Some(cycles) = args.cycles {
        config.max_cycles = cycles;
    }
    if let Some(timeout) = args.timeout {
        config.request_timeout_secs = timeout;
    }
    if !args.servers.is_empty() {
        config.servers = args.servers.clone();
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    config.validate(&target)?;
    debug!(model = %target.model, region = %target.region, "Starting download race");

    // Ctrl-C tears the race down instead of killing it mid-write.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let scheduler = ProbeScheduler::new(
        config,
        target.clone(),
        Arc::new(HttpTransport::new()?),
        Arc::new(DigestDeriver::new(target.clone())),
        Arc::new(FileSinkFactory::new(&args.output_dir)),
    )
    .with_shutdown(shutdown_rx);

    let mut aggregator = ResultAggregator::new();
    let result = scheduler.run(&mut aggregator).await?;
    let report = aggregator.finish(&target, result);

    output::render(&report, cli)?;

    Ok(match &report.result {
        RaceResult::Won { .. } => ExitCode::Success,
        RaceResult::Exhausted { .. } => ExitCode::Exhausted,
        RaceResult::Cancelled { .. } => ExitCode::Cancelled,
    })
}
