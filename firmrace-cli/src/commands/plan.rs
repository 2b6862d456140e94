//! The `plan` subcommand: show the candidate list without any traffic.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use firmrace_fetch::candidates;

use super::{TargetArgs, load_config};
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the plan command.
#[derive(Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Path to a JSON race configuration file.
    #[arg(long, short)]
    pub config: Option<PathBuf>,
}

/// Runs the plan command.
pub async fn run(args: &PlanArgs, cli: &Cli) -> Result<ExitCode> {
    let target = args.target.target();
    let config = load_config(args.config.as_deref())?;
    let candidates = candidates::generate(&target, &config)?;

    match cli.format {
        OutputFormat::Json => {
            let out = if cli.pretty {
                serde_json::to_string_pretty(&candidates)?
            } else {
                serde_json::to_string(&candidates)?
            };
            println!("{out}");
        }
        OutputFormat::Text => {
            println!(
                "{} candidates for {} {} ({})",
                candidates.len(),
                target.model,
                target.region,
                target.version
            );
            for candidate in &candidates {
                println!("  {:<40} {}", candidate.label, candidate.endpoint);
            }
        }
    }

    Ok(ExitCode::Success)
}
