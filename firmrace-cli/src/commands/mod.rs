//! CLI subcommands.

pub mod download;
pub mod plan;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use firmrace_core::{FirmwareTarget, RaceConfig};

/// Target selection shared by every subcommand.
#[derive(Args)]
pub struct TargetArgs {
    /// Device model (e.g. SM-S906B).
    #[arg(long, short)]
    pub model: String,

    /// Sales/CSC region code (e.g. EUX).
    #[arg(long, short)]
    pub region: String,

    /// Firmware version code, slash-separated PDA/CSC/CP.
    #[arg(long, short = 'V')]
    pub version: String,
}

impl TargetArgs {
    /// Builds the firmware target from the parsed arguments.
    pub fn target(&self) -> FirmwareTarget {
        FirmwareTarget::new(&self.model, &self.region, &self.version)
    }
}

/// Loads the race configuration, falling back to the built-in defaults.
///
/// The file is JSON and partial: omitted fields keep their defaults.
pub fn load_config(path: Option<&Path>) -> Result<RaceConfig> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parsing config file {}", path.display()))
        }
        None => Ok(RaceConfig::default()),
    }
}
