//! Report rendering for the CLI.

use anyhow::Result;

use firmrace_core::{AttemptOutcome, RaceResult};
use firmrace_fetch::RaceReport;

use crate::{Cli, OutputFormat};

/// Renders the race report to stdout in the selected format.
pub fn render(report: &RaceReport, cli: &Cli) -> Result<()> {
    match cli.format {
        OutputFormat::Json => {
            let out = if cli.pretty {
                serde_json::to_string_pretty(report)?
            } else {
                serde_json::to_string(report)?
            };
            println!("{out}");
        }
        OutputFormat::Text => print!("{}", format_text(report, cli.quiet)),
    }
    Ok(())
}

/// Formats the text rendering of a report.
fn format_text(report: &RaceReport, quiet: bool) -> String {
    let mut out = String::new();

    match &report.result {
        RaceResult::Won {
            label,
            bytes_written,
            artifact_path,
        } => {
            out.push_str(&format!("✓ downloaded via {label} ({bytes_written} bytes)\n"));
            if let Some(path) = artifact_path {
                out.push_str(&format!("  saved to {}\n", path.display()));
            }
        }
        RaceResult::Exhausted {
            attempted,
            rejected,
            retry_exhausted,
            last_reasons,
        } => {
            out.push_str("✗ no candidate produced the firmware archive\n");
            out.push_str(&format!(
                "  attempted {attempted} (rejected {rejected}, retry budget exhausted {retry_exhausted})\n"
            ));
            for reason in last_reasons {
                out.push_str(&format!("  - {reason}\n"));
            }
        }
        RaceResult::Cancelled { reason } => {
            out.push_str(&format!("✗ race cancelled: {reason}\n"));
        }
    }

    if !quiet && !report.attempts.is_empty() {
        out.push_str("\nattempts:\n");
        for attempt in &report.attempts {
            out.push_str(&format!(
                "  {:<44} {:>8}ms  {}\n",
                attempt.label,
                attempt.duration_ms,
                outcome_word(&attempt.outcome)
            ));
        }
    }

    out
}

fn outcome_word(outcome: &AttemptOutcome) -> String {
    match outcome {
        AttemptOutcome::Success { .. } => "success".to_string(),
        AttemptOutcome::Rejected { reason } => format!("rejected ({reason})"),
        AttemptOutcome::RetryExhausted { last_reason } => {
            format!("retry-exhausted ({last_reason})")
        }
        AttemptOutcome::Cancelled => "cancelled".to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
