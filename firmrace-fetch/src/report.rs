//! Per-race reporting.
//!
//! The coordinator records every attempt's terminal outcome here; the CLI
//! renders the finished [`RaceReport`] as text or JSON.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use firmrace_core::{AttemptOutcome, FirmwareTarget, RaceResult};

// ============================================================================
// Attempt Records
// ============================================================================

/// One attempt's terminal outcome, as seen by the coordinator.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptRecord {
    /// Human-readable candidate label.
    pub label: String,
    /// Terminal classification of the attempt.
    pub outcome: AttemptOutcome,
    /// Wall-clock time from spawn to report.
    pub duration_ms: u64,
}

// ============================================================================
// Result Aggregator
// ============================================================================

/// Collects attempt records over one race.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    records: Vec<AttemptRecord>,
    started_at: Option<DateTime<Utc>>,
}

impl ResultAggregator {
    /// Creates an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one attempt's terminal outcome.
    pub fn record(&mut self, label: String, outcome: AttemptOutcome, duration: Duration) {
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        self.records.push(AttemptRecord {
            label,
            outcome,
            duration_ms: duration.as_millis() as u64,
        });
    }

    /// The records collected so far, in report order.
    pub fn records(&self) -> &[AttemptRecord] {
        &self.records
    }

    /// Consumes the aggregator into a final report.
    pub fn finish(self, target: &FirmwareTarget, result: RaceResult) -> RaceReport {
        RaceReport {
            model: target.model.clone(),
            region: target.region.clone(),
            version: target.version.clone(),
            started_at: self.started_at,
            finished_at: Utc::now(),
            result,
            attempts: self.records,
        }
    }
}

// ============================================================================
// Race Report
// ============================================================================

/// The full outcome of a race, ready for rendering.
#[derive(Debug, Serialize)]
pub struct RaceReport {
    /// Device model raced for.
    pub model: String,
    /// Sales region raced for.
    pub region: String,
    /// Version code raced for.
    pub version: String,
    /// When the first attempt completed; `None` if nothing ran.
    pub started_at: Option<DateTime<Utc>>,
    /// When the race finished.
    pub finished_at: DateTime<Utc>,
    /// Final classification of the race.
    pub result: RaceResult,
    /// Every attempt that reached a terminal state.
    pub attempts: Vec<AttemptRecord>,
}

impl RaceReport {
    /// True when the race produced a committed artifact.
    pub fn is_won(&self) -> bool {
        matches!(self.result, RaceResult::Won { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================
