//! Attempt and race outcomes.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ============================================================================
// Reject Reason
// ============================================================================

/// Why an attempt was structurally rejected (never retried).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The server answered 200 but the body is not the expected artifact
    /// (e.g. an HTML error page served with a success status).
    WrongContent,
    /// The candidate URL could not be built into a valid request.
    InvalidUrl,
    /// A decisive HTTP status (403, 404, and other non-redirect statuses).
    Status(u16),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongContent => write!(f, "wrong-content"),
            Self::InvalidUrl => write!(f, "invalid-url"),
            Self::Status(code) => write!(f, "http-{code}"),
        }
    }
}

// ============================================================================
// Attempt Outcome
// ============================================================================

/// Terminal outcome of one attempt (a candidate plus its retries).
///
/// Every attempt produces exactly one of these; transport errors never
/// escape as raw failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AttemptOutcome {
    /// The attempt won: the body validated and was fully streamed.
    Success {
        /// Total bytes written to the sink.
        bytes_written: u64,
        /// The winning candidate's label.
        label: String,
    },
    /// Structural rejection; the candidate is fundamentally wrong.
    Rejected {
        /// Why the candidate was rejected.
        reason: RejectReason,
    },
    /// Transient failures exhausted the retry budget.
    RetryExhausted {
        /// The last transient failure observed.
        last_reason: String,
    },
    /// The race ended for a reason unrelated to this attempt.
    Cancelled,
}

impl AttemptOutcome {
    /// Returns true for the `Success` variant.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

// ============================================================================
// Race Result
// ============================================================================

/// Why a race was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// The global race deadline fired.
    DeadlineExceeded,
    /// The caller cancelled the race.
    CallerCancelled,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeadlineExceeded => write!(f, "deadline exceeded"),
            Self::CallerCancelled => write!(f, "cancelled by caller"),
        }
    }
}

/// The single race-level result reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RaceResult {
    /// One attempt validated and its artifact was committed.
    Won {
        /// The winning candidate's label.
        label: String,
        /// Bytes written to the committed artifact.
        bytes_written: u64,
        /// Final artifact path, if the sink persists to disk.
        artifact_path: Option<PathBuf>,
    },
    /// Every candidate reached a terminal non-success outcome.
    ///
    /// The counts distinguish "everything was structurally rejected" from
    /// "everything timed out", which suggest different remediation.
    Exhausted {
        /// Candidates attempted across the race.
        attempted: usize,
        /// Attempts that ended in structural rejection.
        rejected: usize,
        /// Attempts that exhausted their retry budget.
        retry_exhausted: usize,
        /// Distinct terminal failure reasons, for reporting.
        last_reasons: Vec<String>,
    },
    /// The race was cancelled before it could win or exhaust the queue.
    Cancelled {
        /// Why the race stopped.
        reason: CancelReason,
    },
}

impl RaceResult {
    /// Returns true for the `Won` variant.
    pub fn is_won(&self) -> bool {
        matches!(self, Self::Won { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reject_reason_display() {
        assert_eq!(RejectReason::WrongContent.to_string(), "wrong-content");
        assert_eq!(RejectReason::Status(403).to_string(), "http-403");
    }

    #[test]
    fn test_outcome_serde_roundtrip() {
        let outcome = AttemptOutcome::Rejected {
            reason: RejectReason::Status(404),
        };
        let json = serde_json::to_string(&outcome).unwrap();
        let back: AttemptOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(outcome, back);
    }

    #[test]
    fn test_race_result_flags() {
        let won = RaceResult::Won {
            label: "standard fus neofussvr".into(),
            bytes_written: 42,
            artifact_path: None,
        };
        assert!(won.is_won());
        assert!(
            !RaceResult::Cancelled {
                reason: CancelReason::DeadlineExceeded
            }
            .is_won()
        );
    }
}
