//! Per-attempt execution: send, validate, stream, retry.
//!
//! [`StreamingFetcher::run`] drives one candidate to a terminal outcome.
//! Transport errors never escape; every path ends in a [`ProbeOutcome`].
//! Cancellation is observed before each send, during backoff, and between
//! body chunks.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use rand::Rng;
use tokio::sync::watch;
use tracing::{debug, warn};

use firmrace_core::{AttemptOutcome, Candidate, FirmwareTarget, RaceConfig, RejectReason};

use crate::candidates::build_url;
use crate::credential::CredentialDeriver;
use crate::error::ErrorClass;
use crate::headers::HeaderSynthesizer;
use crate::sink::{SinkFactory, StagedArtifact};
use crate::transport::{Transport, TransportRequest, TransportResponse};
use crate::validate::{ValidationPolicy, Verdict};
use crate::retry::RetryPolicy;

// ============================================================================
// Probe Outcome
// ============================================================================

/// Terminal outcome of one attempt, with the staged artifact on success.
///
/// The staged artifact is deliberately not committed here: only the race
/// coordinator commits, so redundant winners can be discarded.
pub enum ProbeOutcome {
    /// The body validated and streamed fully; awaiting commit.
    Success {
        /// The staged, uncommitted artifact.
        staged: Box<dyn StagedArtifact>,
    },
    /// Structural rejection.
    Rejected {
        /// Why the candidate was rejected.
        reason: RejectReason,
    },
    /// Transient failures exhausted the retry budget.
    RetryExhausted {
        /// Last transient failure observed.
        last_reason: String,
    },
    /// The race was cancelled while this attempt ran.
    Cancelled,
}

impl ProbeOutcome {
    /// Converts to the serializable record form.
    pub fn to_record(&self, label: &str) -> AttemptOutcome {
        match self {
            Self::Success { staged } => AttemptOutcome::Success {
                bytes_written: staged.bytes_written(),
                label: label.to_string(),
            },
            Self::Rejected { reason } => AttemptOutcome::Rejected {
                reason: reason.clone(),
            },
            Self::RetryExhausted { last_reason } => AttemptOutcome::RetryExhausted {
                last_reason: last_reason.clone(),
            },
            Self::Cancelled => AttemptOutcome::Cancelled,
        }
    }
}

impl fmt::Debug for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success { staged } => f
                .debug_struct("Success")
                .field("bytes_written", &staged.bytes_written())
                .finish(),
            Self::Rejected { reason } => f.debug_struct("Rejected").field("reason", reason).finish(),
            Self::RetryExhausted { last_reason } => f
                .debug_struct("RetryExhausted")
                .field("last_reason", last_reason)
                .finish(),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

enum SendResult {
    Done(ProbeOutcome),
    Transient(String),
}

// ============================================================================
// Streaming Fetcher
// ============================================================================

/// Executes single attempts end-to-end.
pub struct StreamingFetcher {
    transport: Arc<dyn Transport>,
    synthesizer: HeaderSynthesizer,
    policy: ValidationPolicy,
    retry: RetryPolicy,
    target: FirmwareTarget,
    request_timeout: Duration,
    jitter: Option<(Duration, Duration)>,
}

impl StreamingFetcher {
    /// Creates a fetcher from the race configuration.
    pub fn new(
        config: &RaceConfig,
        target: FirmwareTarget,
        transport: Arc<dyn Transport>,
        deriver: Arc<dyn CredentialDeriver>,
    ) -> Self {
        let jitter = if config.jitter_max_ms > 0 {
            Some((
                Duration::from_millis(config.jitter_min_ms),
                Duration::from_millis(config.jitter_max_ms),
            ))
        } else {
            None
        };

        Self {
            transport,
            synthesizer: HeaderSynthesizer::new(
                config.header_pools.clone(),
                target.clone(),
                deriver,
            ),
            policy: ValidationPolicy::from_config(config),
            retry: RetryPolicy::new(config.max_retries, config.backoff_base_ms, config.backoff_cap_ms),
            target,
            request_timeout: config.request_timeout(),
            jitter,
        }
    }

    /// Runs one attempt to a terminal outcome.
    pub async fn run<R: Rng + Send + ?Sized>(
        &self,
        candidate: &Candidate,
        sinks: &dyn SinkFactory,
        cancel: &mut watch::Receiver<bool>,
        rng: &mut R,
    ) -> ProbeOutcome {
        let mut last_reason = String::from("no send completed");

        for send_no in 1..=self.retry.max_sends() {
            if send_no > 1 {
                let delay = self.retry.backoff(send_no - 1, rng);
                debug!(candidate = %candidate.label, retry = send_no - 1, delay = ?delay, "Backing off");
                if wait_or_cancelled(delay, cancel).await {
                    return ProbeOutcome::Cancelled;
                }
            }

            if let Some((lo, hi)) = self.jitter {
                let jitter = lo + (hi - lo).mul_f64(rng.r#gen::<f64>());
                if wait_or_cancelled(jitter, cancel).await {
                    return ProbeOutcome::Cancelled;
                }
            }

            match self.send_once(candidate, sinks, cancel, rng).await {
                SendResult::Done(outcome) => return outcome,
                SendResult::Transient(reason) => {
                    warn!(candidate = %candidate.label, reason = %reason, "Transient failure");
                    last_reason = reason;
                }
            }
        }

        ProbeOutcome::RetryExhausted { last_reason }
    }

    async fn send_once<R: Rng + Send + ?Sized>(
        &self,
        candidate: &Candidate,
        sinks: &dyn SinkFactory,
        cancel: &mut watch::Receiver<bool>,
        rng: &mut R,
    ) -> SendResult {
        let synthesized = self.synthesizer.synthesize(candidate, Utc::now(), rng);

        let url = match build_url(candidate, &self.target, &synthesized.credential) {
            Ok(url) => url,
            Err(e) => {
                warn!(candidate = %candidate.label, error = %e, "Unusable candidate URL");
                return SendResult::Done(ProbeOutcome::Rejected {
                    reason: RejectReason::InvalidUrl,
                });
            }
        };

        let request = TransportRequest {
            url: url.to_string(),
            headers: synthesized.headers.clone(),
            timeout: self.request_timeout,
        };

        let response = match self.send_with_cancel(request, cancel).await {
            Ok(response) => response,
            Err(result) => return result,
        };

        let verdict = self.policy.verdict(
            response.status,
            response.content_type.as_deref(),
            response.content_length,
            response.location.as_deref(),
        );
        debug!(candidate = %candidate.label, status = response.status, verdict = ?verdict_name(&verdict), "Classified response");

        match verdict {
            Verdict::Accept => self.stream_body(candidate, response, sinks, cancel).await,
            Verdict::FollowRedirect(location) => {
                // One redirect at most; the follow-up is classified with
                // the non-redirect rules.
                let request = TransportRequest {
                    url: location,
                    headers: synthesized.headers,
                    timeout: self.request_timeout,
                };
                let response = match self.send_with_cancel(request, cancel).await {
                    Ok(response) => response,
                    Err(result) => return result,
                };
                match self.policy.verdict_no_redirect(
                    response.status,
                    response.content_type.as_deref(),
                    response.content_length,
                ) {
                    Verdict::Accept => self.stream_body(candidate, response, sinks, cancel).await,
                    Verdict::Reject(reason) => {
                        SendResult::Done(ProbeOutcome::Rejected { reason })
                    }
                    Verdict::FollowRedirect(_) | Verdict::RetryLater(_) => {
                        SendResult::Done(ProbeOutcome::Rejected {
                            reason: RejectReason::Status(response.status),
                        })
                    }
                }
            }
            Verdict::RetryLater(reason) => SendResult::Transient(reason),
            Verdict::Reject(reason) => SendResult::Done(ProbeOutcome::Rejected { reason }),
        }
    }

    async fn send_with_cancel(
        &self,
        request: TransportRequest,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<TransportResponse, SendResult> {
        tokio::select! {
            () = wait_cancelled(cancel) => Err(SendResult::Done(ProbeOutcome::Cancelled)),
            result = self.transport.send(request) => match result {
                Ok(response) => Ok(response),
                Err(e) => match e.class() {
                    ErrorClass::Transient => Err(SendResult::Transient(e.to_string())),
                    ErrorClass::Structural => Err(SendResult::Done(ProbeOutcome::Rejected {
                        reason: RejectReason::InvalidUrl,
                    })),
                },
            },
        }
    }

    async fn stream_body(
        &self,
        candidate: &Candidate,
        response: TransportResponse,
        sinks: &dyn SinkFactory,
        cancel: &mut watch::Receiver<bool>,
    ) -> SendResult {
        let name = match self.target.archive_name() {
            Ok(name) => name,
            Err(_) => {
                return SendResult::Done(ProbeOutcome::Rejected {
                    reason: RejectReason::InvalidUrl,
                });
            }
        };

        let mut sink = match sinks.open(&name).await {
            Ok(sink) => sink,
            Err(e) => return SendResult::Transient(format!("sink: {e}")),
        };

        let mut body = response.body;
        let mut bytes_written = 0u64;

        loop {
            let next = tokio::select! {
                () = wait_cancelled(cancel) => {
                    sink.discard().await;
                    return SendResult::Done(ProbeOutcome::Cancelled);
                }
                next = tokio::time::timeout(self.request_timeout, body.next()) => next,
            };

            match next {
                Err(_elapsed) => {
                    sink.discard().await;
                    return SendResult::Transient("body read timed out".to_string());
                }
                Ok(None) => break,
                Ok(Some(Ok(chunk))) => {
                    if let Err(e) = sink.write(&chunk).await {
                        sink.discard().await;
                        return SendResult::Transient(format!("sink: {e}"));
                    }
                    bytes_written += chunk.len() as u64;
                }
                Ok(Some(Err(e))) => {
                    sink.discard().await;
                    return SendResult::Transient(e.to_string());
                }
            }
        }

        debug!(candidate = %candidate.label, bytes_written, "Body streamed");

        match sink.finish().await {
            Ok(staged) => SendResult::Done(ProbeOutcome::Success { staged }),
            Err(e) => SendResult::Transient(format!("sink: {e}")),
        }
    }
}

fn verdict_name(verdict: &Verdict) -> &'static str {
    match verdict {
        Verdict::Accept => "accept",
        Verdict::FollowRedirect(_) => "follow-redirect",
        Verdict::RetryLater(_) => "retry-later",
        Verdict::Reject(_) => "reject",
    }
}

// ============================================================================
// Cancellation Helpers
// ============================================================================

/// Resolves once the cancel flag flips. A dropped sender also counts as
/// cancellation: it means the coordinator is gone.
pub(crate) async fn wait_cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow() {
            return;
        }
        if cancel.changed().await.is_err() {
            return;
        }
    }
}

/// Sleeps for `delay` unless cancelled first; returns true if cancelled.
pub(crate) async fn wait_or_cancelled(delay: Duration, cancel: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        () = wait_cancelled(cancel) => true,
        () = tokio::time::sleep(delay) => false,
    }
}

// ============================================================================
// Tests
// ============================================================================
