//! The candidate-race coordinator.
//!
//! [`ProbeScheduler`] runs many attempts under a concurrency cap and
//! commits the first validated success, cancelling all other in-flight and
//! queued work. All shared state lives in the coordinator; workers only
//! return outcome reports, they never touch the queue or the winner flag.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use firmrace_core::{
    CancelReason, Candidate, CoreError, FirmwareTarget, RaceConfig, RaceResult,
};

use crate::candidates;
use crate::credential::CredentialDeriver;
use crate::fetcher::{ProbeOutcome, StreamingFetcher, wait_cancelled};
use crate::report::ResultAggregator;
use crate::sink::SinkFactory;
use crate::transport::Transport;

// ============================================================================
// Schedule State
// ============================================================================

/// Coordinator-private race state.
///
/// Mutated only between `await` points of the coordinator loop; workers
/// never see it. `winner` is set at most once, and once it is set no new
/// attempt starts.
#[derive(Debug, Default)]
struct ScheduleState {
    in_flight: usize,
    winner: bool,
    cancelled: bool,
}

impl ScheduleState {
    fn closing(&self) -> bool {
        self.winner || self.cancelled
    }
}

/// Accumulated race-level accounting.
#[derive(Debug, Default)]
struct RaceProgress {
    attempted: usize,
    rejected: usize,
    retry_exhausted: usize,
    last_reasons: Vec<String>,
    won: Option<(String, u64, Option<PathBuf>)>,
}

impl RaceProgress {
    fn note_reason(&mut self, reason: String) {
        if !self.last_reasons.contains(&reason) {
            self.last_reasons.push(reason);
        }
    }

    fn into_result(self, cancel_reason: Option<CancelReason>) -> RaceResult {
        if let Some((label, bytes_written, artifact_path)) = self.won {
            return RaceResult::Won {
                label,
                bytes_written,
                artifact_path,
            };
        }
        if let Some(reason) = cancel_reason {
            return RaceResult::Cancelled { reason };
        }
        RaceResult::Exhausted {
            attempted: self.attempted,
            rejected: self.rejected,
            retry_exhausted: self.retry_exhausted,
            last_reasons: self.last_reasons,
        }
    }
}

struct WorkerReport {
    label: String,
    outcome: ProbeOutcome,
    duration: Duration,
}

// ============================================================================
// Probe Scheduler
// ============================================================================

/// Races candidates to the first validated success.
pub struct ProbeScheduler {
    config: RaceConfig,
    target: FirmwareTarget,
    fetcher: Arc<StreamingFetcher>,
    sinks: Arc<dyn SinkFactory>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl ProbeScheduler {
    /// Creates a scheduler over the given collaborators.
    pub fn new(
        config: RaceConfig,
        target: FirmwareTarget,
        transport: Arc<dyn Transport>,
        deriver: Arc<dyn CredentialDeriver>,
        sinks: Arc<dyn SinkFactory>,
    ) -> Self {
        let fetcher = Arc::new(StreamingFetcher::new(
            &config,
            target.clone(),
            transport,
            deriver,
        ));
        Self {
            config,
            target,
            fetcher,
            sinks,
            shutdown: None,
        }
    }

    /// Attaches a caller-side cancellation signal.
    ///
    /// Flipping it to `true` tears the race down and yields
    /// [`RaceResult::Cancelled`] with [`CancelReason::CallerCancelled`].
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Generates candidates and runs the configured cycles.
    ///
    /// Terminates early on any win or cancellation; the global deadline
    /// spans all cycles.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] only for configuration failures detected
    /// before any network I/O.
    pub async fn run(&self, aggregator: &mut ResultAggregator) -> Result<RaceResult, CoreError> {
        let candidates = candidates::generate(&self.target, &self.config)?;
        let mut rng = self.rng();
        let deadline = Instant::now() + self.config.race_deadline();

        let mut last = RaceResult::Exhausted {
            attempted: 0,
            rejected: 0,
            retry_exhausted: 0,
            last_reasons: Vec::new(),
        };

        for cycle in 1..=self.config.max_cycles {
            let mut queue = candidates.clone();
            if self.config.shuffle {
                queue.shuffle(&mut rng);
            }

            info!(cycle, candidates = queue.len(), "Starting race cycle");
            let result = self.race_until(queue, aggregator, deadline, &mut rng).await;

            match result {
                RaceResult::Won { .. } | RaceResult::Cancelled { .. } => return Ok(result),
                RaceResult::Exhausted { .. } => last = result,
            }

            if cycle < self.config.max_cycles {
                let delay = self.config.inter_cycle_delay();
                if Instant::now() + delay >= deadline {
                    info!("Race deadline covers the remaining cycles, stopping");
                    return Ok(RaceResult::Cancelled {
                        reason: CancelReason::DeadlineExceeded,
                    });
                }
                debug!(delay = ?delay, "Sleeping between cycles");
                tokio::time::sleep(delay).await;
            }
        }

        Ok(last)
    }

    /// Races one candidate list with the deadline taken from configuration.
    pub async fn race(
        &self,
        candidates: Vec<Candidate>,
        aggregator: &mut ResultAggregator,
    ) -> RaceResult {
        let mut rng = self.rng();
        let deadline = Instant::now() + self.config.race_deadline();
        self.race_until(candidates, aggregator, deadline, &mut rng)
            .await
    }

    fn rng(&self) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    async fn race_until(
        &self,
        candidates: Vec<Candidate>,
        aggregator: &mut ResultAggregator,
        deadline: Instant,
        rng: &mut StdRng,
    ) -> RaceResult {
        let cap = self.config.concurrency.max(1);
        let mut queue = candidates.into_iter();

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let mut workers: JoinSet<WorkerReport> = JoinSet::new();
        let mut labels: HashMap<tokio::task::Id, String> = HashMap::new();

        let mut state = ScheduleState::default();
        let mut progress = RaceProgress::default();
        let mut cancel_reason: Option<CancelReason> = None;
        let mut grace_deadline = deadline + self.config.grace_period();
        let mut aborted = false;

        let has_shutdown = self.shutdown.is_some();
        let (_noop_tx, noop_rx) = watch::channel(false);
        let mut shutdown = self.shutdown.clone().unwrap_or(noop_rx);

        loop {
            // Fill free worker slots while the race is open.
            while !state.closing() && state.in_flight < cap {
                let Some(candidate) = queue.next() else { break };
                progress.attempted += 1;
                state.in_flight += 1;

                let fetcher = Arc::clone(&self.fetcher);
                let sinks = Arc::clone(&self.sinks);
                let mut cancel = cancel_rx.clone();
                let mut worker_rng = StdRng::seed_from_u64(rng.next_u64());
                let label = candidate.label.clone();

                debug!(candidate = %label, in_flight = state.in_flight, "Starting attempt");
                let handle = workers.spawn(async move {
                    let started = Instant::now();
                    let outcome = fetcher
                        .run(&candidate, sinks.as_ref(), &mut cancel, &mut worker_rng)
                        .await;
                    WorkerReport {
                        label: candidate.label,
                        outcome,
                        duration: started.elapsed(),
                    }
                });
                labels.insert(handle.id(), label);
            }

            if state.in_flight == 0 {
                break;
            }

            tokio::select! {
                Some(joined) = workers.join_next_with_id() => {
                    state.in_flight -= 1;
                    match joined {
                        Ok((id, report)) => {
                            labels.remove(&id);
                            self.absorb(
                                report,
                                &mut state,
                                &mut progress,
                                &cancel_tx,
                                &mut grace_deadline,
                                aggregator,
                            )
                            .await;
                        }
                        Err(join_err) => {
                            // Aborted past the grace period (or panicked);
                            // account it as cancelled.
                            let label = labels
                                .remove(&join_err.id())
                                .unwrap_or_else(|| "unknown".to_string());
                            if join_err.is_panic() {
                                warn!(candidate = %label, "Worker panicked");
                            }
                            aggregator.record(
                                label,
                                firmrace_core::AttemptOutcome::Cancelled,
                                Duration::ZERO,
                            );
                        }
                    }
                }
                () = tokio::time::sleep_until(deadline), if !state.closing() => {
                    info!("Race deadline reached, cancelling in-flight attempts");
                    state.cancelled = true;
                    cancel_reason = Some(CancelReason::DeadlineExceeded);
                    grace_deadline = Instant::now() + self.config.grace_period();
                    let _ = cancel_tx.send(true);
                }
                () = wait_cancelled(&mut shutdown), if has_shutdown && !state.closing() => {
                    info!("Caller cancelled the race");
                    state.cancelled = true;
                    cancel_reason = Some(CancelReason::CallerCancelled);
                    grace_deadline = Instant::now() + self.config.grace_period();
                    let _ = cancel_tx.send(true);
                }
                () = tokio::time::sleep_until(grace_deadline), if state.closing() && !aborted => {
                    warn!(remaining = state.in_flight, "Grace period expired, aborting workers");
                    workers.abort_all();
                    aborted = true;
                }
            }
        }

        progress.into_result(cancel_reason)
    }

    async fn absorb(
        &self,
        report: WorkerReport,
        state: &mut ScheduleState,
        progress: &mut RaceProgress,
        cancel_tx: &watch::Sender<bool>,
        grace_deadline: &mut Instant,
        aggregator: &mut ResultAggregator,
    ) {
        let record = report.outcome.to_record(&report.label);

        match report.outcome {
            ProbeOutcome::Success { staged } => {
                if state.winner || state.cancelled {
                    // A success racing the winner (or arriving after a
                    // cancellation) is redundant; its output is discarded.
                    debug!(candidate = %report.label, "Redundant success discarded");
                    staged.discard().await;
                    aggregator.record(
                        report.label,
                        firmrace_core::AttemptOutcome::Cancelled,
                        report.duration,
                    );
                    return;
                }

                state.winner = true;
                let _ = cancel_tx.send(true);
                *grace_deadline = Instant::now() + self.config.grace_period();

                let bytes_written = staged.bytes_written();
                info!(candidate = %report.label, bytes_written, "Winner found, cancelling the rest");

                match staged.commit().await {
                    Ok(artifact_path) => {
                        progress.won = Some((report.label.clone(), bytes_written, artifact_path));
                        aggregator.record(report.label, record, report.duration);
                    }
                    Err(e) => {
                        // The download finished but could not be published;
                        // the race still tears down and reports the failure.
                        warn!(candidate = %report.label, error = %e, "Failed to commit artifact");
                        progress.note_reason(format!("commit failed: {e}"));
                        aggregator.record(
                            report.label,
                            firmrace_core::AttemptOutcome::Cancelled,
                            report.duration,
                        );
                    }
                }
            }
            ProbeOutcome::Rejected { ref reason } => {
                progress.rejected += 1;
                progress.note_reason(reason.to_string());
                aggregator.record(report.label, record, report.duration);
            }
            ProbeOutcome::RetryExhausted { ref last_reason } => {
                progress.retry_exhausted += 1;
                progress.note_reason(last_reason.clone());
                aggregator.record(report.label, record, report.duration);
            }
            ProbeOutcome::Cancelled => {
                aggregator.record(report.label, record, report.duration);
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::credential::DigestDeriver;
    use crate::error::TransportError;
    use crate::sink::MemorySinkFactory;
    use crate::transport::{TransportRequest, TransportResponse};

    /// Transport whose every send fails to connect.
    struct DownTransport;

    #[async_trait]
    impl Transport for DownTransport {
        async fn send(
            &self,
            _request: TransportRequest,
        ) -> Result<TransportResponse, TransportError> {
            Err(TransportError::Connect("refused".into()))
        }
    }

    fn target() -> FirmwareTarget {
        FirmwareTarget::new("SM-S906B", "EUX", "A/B/C")
    }

    fn scheduler(config: RaceConfig) -> ProbeScheduler {
        ProbeScheduler::new(
            config,
            target(),
            Arc::new(DownTransport),
            Arc::new(DigestDeriver::new(target())),
            Arc::new(MemorySinkFactory::new()),
        )
    }

    #[tokio::test]
    async fn test_empty_candidate_list_exhausts_immediately() {
        let sched = scheduler(RaceConfig::default());
        let mut aggregator = ResultAggregator::new();
        let result = sched.race(Vec::new(), &mut aggregator).await;

        assert_eq!(
            result,
            RaceResult::Exhausted {
                attempted: 0,
                rejected: 0,
                retry_exhausted: 0,
                last_reasons: Vec::new(),
            }
        );
        assert!(aggregator.records().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failures_classified_as_retry_exhausted() {
        let config = RaceConfig {
            max_retries: 1,
            concurrency: 2,
            seed: Some(1),
            ..RaceConfig::default()
        };
        let sched = scheduler(config);
        let mut aggregator = ResultAggregator::new();

        let candidates = candidates::generate(
            &target(),
            &RaceConfig {
                servers: vec!["https://alpha.example".into()],
                endpoints: vec!["/dl.aspx".into()],
                param_schemes: vec![firmrace_core::ParamScheme::FusQuery],
                credential_schemes: vec![firmrace_core::CredentialScheme::Standard],
                include_direct: false,
                ..RaceConfig::default()
            },
        )
        .unwrap();

        let result = sched.race(candidates, &mut aggregator).await;
        match result {
            RaceResult::Exhausted {
                attempted,
                rejected,
                retry_exhausted,
                last_reasons,
            } => {
                assert_eq!(attempted, 1);
                assert_eq!(rejected, 0);
                assert_eq!(retry_exhausted, 1);
                assert!(last_reasons.iter().any(|r| r.contains("connection failed")));
            }
            other => panic!("expected exhausted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_shutdown_cancels_race() {
        let config = RaceConfig {
            // Retry forever-ish so the race outlives the shutdown signal.
            max_retries: 1_000,
            seed: Some(1),
            ..RaceConfig::default()
        };
        let (tx, rx) = watch::channel(false);
        let sched = scheduler(config).with_shutdown(rx);
        let mut aggregator = ResultAggregator::new();

        let candidates = vec![Candidate {
            endpoint: "https://alpha.example/dl.aspx".into(),
            param_scheme: firmrace_core::ParamScheme::FusQuery,
            credential_scheme: firmrace_core::CredentialScheme::Standard,
            label: "standard fus alpha".into(),
        }];

        let race = sched.race(candidates, &mut aggregator);
        tokio::pin!(race);
        assert!(futures::poll!(race.as_mut()).is_pending());
        tx.send(true).unwrap();

        let result = race.await;
        assert_eq!(
            result,
            RaceResult::Cancelled {
                reason: CancelReason::CallerCancelled
            }
        );
    }
}
