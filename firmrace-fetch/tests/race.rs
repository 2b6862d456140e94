//! End-to-end races over a scripted transport.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use firmrace_core::{
    CancelReason, CredentialScheme, FirmwareTarget, ParamScheme, RaceConfig, RaceResult,
};
use firmrace_fetch::{
    DigestDeriver, MemorySinkFactory, ProbeScheduler, ResultAggregator, Transport, TransportError,
    TransportRequest, TransportResponse, candidates,
};

// ============================================================================
// Scripted Transport
// ============================================================================

/// What the script wants done with one request.
enum Scripted {
    Respond(u16, Option<&'static str>, Option<u64>, usize),
    Fail(TransportError),
    Hang,
}

/// Transport driven by a request-inspecting script, tracking concurrency.
struct RaceTransport {
    script: Box<dyn Fn(usize, &TransportRequest) -> Scripted + Send + Sync>,
    sends: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RaceTransport {
    fn new(script: impl Fn(usize, &TransportRequest) -> Scripted + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            sends: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    fn send_count(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for RaceTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let n = self.sends.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        // Hold the slot long enough for overlapping sends to observe each
        // other.
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match (self.script)(n, &request) {
            Scripted::Respond(status, content_type, content_length, body_bytes) => {
                let chunks: Vec<Result<Vec<u8>, TransportError>> = (0..body_bytes)
                    .step_by(4096)
                    .map(|off| Ok(vec![0u8; (body_bytes - off).min(4096)]))
                    .collect();
                Ok(TransportResponse {
                    status,
                    content_type: content_type.map(str::to_owned),
                    content_length,
                    location: None,
                    body: futures::stream::iter(chunks).boxed(),
                })
            }
            Scripted::Fail(e) => Err(e),
            Scripted::Hang => futures::future::pending().await,
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn target() -> FirmwareTarget {
    FirmwareTarget::new("SM-S906B", "EUX", "S906BXXU2AVB1/S906BOXM2AVB1/S906BXXU2AVB1")
}

fn config(servers: &[&str], endpoints: &[&str]) -> RaceConfig {
    RaceConfig {
        servers: servers.iter().map(|s| (*s).to_string()).collect(),
        endpoints: endpoints.iter().map(|s| (*s).to_string()).collect(),
        param_schemes: vec![ParamScheme::FusQuery],
        credential_schemes: vec![CredentialScheme::Standard, CredentialScheme::Alternative],
        include_direct: false,
        shuffle: false,
        seed: Some(7),
        ..RaceConfig::default()
    }
}

struct Harness {
    scheduler: ProbeScheduler,
    transport: Arc<RaceTransport>,
    sinks: Arc<MemorySinkFactory>,
}

fn harness(config: RaceConfig, transport: RaceTransport) -> Harness {
    let transport = Arc::new(transport);
    let sinks = Arc::new(MemorySinkFactory::new());
    let scheduler = ProbeScheduler::new(
        config,
        target(),
        Arc::clone(&transport) as Arc<dyn Transport>,
        Arc::new(DigestDeriver::new(target())),
        Arc::clone(&sinks) as Arc<dyn firmrace_fetch::SinkFactory>,
    );
    Harness {
        scheduler,
        transport,
        sinks,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_first_validated_success_wins() {
    let cfg = RaceConfig {
        concurrency: 2,
        ..config(
            &["https://alpha.example", "https://bravo.example"],
            &["/NF_DownloadBinaryForMass.aspx", "/NF_DownloadBinary.aspx"],
        )
    };
    let candidates = candidates::generate(&target(), &cfg).unwrap();
    assert_eq!(candidates.len(), 8);

    // The first four probes 403; the fifth serves the real archive.
    let h = harness(
        cfg,
        RaceTransport::new(|n, _| {
            if n < 4 {
                Scripted::Respond(403, Some("text/html"), Some(312), 312)
            } else {
                Scripted::Respond(200, Some("application/zip"), Some(6_000_000), 6_000_000)
            }
        }),
    );

    let mut aggregator = ResultAggregator::new();
    let result = h.scheduler.race(candidates, &mut aggregator).await;

    match result {
        RaceResult::Won { bytes_written, .. } => assert_eq!(bytes_written, 6_000_000),
        other => panic!("expected a win, got {other:?}"),
    }
    assert_eq!(h.sinks.commit_count(), 1);
    assert_eq!(
        aggregator
            .records()
            .iter()
            .filter(|r| r.outcome.is_success())
            .count(),
        1
    );
    // With K=2 only the other in-flight probe (at most) plus nothing queued
    // can end up cancelled.
    assert!(
        aggregator
            .records()
            .iter()
            .filter(|r| r.outcome == firmrace_core::AttemptOutcome::Cancelled)
            .count()
            <= 2
    );
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_never_exceeds_cap() {
    let cfg = RaceConfig {
        concurrency: 3,
        ..config(
            &["https://alpha.example", "https://bravo.example"],
            &["/a.aspx", "/b.aspx"],
        )
    };
    let candidates = candidates::generate(&target(), &cfg).unwrap();
    assert_eq!(candidates.len(), 8);

    let h = harness(
        cfg,
        RaceTransport::new(|_, _| Scripted::Respond(404, None, None, 0)),
    );

    let mut aggregator = ResultAggregator::new();
    let result = h.scheduler.race(candidates, &mut aggregator).await;

    match result {
        RaceResult::Exhausted {
            attempted,
            rejected,
            retry_exhausted,
            ..
        } => {
            assert_eq!(attempted, 8);
            assert_eq!(rejected, 8);
            assert_eq!(retry_exhausted, 0);
        }
        other => panic!("expected exhausted, got {other:?}"),
    }
    assert_eq!(h.transport.max_in_flight(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_at_most_one_winner_commits() {
    // Every candidate serves a valid archive; exactly one commit must
    // survive, everything else staged gets discarded.
    let cfg = RaceConfig {
        concurrency: 4,
        ..config(&["https://alpha.example"], &["/a.aspx", "/b.aspx"])
    };
    let candidates = candidates::generate(&target(), &cfg).unwrap();
    assert_eq!(candidates.len(), 4);

    let h = harness(
        cfg,
        RaceTransport::new(|_, _| {
            Scripted::Respond(200, Some("application/octet-stream"), None, 8_192)
        }),
    );

    let mut aggregator = ResultAggregator::new();
    let result = h.scheduler.race(candidates, &mut aggregator).await;

    assert!(result.is_won());
    assert_eq!(h.sinks.commit_count(), 1);
    assert_eq!(
        aggregator
            .records()
            .iter()
            .filter(|r| r.outcome.is_success())
            .count(),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_deadline_cancels_hung_attempts() {
    let cfg = RaceConfig {
        race_deadline_secs: 2,
        grace_period_secs: 1,
        concurrency: 5,
        ..config(&["https://alpha.example"], &["/a.aspx"])
    };
    let candidates = candidates::generate(&target(), &cfg).unwrap();
    assert_eq!(candidates.len(), 2);

    let h = harness(cfg, RaceTransport::new(|_, _| Scripted::Hang));

    let mut aggregator = ResultAggregator::new();
    let result = h.scheduler.race(candidates, &mut aggregator).await;

    assert_eq!(
        result,
        RaceResult::Cancelled {
            reason: CancelReason::DeadlineExceeded
        }
    );
    // Both in-flight attempts observed the cancel and reported it.
    assert_eq!(aggregator.records().len(), 2);
    assert!(
        aggregator
            .records()
            .iter()
            .all(|r| r.outcome == firmrace_core::AttemptOutcome::Cancelled)
    );
    assert_eq!(h.sinks.commit_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_all_timeouts_classified_as_retry_exhausted() {
    let cfg = RaceConfig {
        max_retries: 1,
        ..config(&["https://alpha.example"], &["/a.aspx"])
    };
    let candidates = candidates::generate(&target(), &cfg).unwrap();
    assert_eq!(candidates.len(), 2);

    let h = harness(
        cfg,
        RaceTransport::new(|_, _| Scripted::Fail(TransportError::Timeout)),
    );

    let mut aggregator = ResultAggregator::new();
    let result = h.scheduler.race(candidates, &mut aggregator).await;

    match result {
        RaceResult::Exhausted {
            attempted,
            rejected,
            retry_exhausted,
            last_reasons,
        } => {
            assert_eq!(attempted, 2);
            assert_eq!(rejected, 0);
            assert_eq!(retry_exhausted, 2);
            assert!(last_reasons.iter().any(|r| r.contains("timed out")));
        }
        other => panic!("expected exhausted, got {other:?}"),
    }
    // Two candidates, each sent twice (initial + one retry).
    assert_eq!(h.transport.send_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_second_cycle_retries_rejected_candidates() {
    let cfg = RaceConfig {
        servers: vec!["https://alpha.example".to_string()],
        endpoints: vec!["/a.aspx".to_string()],
        param_schemes: vec![ParamScheme::FusQuery],
        credential_schemes: vec![CredentialScheme::Standard],
        include_direct: false,
        max_retries: 0,
        max_cycles: 2,
        inter_cycle_delay_secs: 1,
        shuffle: false,
        seed: Some(7),
        ..RaceConfig::default()
    };

    // The single candidate 404s on the first cycle and serves the archive
    // on the second.
    let h = harness(
        cfg,
        RaceTransport::new(|n, _| {
            if n == 0 {
                Scripted::Respond(404, None, None, 0)
            } else {
                Scripted::Respond(200, Some("application/zip"), Some(2_000_000), 4_096)
            }
        }),
    );

    let mut aggregator = ResultAggregator::new();
    let result = h.scheduler.run(&mut aggregator).await.unwrap();

    assert!(result.is_won());
    assert_eq!(h.transport.send_count(), 2);
    assert_eq!(aggregator.records().len(), 2);
}
