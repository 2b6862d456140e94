// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Firmrace Fetch
//!
//! The download race engine for firmrace.
//!
//! This crate enumerates candidate fetch attempts for a firmware build,
//! probes them concurrently under a bounded cap, and commits the first
//! response that validates as a real artifact. It includes:
//!
//! ## Candidate Enumeration
//!
//! - [`candidates::generate`] - Cartesian expansion of servers, endpoints,
//!   parameter schemes, and credential schemes
//! - [`headers::HeaderSynthesizer`] - Per-attempt request header synthesis
//! - [`credential::CredentialDeriver`] - Derives the auth token variants
//!
//! ## Probe Execution
//!
//! - [`transport::Transport`] - The network seam; [`transport::HttpTransport`]
//!   is the reqwest-backed production implementation
//! - [`fetcher::StreamingFetcher`] - One candidate's attempt: send, validate,
//!   retry transient failures, stream the accepted body
//! - [`validate::ValidationPolicy`] - Metadata heuristics separating real
//!   artifacts from decoy success pages
//! - [`sink::SinkFactory`] - Staged artifact output; partial and redundant
//!   downloads are never visible under the final name
//!
//! ## The Race
//!
//! - [`scheduler::ProbeScheduler`] - Coordinates workers, commits the first
//!   validated success, cancels everything else
//! - [`report::ResultAggregator`] - Collects per-attempt records into a
//!   [`report::RaceReport`]
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use firmrace_core::{FirmwareTarget, RaceConfig};
//! use firmrace_fetch::{
//!     DigestDeriver, FileSinkFactory, HttpTransport, ProbeScheduler,
//!     ResultAggregator,
//! };
//!
//! let target = FirmwareTarget::new("SM-S906B", "EUX", "S906BXXU2AVB1/S906BOXM2AVB1/S906BXXU2AVB1");
//! let config = RaceConfig::default();
//!
//! let scheduler = ProbeScheduler::new(
//!     config,
//!     target.clone(),
//!     Arc::new(HttpTransport::new()?),
//!     Arc::new(DigestDeriver::new(target)),
//!     Arc::new(FileSinkFactory::new(".")),
//! );
//!
//! let mut aggregator = ResultAggregator::new();
//! let result = scheduler.run(&mut aggregator).await?;
//! ```

// Core modules
pub mod candidates;
pub mod credential;
pub mod error;
pub mod fetcher;
pub mod headers;
pub mod report;
pub mod retry;
pub mod scheduler;
pub mod sink;
pub mod transport;
pub mod validate;

// Re-export key types at crate root

// Errors
pub use error::{ErrorClass, FetchError, SinkError, TransportError};

// Candidate enumeration
pub use credential::{Credential, CredentialDeriver, DigestDeriver};
pub use headers::{HeaderSynthesizer, SynthesizedHeaders};

// Probe execution
pub use fetcher::{ProbeOutcome, StreamingFetcher};
pub use retry::RetryPolicy;
pub use sink::{ArtifactSink, FileSinkFactory, MemorySinkFactory, SinkFactory, StagedArtifact};
pub use transport::{BodyStream, HttpTransport, Transport, TransportRequest, TransportResponse};
pub use validate::{ValidationPolicy, Verdict};

// The race
pub use report::{AttemptRecord, RaceReport, ResultAggregator};
pub use scheduler::ProbeScheduler;
