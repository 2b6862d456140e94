// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # firmrace Core
//!
//! Core types, models, and configuration for the firmrace workspace.
//!
//! This crate provides the foundational abstractions used across the other
//! firmrace crates:
//!
//! - Domain models (targets, candidates, outcomes)
//! - The race configuration surface
//! - Fatal error types
//!
//! ## Key Types
//!
//! - [`FirmwareTarget`] - The firmware build to locate (model/region/version)
//! - [`Candidate`] - One endpoint × parameter × credential combination
//! - [`AttemptOutcome`] - Terminal outcome of a single attempt
//! - [`RaceResult`] - The single race-level result reported to the caller
//! - [`RaceConfig`] - Every knob consumed by the race engine

pub mod config;
pub mod error;
pub mod models;

// Re-export error types
pub use error::CoreError;

// Re-export configuration
pub use config::{HeaderPools, RaceConfig};

// Re-export all model types
pub use models::{
    AttemptOutcome, CancelReason, Candidate, CredentialScheme, FirmwareTarget, ParamScheme,
    RaceResult, RejectReason, VersionParts,
};
