//! Domain models for firmrace.
//!
//! ## Submodules
//!
//! - [`target`] - Firmware target identification (model/region/version)
//! - [`candidate`] - Candidate descriptors (endpoint × param × credential)
//! - [`outcome`] - Attempt and race outcomes

mod candidate;
mod outcome;
mod target;

// Re-export everything at the models level
pub use candidate::{Candidate, CredentialScheme, ParamScheme};
pub use outcome::{AttemptOutcome, CancelReason, RaceResult, RejectReason};
pub use target::{FirmwareTarget, VersionParts};
