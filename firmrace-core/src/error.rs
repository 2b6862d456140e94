//! Core error types for `firmrace`.

use thiserror::Error;

/// Core error type for `firmrace` operations.
///
/// These errors are fatal: they surface to the caller before any network
/// I/O happens. Per-attempt failures during a race are never reported
/// through this type.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The firmware target is malformed (empty model/region, bad version code).
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// Invalid race configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}
