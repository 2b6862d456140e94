//! Fetch error types and the transient/structural classification table.

use thiserror::Error;

// ============================================================================
// Main Fetch Error
// ============================================================================

/// Error type for fetch engine construction and fatal failures.
///
/// Per-attempt failures are contained inside attempt outcomes and never
/// surface through this type.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Sink failure.
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// Core error (bad target or configuration).
    #[error("Core error: {0}")]
    Core(#[from] firmrace_core::CoreError),

    /// Failed to build the HTTP client.
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

// ============================================================================
// Transport Error
// ============================================================================

/// How a transport failure should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Might succeed on retry of the same candidate.
    Transient,
    /// The candidate itself is wrong; retrying cannot help.
    Structural,
}

/// Error type for the transport seam.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request (or a body chunk read) timed out.
    #[error("request timed out")]
    Timeout,

    /// Connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Connection dropped mid-exchange.
    #[error("connection reset: {0}")]
    Reset(String),

    /// The request itself could not be built (bad URL or header value).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Any other transport failure.
    #[error("transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Classifies this failure for the retry decision.
    ///
    /// Network-level failures are transient; a request that cannot even be
    /// built is structural, since re-sending the same candidate rebuilds
    /// the same request.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Timeout | Self::Connect(_) | Self::Reset(_) | Self::Other(_) => {
                ErrorClass::Transient
            }
            Self::InvalidRequest(_) => ErrorClass::Structural,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else if err.is_builder() || err.is_request() {
            Self::InvalidRequest(err.to_string())
        } else if err.is_body() || err.is_decode() {
            Self::Reset(err.to_string())
        } else {
            Self::Other(err.to_string())
        }
    }
}

// ============================================================================
// Sink Error
// ============================================================================

/// Error type for artifact sinks.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The artifact name is not usable as a file name.
    #[error("invalid artifact name: {0}")]
    InvalidName(String),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_table() {
        assert_eq!(TransportError::Timeout.class(), ErrorClass::Transient);
        assert_eq!(
            TransportError::Connect("refused".into()).class(),
            ErrorClass::Transient
        );
        assert_eq!(
            TransportError::Reset("eof".into()).class(),
            ErrorClass::Transient
        );
        assert_eq!(
            TransportError::Other("tls".into()).class(),
            ErrorClass::Transient
        );
        assert_eq!(
            TransportError::InvalidRequest("bad header".into()).class(),
            ErrorClass::Structural
        );
    }
}
