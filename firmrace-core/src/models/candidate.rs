//! Candidate descriptors.
//!
//! A [`Candidate`] is one fully specified way to ask a mirror for the
//! firmware archive: an endpoint URL plus the parameter and credential
//! schemes to use when building the concrete request. Candidates are
//! generated once per race and are immutable afterwards.

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Parameter Scheme
// ============================================================================

/// How request parameters are laid out for a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamScheme {
    /// FUS-style query: device/region/pda/csc/cp plus auth token.
    FusQuery,
    /// File-based query: archive filename plus signature.
    FileQuery,
    /// Session-style query: version code plus session token.
    SessionQuery,
    /// Direct archive path on the mirror, no query string.
    DirectPath,
}

impl ParamScheme {
    /// Returns the display name for this scheme.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::FusQuery => "fus",
            Self::FileQuery => "file",
            Self::SessionQuery => "session",
            Self::DirectPath => "direct",
        }
    }
}

impl fmt::Display for ParamScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// ============================================================================
// Credential Scheme
// ============================================================================

/// Which credential derivation to attach to a candidate's requests.
///
/// The engine treats derived credentials as opaque blobs; the scheme tag
/// only selects which derivation the [`CredentialDeriver`] runs.
///
/// [`CredentialDeriver`]: https://docs.rs/firmrace-fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialScheme {
    /// Colon-joined message, salted digest, base64 token.
    Standard,
    /// Pipe-joined message, plain digest, reversed token layout.
    Alternative,
    /// Concatenated message, legacy digest, raw token.
    Simple,
}

impl CredentialScheme {
    /// Returns the display name for this scheme.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Alternative => "alternative",
            Self::Simple => "simple",
        }
    }
}

impl fmt::Display for CredentialScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// ============================================================================
// Candidate
// ============================================================================

/// One endpoint × parameter-scheme × credential-scheme combination.
///
/// `endpoint` is the full URL template without query parameters; the
/// concrete query (including time-varying credential fields) is built per
/// attempt so that candidate identity stays stable across retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Endpoint URL without query string.
    pub endpoint: String,
    /// Query parameter layout.
    pub param_scheme: ParamScheme,
    /// Credential derivation to use.
    pub credential_scheme: CredentialScheme,
    /// Human-readable label for reporting (e.g. `standard fus neofussvr`).
    pub label: String,
}

impl Candidate {
    /// Returns the identity tuple for duplicate detection.
    ///
    /// Two candidates with equal identities are the same attempt and must
    /// never both be emitted by the generator.
    pub fn identity(&self) -> (&str, ParamScheme, CredentialScheme) {
        (&self.endpoint, self.param_scheme, self.credential_scheme)
    }
}

// ============================================================================
// Tests
// ============================================================================
