//! Credential derivation.
//!
//! The engine treats credentials as opaque blobs attached to requests; the
//! only requirement is that each [`CredentialScheme`] yields a distinct,
//! deterministic-for-a-timestamp value. [`DigestDeriver`] reproduces the
//! three token layouts the download servers have been observed to accept.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use ring::digest;

use firmrace_core::{CredentialScheme, FirmwareTarget};

/// Default secret salt mixed into the standard derivation.
const DEFAULT_SECRET: &str = "versioninfo";

// ============================================================================
// Credential
// ============================================================================

/// An opaque derived credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Unix timestamp the credential was derived for, as a string.
    pub timestamp: String,
    /// Hex signature over the target identity.
    pub signature: String,
    /// Token attached as a bearer/query value.
    pub token: String,
}

// ============================================================================
// Credential Deriver
// ============================================================================

/// Produces a credential for a scheme at a point in time.
///
/// Implementations must be cheap and non-blocking; derivation happens on
/// every send.
pub trait CredentialDeriver: Send + Sync {
    /// Derives the credential for `scheme` at `now`.
    fn derive(&self, scheme: CredentialScheme, now: DateTime<Utc>) -> Credential;
}

// ============================================================================
// Digest Deriver
// ============================================================================

/// Digest-based deriver over the target identity.
#[derive(Debug, Clone)]
pub struct DigestDeriver {
    target: FirmwareTarget,
    secret: String,
}

impl DigestDeriver {
    /// Creates a deriver for the given target with the default secret.
    pub fn new(target: FirmwareTarget) -> Self {
        Self {
            target,
            secret: DEFAULT_SECRET.to_string(),
        }
    }

    /// Overrides the secret salt.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = secret.into();
        self
    }
}

impl CredentialDeriver for DigestDeriver {
    fn derive(&self, scheme: CredentialScheme, now: DateTime<Utc>) -> Credential {
        let ts = now.timestamp().to_string();
        let t = &self.target;

        match scheme {
            CredentialScheme::Standard => {
                let message = format!("{}:{}:{}:{}:{}", t.model, t.region, t.version, ts, self.secret);
                let mut signature = hex_digest(&digest::SHA256, message.as_bytes());
                signature.truncate(32);
                let token = BASE64.encode(format!("{ts}:{signature}"));
                Credential {
                    timestamp: ts,
                    signature,
                    token,
                }
            }
            CredentialScheme::Alternative => {
                let message = format!("{}|{}|{}|{}", t.version, t.model, t.region, ts);
                let mut signature = hex_digest(&digest::SHA256, message.as_bytes());
                signature.truncate(32);
                let token = BASE64.encode(format!("{signature}:{ts}"));
                Credential {
                    timestamp: ts,
                    signature,
                    token,
                }
            }
            CredentialScheme::Simple => {
                let message = format!("{}{}{}", t.model, t.region, ts);
                let signature =
                    hex_digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, message.as_bytes());
                let token = format!("{signature}:{ts}");
                Credential {
                    timestamp: ts,
                    signature,
                    token,
                }
            }
        }
    }
}

fn hex_digest(algorithm: &'static digest::Algorithm, data: &[u8]) -> String {
    let hash = digest::digest(algorithm, data);
    let mut out = String::with_capacity(hash.as_ref().len() * 2);
    for byte in hash.as_ref() {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

// ============================================================================
// Tests
// ============================================================================
