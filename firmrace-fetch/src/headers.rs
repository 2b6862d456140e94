//! Per-attempt header synthesis.
//!
//! Headers are re-sampled on every send from the configured option pools,
//! with the optional headers gated by explicit inclusion probabilities.
//! The random source is caller-supplied so workers keep their own rng and
//! tests can seed it for deterministic header sets.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;

use firmrace_core::{Candidate, FirmwareTarget, HeaderPools};

use crate::credential::{Credential, CredentialDeriver};

// ============================================================================
// Synthesized Headers
// ============================================================================

/// The header set and credential produced for one send.
#[derive(Debug, Clone)]
pub struct SynthesizedHeaders {
    /// Ordered header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// The credential derived for this send.
    pub credential: Credential,
}

// ============================================================================
// Header Synthesizer
// ============================================================================

/// Builds a request header set for a candidate.
pub struct HeaderSynthesizer {
    pools: HeaderPools,
    target: FirmwareTarget,
    deriver: Arc<dyn CredentialDeriver>,
}

impl HeaderSynthesizer {
    /// Creates a synthesizer over the given pools and credential deriver.
    pub fn new(
        pools: HeaderPools,
        target: FirmwareTarget,
        deriver: Arc<dyn CredentialDeriver>,
    ) -> Self {
        Self {
            pools,
            target,
            deriver,
        }
    }

    /// Synthesizes the header set for one send of `candidate`.
    ///
    /// Never blocks; the only side effect is consuming randomness from
    /// `rng`.
    pub fn synthesize<R: Rng + ?Sized>(
        &self,
        candidate: &Candidate,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> SynthesizedHeaders {
        let credential = self.deriver.derive(candidate.credential_scheme, now);

        let mut headers = vec![
            ("User-Agent".to_string(), pick(&self.pools.user_agents, rng)),
            ("Accept".to_string(), pick(&self.pools.accepts, rng)),
            ("Accept-Encoding".to_string(), "gzip, deflate".to_string()),
            (
                "Accept-Language".to_string(),
                pick(&self.pools.accept_languages, rng),
            ),
            ("Connection".to_string(), "keep-alive".to_string()),
            (
                "Cache-Control".to_string(),
                pick(&self.pools.cache_controls, rng),
            ),
            ("Pragma".to_string(), "no-cache".to_string()),
            ("DNT".to_string(), "1".to_string()),
        ];

        if rng.gen_bool(self.pools.vendor_header_probability) {
            headers.push(("X-Samsung-Device".to_string(), self.target.model.clone()));
            headers.push(("X-Samsung-Region".to_string(), self.target.region.clone()));
        }

        if rng.gen_bool(self.pools.bearer_probability) {
            headers.push((
                "Authorization".to_string(),
                format!("Bearer {}", credential.token),
            ));
        }

        SynthesizedHeaders {
            headers,
            credential,
        }
    }
}

fn pick<R: Rng + ?Sized>(pool: &[String], rng: &mut R) -> String {
    if pool.is_empty() {
        return String::new();
    }
    pool[rng.gen_range(0..pool.len())].clone()
}

// ============================================================================
// Tests
// ============================================================================
