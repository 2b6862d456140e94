//! Race configuration surface.
//!
//! [`RaceConfig`] is the single knob bundle consumed by candidate
//! generation, header synthesis, validation, retry, and scheduling. It
//! serializes to JSON so a whole race can be described in a config file.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::CoreError;
use crate::models::{CredentialScheme, FirmwareTarget, ParamScheme};

// ============================================================================
// Header Pools
// ============================================================================

/// Option pools sampled when synthesizing per-attempt request headers.
///
/// The probability fields make the original ad hoc coin flips explicit:
/// tests can fix the random source and assert a deterministic header set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderPools {
    /// User-Agent values to rotate through.
    pub user_agents: Vec<String>,
    /// Accept header values.
    pub accepts: Vec<String>,
    /// Accept-Language header values.
    pub accept_languages: Vec<String>,
    /// Cache-Control header values.
    pub cache_controls: Vec<String>,
    /// Probability of attaching the vendor device/region headers.
    pub vendor_header_probability: f64,
    /// Probability of attaching the bearer credential header.
    pub bearer_probability: f64,
}

impl Default for HeaderPools {
    fn default() -> Self {
        Self {
            user_agents: vec![
                "Kies2.0_FUS".into(),
                "Samsung Kies/2.6.3.14044_17".into(),
                "SAMSUNG_USB_Driver/1.5.59.0".into(),
                "SamFirm/0.3.6".into(),
                "Frija/1.4.2".into(),
                "FOTA-HTTP-Client".into(),
            ],
            accepts: vec![
                "application/xml, text/xml, */*".into(),
                "*/*".into(),
                "application/octet-stream".into(),
                "application/zip".into(),
            ],
            accept_languages: vec![
                "en-US,en;q=0.9".into(),
                "ko-KR,ko;q=0.9,en;q=0.8".into(),
                "en-GB,en;q=0.9".into(),
            ],
            cache_controls: vec!["no-cache".into(), "max-age=0".into()],
            vendor_header_probability: 0.5,
            bearer_probability: 0.5,
        }
    }
}

// ============================================================================
// Race Config
// ============================================================================

/// Full configuration for one race.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceConfig {
    /// Mirror base URLs (scheme + host, no trailing slash).
    pub servers: Vec<String>,
    /// Endpoint paths appended to each server for query-style candidates.
    pub endpoints: Vec<String>,
    /// Query parameter schemes to enumerate.
    pub param_schemes: Vec<ParamScheme>,
    /// Credential schemes to enumerate.
    pub credential_schemes: Vec<CredentialScheme>,
    /// Also generate one direct archive-path candidate per server.
    pub include_direct: bool,
    /// Header option pools.
    pub header_pools: HeaderPools,
    /// Concurrency cap K: maximum simultaneously in-flight attempts.
    pub concurrency: usize,
    /// Per-request timeout in seconds (headers phase and per body chunk).
    pub request_timeout_secs: u64,
    /// Maximum retries per candidate on transient failures.
    pub max_retries: u32,
    /// Backoff base delay in milliseconds.
    pub backoff_base_ms: u64,
    /// Backoff delay cap in milliseconds.
    pub backoff_cap_ms: u64,
    /// Pre-request jitter range in milliseconds (0/0 disables it).
    pub jitter_min_ms: u64,
    /// Upper bound of the pre-request jitter range.
    pub jitter_max_ms: u64,
    /// Global race deadline in seconds, spanning all cycles.
    pub race_deadline_secs: u64,
    /// Grace period for cancelled workers to tear down, in seconds.
    pub grace_period_secs: u64,
    /// Number of race cycles; the candidate list is reshuffled per cycle.
    pub max_cycles: u32,
    /// Delay between cycles, in seconds.
    pub inter_cycle_delay_secs: u64,
    /// Shuffle the candidate queue before each cycle.
    pub shuffle: bool,
    /// A 200 response is accepted when its declared content length exceeds
    /// this many bytes (heuristic; content-type match accepts regardless).
    pub min_accept_bytes: u64,
    /// Content-type substrings that identify a binary/archive body.
    pub binary_content_types: Vec<String>,
    /// Fixed seed for the random source; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            servers: vec![
                "https://neofussvr.sslcs.cdngc.net".into(),
                "https://cloud-neofussvr.sslcs.cdngc.net".into(),
                "https://fota-cloud-dn.ospserver.net".into(),
                "https://fota-secure.samsungdm.com".into(),
                "https://fota-cloud-dn.samsungdm.com".into(),
            ],
            endpoints: vec![
                "/NF_DownloadBinaryForMass.aspx".into(),
                "/NF_DownloadBinaryInform.aspx".into(),
                "/firmware/download.aspx".into(),
                "/download/firmware.aspx".into(),
            ],
            param_schemes: vec![
                ParamScheme::FusQuery,
                ParamScheme::FileQuery,
                ParamScheme::SessionQuery,
            ],
            credential_schemes: vec![
                CredentialScheme::Standard,
                CredentialScheme::Alternative,
                CredentialScheme::Simple,
            ],
            include_direct: true,
            header_pools: HeaderPools::default(),
            concurrency: 5,
            request_timeout_secs: 30,
            max_retries: 3,
            backoff_base_ms: 1_000,
            backoff_cap_ms: 5_000,
            jitter_min_ms: 0,
            jitter_max_ms: 0,
            race_deadline_secs: 300,
            grace_period_secs: 5,
            max_cycles: 1,
            inter_cycle_delay_secs: 10,
            shuffle: true,
            min_accept_bytes: 1_000_000,
            binary_content_types: vec![
                "application/zip".into(),
                "application/octet-stream".into(),
            ],
            seed: None,
        }
    }
}

impl RaceConfig {
    /// Per-request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Global race deadline as a [`Duration`].
    pub fn race_deadline(&self) -> Duration {
        Duration::from_secs(self.race_deadline_secs)
    }

    /// Worker teardown grace period as a [`Duration`].
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    /// Inter-cycle delay as a [`Duration`].
    pub fn inter_cycle_delay(&self) -> Duration {
        Duration::from_secs(self.inter_cycle_delay_secs)
    }

    /// Validates the configuration against a target.
    ///
    /// Runs before any network I/O; a failure here aborts race
    /// construction.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] or [`CoreError::InvalidTarget`]
    /// if any field cannot produce a well-formed race.
    pub fn validate(&self, target: &FirmwareTarget) -> Result<(), CoreError> {
        target.validate()?;

        if self.servers.is_empty() {
            return Err(CoreError::InvalidConfig("server list is empty".into()));
        }
        for server in &self.servers {
            let url = Url::parse(server)
                .map_err(|e| CoreError::InvalidConfig(format!("bad server URL '{server}': {e}")))?;
            if url.host_str().is_none() {
                return Err(CoreError::InvalidConfig(format!(
                    "server URL '{server}' has no host"
                )));
            }
        }
        if self.endpoints.is_empty() && !self.include_direct {
            return Err(CoreError::InvalidConfig(
                "no endpoints and direct paths disabled: nothing to try".into(),
            ));
        }
        for endpoint in &self.endpoints {
            if !endpoint.starts_with('/') {
                return Err(CoreError::InvalidConfig(format!(
                    "endpoint '{endpoint}' must start with '/'"
                )));
            }
        }
        if self.param_schemes.is_empty() && !self.include_direct {
            return Err(CoreError::InvalidConfig("no parameter schemes".into()));
        }
        if self.credential_schemes.is_empty() {
            return Err(CoreError::InvalidConfig("no credential schemes".into()));
        }
        if self.concurrency == 0 {
            return Err(CoreError::InvalidConfig("concurrency cap must be >= 1".into()));
        }
        if self.max_cycles == 0 {
            return Err(CoreError::InvalidConfig("max_cycles must be >= 1".into()));
        }
        if self.backoff_cap_ms < self.backoff_base_ms {
            return Err(CoreError::InvalidConfig(
                "backoff cap is below backoff base".into(),
            ));
        }
        if self.jitter_max_ms < self.jitter_min_ms {
            return Err(CoreError::InvalidConfig(
                "jitter_max_ms is below jitter_min_ms".into(),
            ));
        }
        let pools = &self.header_pools;
        if pools.user_agents.is_empty() || pools.accepts.is_empty() {
            return Err(CoreError::InvalidConfig(
                "header pools must provide at least one user-agent and accept value".into(),
            ));
        }
        for p in [pools.vendor_header_probability, pools.bearer_probability] {
            if !(0.0..=1.0).contains(&p) {
                return Err(CoreError::InvalidConfig(format!(
                    "header inclusion probability {p} outside [0, 1]"
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> FirmwareTarget {
        FirmwareTarget::new("SM-S906B", "EUX", "A/B/C")
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(RaceConfig::default().validate(&target()).is_ok());
    }

    #[test]
    fn test_rejects_empty_servers() {
        let config = RaceConfig {
            servers: vec![],
            ..RaceConfig::default()
        };
        assert!(config.validate(&target()).is_err());
    }

    #[test]
    fn test_rejects_bad_server_url() {
        let config = RaceConfig {
            servers: vec!["not a url".into()],
            ..RaceConfig::default()
        };
        assert!(config.validate(&target()).is_err());
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let config = RaceConfig {
            concurrency: 0,
            ..RaceConfig::default()
        };
        assert!(config.validate(&target()).is_err());
    }

    #[test]
    fn test_rejects_bad_probability() {
        let mut config = RaceConfig::default();
        config.header_pools.bearer_probability = 1.5;
        assert!(config.validate(&target()).is_err());
    }

    #[test]
    fn test_rejects_inverted_backoff_bounds() {
        let config = RaceConfig {
            backoff_base_ms: 5_000,
            backoff_cap_ms: 1_000,
            ..RaceConfig::default()
        };
        assert!(config.validate(&target()).is_err());
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = RaceConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: RaceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.servers, config.servers);
        assert_eq!(back.concurrency, config.concurrency);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let back: RaceConfig = serde_json::from_str(r#"{"concurrency": 2}"#).unwrap();
        assert_eq!(back.concurrency, 2);
        assert_eq!(back.max_retries, RaceConfig::default().max_retries);
    }
}
