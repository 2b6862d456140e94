//! Candidate generation and per-attempt URL construction.
//!
//! Generation is pure: no I/O, no randomness, deterministic for a fixed
//! target and configuration, and the result is a materialized list the
//! scheduler can shuffle and re-iterate per cycle. Time-varying credential
//! fields are deliberately absent from candidates; they are filled in by
//! [`build_url`] on every send so candidate identity stays stable.

use std::collections::HashSet;

use url::Url;

use firmrace_core::{Candidate, CoreError, FirmwareTarget, ParamScheme, RaceConfig};

use crate::credential::Credential;
use crate::error::FetchError;

// ============================================================================
// Generation
// ============================================================================

/// Generates the ordered candidate list for a target.
///
/// Enumerates credential schemes × servers × endpoint paths × query
/// parameter schemes, then one direct archive-path candidate per server
/// when enabled. Duplicate identities are never emitted.
///
/// # Errors
///
/// Returns [`CoreError`] if the target or configuration is malformed;
/// this is checked before any candidate is produced.
pub fn generate(target: &FirmwareTarget, config: &RaceConfig) -> Result<Vec<Candidate>, CoreError> {
    config.validate(target)?;
    let archive = target.archive_name()?;

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for &credential_scheme in &config.credential_schemes {
        for server in &config.servers {
            for endpoint_path in &config.endpoints {
                for &param_scheme in &config.param_schemes {
                    if param_scheme == ParamScheme::DirectPath {
                        // Direct paths are enumerated separately, once per server.
                        continue;
                    }
                    let endpoint = format!("{server}{endpoint_path}");
                    let label = format!(
                        "{credential_scheme} {param_scheme} {}",
                        host_label(server)
                    );
                    push_unique(
                        &mut candidates,
                        &mut seen,
                        Candidate {
                            endpoint,
                            param_scheme,
                            credential_scheme,
                            label,
                        },
                    );
                }
            }
        }
    }

    if config.include_direct {
        let credential_scheme = config.credential_schemes[0];
        for server in &config.servers {
            let endpoint = format!(
                "{server}/firmware/{}/{}/{archive}",
                target.region, target.model
            );
            let label = format!("direct {}", host_label(server));
            push_unique(
                &mut candidates,
                &mut seen,
                Candidate {
                    endpoint,
                    param_scheme: ParamScheme::DirectPath,
                    credential_scheme,
                    label,
                },
            );
        }
    }

    Ok(candidates)
}

fn push_unique(
    candidates: &mut Vec<Candidate>,
    seen: &mut HashSet<(String, ParamScheme, firmrace_core::CredentialScheme)>,
    candidate: Candidate,
) {
    let (endpoint, param_scheme, credential_scheme) = candidate.identity();
    let key = (endpoint.to_owned(), param_scheme, credential_scheme);
    if seen.insert(key) {
        candidates.push(candidate);
    }
}

/// Short mirror label for reporting: the first DNS label of the host.
fn host_label(server: &str) -> String {
    Url::parse(server)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .map_or_else(
            || server.to_string(),
            |host| host.split('.').next().unwrap_or(&host).to_string(),
        )
}

// ============================================================================
// URL Construction
// ============================================================================

/// Builds the concrete request URL for one send of a candidate.
///
/// # Errors
///
/// Returns [`FetchError`] if the endpoint is not a valid URL or the target
/// version code cannot be split. Both are normally caught by
/// [`generate`]'s up-front validation.
pub fn build_url(
    candidate: &Candidate,
    target: &FirmwareTarget,
    credential: &Credential,
) -> Result<Url, FetchError> {
    let mut url = Url::parse(&candidate.endpoint)
        .map_err(|e| FetchError::Core(CoreError::InvalidConfig(e.to_string())))?;

    match candidate.param_scheme {
        ParamScheme::FusQuery => {
            let parts = target.version_parts()?;
            url.query_pairs_mut()
                .append_pair("device", &target.model)
                .append_pair("region", &target.region)
                .append_pair("pda", &parts.pda)
                .append_pair("csc", &parts.csc)
                .append_pair("cp", &parts.cp)
                .append_pair("binary_nature", "1")
                .append_pair("device_type", "phone")
                .append_pair("auth_token", &credential.token)
                .append_pair("timestamp", &credential.timestamp);
        }
        ParamScheme::FileQuery => {
            let archive = target.archive_name()?;
            url.query_pairs_mut()
                .append_pair("file", &archive)
                .append_pair("auth", &credential.signature)
                .append_pair("ts", &credential.timestamp)
                .append_pair("model", &target.model)
                .append_pair("region", &target.region);
        }
        ParamScheme::SessionQuery => {
            url.query_pairs_mut()
                .append_pair("device", &target.model)
                .append_pair("region", &target.region)
                .append_pair("version", &target.version)
                .append_pair("session", &credential.token)
                .append_pair("binary_nature", "1");
        }
        ParamScheme::DirectPath => {}
    }

    Ok(url)
}

// ============================================================================
// Tests
// ============================================================================
