//! Response validation.
//!
//! A success status alone is not trustworthy: the mirrors serve HTML error
//! pages with 200 statuses. Validation is a pure function of response
//! metadata; body bytes are never touched beyond the declared
//! content-length and content-type.

use firmrace_core::{RaceConfig, RejectReason};

// ============================================================================
// Verdict
// ============================================================================

/// Classification of a received response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The body looks like the expected artifact; stream it.
    Accept,
    /// Follow this redirect location once, then re-classify.
    FollowRedirect(String),
    /// Transient failure; retry the same candidate after backoff.
    RetryLater(String),
    /// Structural failure; drop the candidate without retrying.
    Reject(RejectReason),
}

// ============================================================================
// Validation Policy
// ============================================================================

/// Metadata thresholds for accepting a 200 response.
#[derive(Debug, Clone)]
pub struct ValidationPolicy {
    /// Accept when the declared content length exceeds this many bytes.
    pub min_accept_bytes: u64,
    /// Content-type substrings that identify a binary/archive body.
    pub binary_content_types: Vec<String>,
}

impl ValidationPolicy {
    /// Builds the policy from a race configuration.
    pub fn from_config(config: &RaceConfig) -> Self {
        Self {
            min_accept_bytes: config.min_accept_bytes,
            binary_content_types: config.binary_content_types.clone(),
        }
    }

    /// Classifies a response, redirects included.
    ///
    /// Rules in priority order:
    /// 1. 301/302/307/308 with a location → [`Verdict::FollowRedirect`].
    /// 2. 200 with a binary content-type, or a declared length above the
    ///    threshold → [`Verdict::Accept`]. A type match suffices alone; an
    ///    absent or zero length never does.
    /// 3. 200 otherwise → wrong content.
    /// 4. Any other status → structural reject. Transient classification
    ///    is reserved for network-level failures, which never reach here.
    pub fn verdict(
        &self,
        status: u16,
        content_type: Option<&str>,
        content_length: Option<u64>,
        location: Option<&str>,
    ) -> Verdict {
        if matches!(status, 301 | 302 | 307 | 308) {
            if let Some(location) = location {
                return Verdict::FollowRedirect(location.to_string());
            }
        }
        self.verdict_no_redirect(status, content_type, content_length)
    }

    /// Classifies a response without redirect handling (rules 2-4 only).
    ///
    /// Used for the single post-redirect response, bounding redirect depth
    /// to one.
    pub fn verdict_no_redirect(
        &self,
        status: u16,
        content_type: Option<&str>,
        content_length: Option<u64>,
    ) -> Verdict {
        if status == 200 {
            if self.is_binary_type(content_type) {
                return Verdict::Accept;
            }
            if content_length.is_some_and(|len| len > self.min_accept_bytes) {
                return Verdict::Accept;
            }
            return Verdict::Reject(RejectReason::WrongContent);
        }
        Verdict::Reject(RejectReason::Status(status))
    }

    fn is_binary_type(&self, content_type: Option<&str>) -> bool {
        let Some(content_type) = content_type else {
            return false;
        };
        let lowered = content_type.to_ascii_lowercase();
        self.binary_content_types
            .iter()
            .any(|t| lowered.contains(t.as_str()))
    }
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self::from_config(&RaceConfig::default())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_large_zip_accepted() {
        let policy = ValidationPolicy::default();
        assert_eq!(
            policy.verdict(200, Some("application/zip"), Some(5_000_000), None),
            Verdict::Accept
        );
    }

    #[test]
    fn test_small_html_rejected_as_wrong_content() {
        let policy = ValidationPolicy::default();
        assert_eq!(
            policy.verdict(200, Some("text/html"), Some(512), None),
            Verdict::Reject(RejectReason::WrongContent)
        );
    }

    #[test]
    fn test_forbidden_rejected_by_status() {
        let policy = ValidationPolicy::default();
        assert_eq!(
            policy.verdict(403, None, None, None),
            Verdict::Reject(RejectReason::Status(403))
        );
        assert_eq!(
            policy.verdict(404, Some("text/html"), Some(9_000_000), None),
            Verdict::Reject(RejectReason::Status(404))
        );
    }

    #[test]
    fn test_type_match_suffices_despite_zero_length() {
        let policy = ValidationPolicy::default();
        assert_eq!(
            policy.verdict(200, Some("application/octet-stream"), Some(0), None),
            Verdict::Accept
        );
    }

    #[test]
    fn test_length_alone_must_exceed_threshold() {
        let policy = ValidationPolicy::default();
        // Exactly at the threshold is not enough.
        assert_eq!(
            policy.verdict(200, Some("text/plain"), Some(1_000_000), None),
            Verdict::Reject(RejectReason::WrongContent)
        );
        assert_eq!(
            policy.verdict(200, None, Some(1_000_001), None),
            Verdict::Accept
        );
        // Absent length never accepts alone.
        assert_eq!(
            policy.verdict(200, Some("text/plain"), None, None),
            Verdict::Reject(RejectReason::WrongContent)
        );
    }

    #[test]
    fn test_redirect_with_location() {
        let policy = ValidationPolicy::default();
        for status in [301, 302, 307, 308] {
            assert_eq!(
                policy.verdict(status, None, None, Some("https://cdn.example/f.zip")),
                Verdict::FollowRedirect("https://cdn.example/f.zip".to_string())
            );
        }
    }

    #[test]
    fn test_redirect_without_location_rejected() {
        let policy = ValidationPolicy::default();
        assert_eq!(
            policy.verdict(302, None, None, None),
            Verdict::Reject(RejectReason::Status(302))
        );
    }

    #[test]
    fn test_post_redirect_ignores_further_redirects() {
        let policy = ValidationPolicy::default();
        assert_eq!(
            policy.verdict_no_redirect(302, None, None),
            Verdict::Reject(RejectReason::Status(302))
        );
    }

    #[test]
    fn test_content_type_match_is_case_insensitive() {
        let policy = ValidationPolicy::default();
        assert_eq!(
            policy.verdict(200, Some("Application/ZIP"), Some(10), None),
            Verdict::Accept
        );
    }
}
