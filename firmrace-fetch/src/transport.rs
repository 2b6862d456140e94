//! The transport seam and its HTTP implementation.
//!
//! The engine talks to the network through [`Transport`] only, so tests can
//! script responses without sockets. [`HttpTransport`] is the production
//! implementation over reqwest. Redirects are disabled at the client level;
//! the fetcher follows at most one redirect itself.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::redirect::Policy;
use reqwest::{Client, header};
use tracing::debug;

use crate::error::{FetchError, TransportError};

/// Default connect timeout.
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Fallback user agent; per-attempt synthesis normally overrides it.
const USER_AGENT: &str = concat!("firmrace/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Request / Response
// ============================================================================

/// A single outbound request.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// Fully built URL, query included.
    pub url: String,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// Timeout for the headers phase of the exchange.
    pub timeout: Duration,
}

/// Streaming body: chunks or a transport failure mid-read.
pub type BodyStream = BoxStream<'static, Result<Vec<u8>, TransportError>>;

/// Response metadata plus the streaming body.
///
/// Only the metadata validation needs is surfaced; everything else about
/// the response stays inside the transport.
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Lowercased `content-type`, if present.
    pub content_type: Option<String>,
    /// Declared `content-length`, if present.
    pub content_length: Option<u64>,
    /// `location` header, if present.
    pub location: Option<String>,
    /// The body stream. Dropping it aborts the transfer.
    pub body: BodyStream,
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Transport Trait
// ============================================================================

/// Sends one request and returns the response with a streaming body.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request`, resolving once response headers are available.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

// ============================================================================
// HTTP Transport
// ============================================================================

/// Production transport over reqwest.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    inner: Client,
}

impl HttpTransport {
    /// Creates the HTTP transport.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the client cannot be built, which
    /// indicates a broken TLS configuration.
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .redirect(Policy::none())
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self { inner: client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        debug!(url = %request.url, "GET request");

        let mut builder = self.inner.get(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        // The per-request timeout covers the headers phase only; body
        // chunks get their own timeout in the fetcher, since a full
        // archive transfer legitimately outlives any single request
        // timeout.
        let response = tokio::time::timeout(request.timeout, builder.send())
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(TransportError::from)?;

        let status = response.status().as_u16();
        let content_type = header_str(response.headers(), header::CONTENT_TYPE)
            .map(|v| v.to_ascii_lowercase());
        let content_length = response.content_length();
        let location = header_str(response.headers(), header::LOCATION);

        debug!(status, ?content_type, ?content_length, "Response received");

        let body = response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(TransportError::from)
            })
            .boxed();

        Ok(TransportResponse {
            status,
            content_type,
            content_length,
            location,
            body,
        })
    }
}

fn header_str(headers: &header::HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}
