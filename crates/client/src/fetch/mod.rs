//! HTTP fetch of suggestion endpoints.
//!
//! ### Timeouts
//! - Connection establishment and TCP keep-alive: 60s (configurable)
//! - TLS handshake: 30s, on top of the connect ceiling
//! - Response headers: 30s after the connection is up
//! - Response body: 10s
//!
//! ### Request Headers
//! - Identifying `User-Agent`
//! - `Accept`, `Accept-Language`
//! - `Accept-Encoding: gzip, deflate`; the body is returned still encoded
//!   and decoded by [`crate::decode`]
//!
//! ### Failures
//! - Any status >= 300 is an error carrying the status line
//! - No retries: the launcher asks again on the next keystroke

pub mod url;

use bytes::Bytes;
use reqwest::Url;
use reqwest::{Client, StatusCode, header};
use std::time::{Duration, Instant};

pub use url::{UrlError, parse_fetch_url};

use suggestio_core::{AppConfig, Error};

/// `Accept` header sent with every request.
pub const ACCEPT: &str = "application/json, text/plain, */*";

/// `Accept-Language` header sent with every request.
pub const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// `Accept-Encoding` header sent with every request.
pub const ACCEPT_ENCODING: &str = "gzip, deflate";

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "suggestio/<version>")
    pub user_agent: String,

    /// Connection establishment timeout, also the keep-alive interval (default: 60s)
    pub connect_timeout: Duration,

    /// TLS handshake timeout (default: 30s)
    pub tls_handshake_timeout: Duration,

    /// Time allowed for response headers once connected (default: 30s)
    pub response_header_timeout: Duration,

    /// Time allowed to read the response body (default: 10s)
    pub body_timeout: Duration,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("suggestio/", env!("CARGO_PKG_VERSION")).to_string(),
            connect_timeout: Duration::from_secs(60),
            tls_handshake_timeout: Duration::from_secs(30),
            response_header_timeout: Duration::from_secs(30),
            body_timeout: Duration::from_secs(10),
            max_bytes: 5 * 1024 * 1024,
            max_redirects: 5,
        }
    }
}

impl FetchConfig {
    /// Fetch settings derived from the application configuration.
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            connect_timeout: config.http_timeout(),
            max_bytes: config.max_bytes,
            ..Default::default()
        }
    }

    /// Bound on the whole exchange up to the response headers.
    fn headers_deadline(&self) -> Duration {
        self.connect_timeout + self.tls_handshake_timeout + self.response_header_timeout
    }
}

/// Response from a fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The URL requested
    pub url: Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Content-Encoding header
    pub content_encoding: Option<String>,
    /// Content-Type header
    pub content_type: Option<String>,
    /// Response body bytes, still content-encoded
    pub bytes: Bytes,
    /// Response headers
    pub headers: header::HeaderMap,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

/// HTTP client for suggestion endpoints.
#[derive(Debug, Clone)]
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static(ACCEPT));
        headers.insert(header::ACCEPT_LANGUAGE, header::HeaderValue::from_static(ACCEPT_LANGUAGE));
        headers.insert(header::ACCEPT_ENCODING, header::HeaderValue::from_static(ACCEPT_ENCODING));

        let http = Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .connect_timeout(config.connect_timeout + config.tls_handshake_timeout)
            .tcp_keepalive(config.connect_timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .no_gzip()
            .no_brotli()
            .no_deflate()
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Fetch a URL, returning the raw body and metadata.
    ///
    /// Statuses >= 300 are returned as `Error::HttpStatus`.
    pub async fn fetch(&self, url_str: &str) -> Result<FetchResponse, Error> {
        let start = Instant::now();
        let url = parse_fetch_url(url_str).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        tracing::debug!("fetching {}", url);

        let response = tokio::time::timeout(self.config.headers_deadline(), self.http.get(url.as_str()).send())
            .await
            .map_err(|_| {
                Error::FetchTimeout(format!("no response headers within {:?}", self.config.headers_deadline()))
            })?
            .map_err(request_error)?;

        let status = response.status();
        tracing::debug!("[{}] {}", status.as_u16(), url);

        if status.as_u16() >= 300 {
            return Err(Error::HttpStatus(status.to_string()));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let headers = response.headers().clone();

        let bytes = tokio::time::timeout(self.config.body_timeout, response.bytes())
            .await
            .map_err(|_| Error::FetchTimeout(format!("body not read within {:?}", self.config.body_timeout)))?
            .map_err(|e| Error::Network(format!("failed to read response: {}", e)))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        let content_type = header_str(&headers, header::CONTENT_TYPE);
        let content_encoding = header_str(&headers, header::CONTENT_ENCODING);

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!("fetched {} in {}ms ({} bytes)", url, fetch_ms, bytes.len());

        Ok(FetchResponse { url, status, content_encoding, content_type, bytes, headers, fetch_ms })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

fn header_str(headers: &header::HeaderMap, name: header::HeaderName) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(|s| s.to_string())
}

fn request_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::FetchTimeout(err.to_string())
    } else {
        Error::Network(format!("network error: {}", err))
    }
}
