//! Unified error types for suggestio.
//!
//! Every fatal failure of the suggestion pipeline maps to one variant here.
//! `CacheIo` is the exception: the cache layer logs it and carries on.

/// Unified error types for the suggestion pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty search id).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Search configuration is unknown, unreadable or corrupt.
    #[error("CONFIG_ERROR: {0}")]
    ConfigLoad(String),

    /// Suggest URL cannot be requested.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Network-level failure (DNS, connect, TLS, reset).
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Server answered with a non-success status.
    #[error("HTTP_ERROR: {0}")]
    HttpStatus(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// Response body cannot be decompressed.
    #[error("DECODE_ERROR: {0}")]
    Decode(String),

    /// Path expression does not compile.
    #[error("BAD_PATH: {0}")]
    BadPath(String),

    /// Response body is not JSON at all.
    #[error("INVALID_JSON: {0}")]
    InvalidJson(String),

    /// Path expression does not fit the shape of the response.
    #[error("PATH_EVAL_ERROR: {0}")]
    PathEval(String),

    /// A matched value is not a JSON string.
    #[error("EXTRACT_ERROR: {0}")]
    Extract(String),

    /// Cache store read or write failed.
    #[error("CACHE_ERROR: {0}")]
    CacheIo(String),

    /// Operation deadline expired.
    #[error("CANCELLED: {0}")]
    Cancelled(String),
}

impl Error {
    /// True for every variant of the fetch family.
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidUrl(_)
                | Error::Network(_)
                | Error::HttpStatus(_)
                | Error::FetchTimeout(_)
                | Error::FetchTooLarge(_)
        )
    }

    /// Stable short code, the prefix of the display string.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::ConfigLoad(_) => "CONFIG_ERROR",
            Error::InvalidUrl(_) => "INVALID_URL",
            Error::Network(_) => "NETWORK_ERROR",
            Error::HttpStatus(_) => "HTTP_ERROR",
            Error::FetchTimeout(_) => "FETCH_TIMEOUT",
            Error::FetchTooLarge(_) => "FETCH_TOO_LARGE",
            Error::Decode(_) => "DECODE_ERROR",
            Error::BadPath(_) => "BAD_PATH",
            Error::InvalidJson(_) => "INVALID_JSON",
            Error::PathEval(_) => "PATH_EVAL_ERROR",
            Error::Extract(_) => "EXTRACT_ERROR",
            Error::CacheIo(_) => "CACHE_ERROR",
            Error::Cancelled(_) => "CANCELLED",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::CacheIo(err.to_string())
    }
}
