//! Checks applied to a loaded `AppConfig`.

use std::ops::RangeInclusive;

use crate::config::AppConfig;
use thiserror::Error;

const HTTP_TIMEOUT_SECS: RangeInclusive<u64> = 1..=300;
const MAX_BYTES: RangeInclusive<usize> = 1..=50 * 1024 * 1024;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

fn missing(field: &str) -> ConfigError {
    ConfigError::Missing { field: field.into(), hint: format!("set SUGGESTIO_{}", field.to_uppercase()) }
}

impl AppConfig {
    /// Reject settings the pipeline cannot run with.
    ///
    /// The cache and searches directories must not nest: purging the cache
    /// removes `.json` files it cannot read as cache entries.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.searches_dir.as_os_str().is_empty() {
            return Err(missing("searches_dir"));
        }
        if self.cache_dir.as_os_str().is_empty() {
            return Err(missing("cache_dir"));
        }
        if self.searches_dir.starts_with(&self.cache_dir) || self.cache_dir.starts_with(&self.searches_dir) {
            return Err(invalid("cache_dir", "must not contain or lie inside searches_dir"));
        }

        if self.max_age_secs == 0 {
            return Err(invalid("max_age_secs", "must be greater than 0"));
        }
        if !HTTP_TIMEOUT_SECS.contains(&self.http_timeout_secs) {
            return Err(invalid(
                "http_timeout_secs",
                format!("{} not in {}..={}", self.http_timeout_secs, HTTP_TIMEOUT_SECS.start(), HTTP_TIMEOUT_SECS.end()),
            ));
        }
        if !MAX_BYTES.contains(&self.max_bytes) {
            return Err(invalid("max_bytes", format!("{} not in 1 byte..=50MB", self.max_bytes)));
        }
        if self.user_agent.trim().is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        Ok(())
    }
}
