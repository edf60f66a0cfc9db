//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SUGGESTIO_*)
//! 2. TOML config file (if SUGGESTIO_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Deserializer, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SUGGESTIO_*)
/// 2. TOML config file (if SUGGESTIO_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding one `<uid>.json` file per search.
    ///
    /// Set via SUGGESTIO_SEARCHES_DIR environment variable.
    #[serde(default = "default_searches_dir")]
    pub searches_dir: PathBuf,

    /// Root of the suggestion cache.
    ///
    /// Set via SUGGESTIO_CACHE_DIR environment variable.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Seconds a cached suggestion list stays fresh.
    ///
    /// Set via SUGGESTIO_MAX_AGE_SECS environment variable.
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,

    /// Connection and keep-alive ceiling for HTTP requests, in seconds.
    ///
    /// Set via SUGGESTIO_HTTP_TIMEOUT_SECS environment variable.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via SUGGESTIO_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via SUGGESTIO_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Also list the literal query among the results.
    ///
    /// Set via SUGGESTIO_SHOW_QUERY_IN_RESULTS environment variable.
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub show_query_in_results: bool,

    /// Let the launcher sort results; when false, item uids are left out.
    ///
    /// Set via SUGGESTIO_SORT_RESULTS environment variable.
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub sort_results: bool,
}

fn default_searches_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("suggestio")
        .join("searches")
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("suggestio"))
        .unwrap_or_else(|| PathBuf::from("suggestio-cache"))
}

fn default_max_age_secs() -> u64 {
    900
}

fn default_http_timeout_secs() -> u64 {
    60
}

fn default_user_agent() -> String {
    concat!("suggestio/", env!("CARGO_PKG_VERSION")).into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            searches_dir: default_searches_dir(),
            cache_dir: default_cache_dir(),
            max_age_secs: default_max_age_secs(),
            http_timeout_secs: default_http_timeout_secs(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            show_query_in_results: false,
            sort_results: false,
        }
    }
}

impl AppConfig {
    /// Cache freshness window as Duration.
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    /// HTTP connection ceiling as Duration for use with reqwest.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SUGGESTIO_`
    /// 2. TOML file from `SUGGESTIO_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SUGGESTIO_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SUGGESTIO_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into()),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

/// Boolean flag as written in environment variables.
#[derive(Deserialize)]
#[serde(untagged)]
enum FlagRepr {
    Bool(bool),
    Int(i64),
    Text(String),
}

/// Read a flag that may be spelled `true/false`, `1/0` or `yes/no`.
///
/// Empty means false. Anything else is logged and read as false.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match FlagRepr::deserialize(deserializer)? {
        FlagRepr::Bool(b) => b,
        FlagRepr::Int(i) => i != 0,
        FlagRepr::Text(s) => parse_flag(&s),
    })
}

pub(crate) fn parse_flag(s: &str) -> bool {
    match s.trim().to_lowercase().as_str() {
        "" | "0" | "no" | "false" => false,
        "1" | "yes" | "true" => true,
        other => {
            tracing::warn!(value = other, "don't understand flag value, reading it as false");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.max_age_secs, 900);
        assert_eq!(config.http_timeout_secs, 60);
        assert_eq!(config.max_bytes, 5_242_880);
        assert!(config.user_agent.starts_with("suggestio/"));
        assert!(config.searches_dir.ends_with("suggestio/searches"));
        assert!(config.cache_dir.ends_with("suggestio"));
        assert!(!config.show_query_in_results);
        assert!(!config.sort_results);
    }

    #[test]
    fn test_durations() {
        let config = AppConfig::default();
        assert_eq!(config.max_age(), Duration::from_secs(900));
        assert_eq!(config.http_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("1"));
        assert!(parse_flag("YES"));
        assert!(parse_flag(" true "));
        assert!(!parse_flag(""));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("No"));
        assert!(!parse_flag("maybe"));
    }

    #[test]
    fn test_load_from_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("SUGGESTIO_MAX_AGE_SECS", "60");
            jail.set_env("SUGGESTIO_SHOW_QUERY_IN_RESULTS", "yes");
            jail.set_env("SUGGESTIO_SORT_RESULTS", "1");
            jail.set_env("SUGGESTIO_CACHE_DIR", "/tmp/suggestio-test");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.max_age_secs, 60);
            assert!(config.show_query_in_results);
            assert!(config.sort_results);
            assert_eq!(config.cache_dir, PathBuf::from("/tmp/suggestio-test"));
            Ok(())
        });
    }

    #[test]
    fn test_load_from_toml_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("suggestio.toml", "max_age_secs = 120\nuser_agent = \"custom/1.0\"\n")?;
            jail.set_env("SUGGESTIO_CONFIG_FILE", "suggestio.toml");
            jail.set_env("SUGGESTIO_USER_AGENT", "env/2.0");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.max_age_secs, 120);
            assert_eq!(config.user_agent, "env/2.0");
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("SUGGESTIO_MAX_AGE_SECS", "0");
            assert!(matches!(AppConfig::load(), Err(ConfigError::Invalid { .. })));
            Ok(())
        });
    }
}
