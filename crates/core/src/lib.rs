//! Core types and shared functionality for suggestio.
//!
//! This crate provides:
//! - Search configurations and URL templates
//! - File-backed suggestion cache with TTL
//! - Result assembly for the launcher feed
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod results;
pub mod search;
pub mod template;

pub use cache::{CacheKey, FileCache, Lookup, cache_key};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use results::{AssembleOptions, Feed, ResultRecord, assemble};
pub use search::SearchConfig;
pub use template::{Escaping, env_resolver};
