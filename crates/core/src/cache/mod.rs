//! File-backed cache for suggestion lists.
//!
//! This module provides a persistent, content-addressed cache stored as
//! JSON files under a cache root. It supports:
//!
//! - Keys derived from the search uid and a digest of the query
//! - Freshness checks against a caller-supplied TTL
//! - Atomic writes (temp file, fsync, rename) safe across processes
//! - Per-key deduplication of concurrent refreshes within a process
//! - Purging of expired entries

pub mod hash;
pub mod store;

pub use crate::Error;

pub use hash::{CacheKey, cache_key};
pub use store::{FileCache, Lookup};
