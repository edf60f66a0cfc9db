//! Content-addressed cache key generation.

use std::fmt;
use std::path::PathBuf;

use sha2::{Digest, Sha256};

/// Number of digest bytes kept in a key (128 bits).
const DIGEST_BYTES: usize = 16;

/// Directory under the cache root holding every entry.
pub(crate) const ENTRIES_DIR: &str = "searches";

/// Directory levels between `ENTRIES_DIR` and an entry file: uid, then two digest shards.
pub(crate) const ENTRY_DEPTH: usize = 3;

/// Cache key for one (search uid, query) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    uid: String,
    digest: String,
}

/// Compute the cache key for `query` on search `uid`.
///
/// The query is hashed with SHA-256 and truncated to 128 bits, hex encoded.
pub fn cache_key(uid: &str, query: &str) -> CacheKey {
    let hash = Sha256::digest(query.as_bytes());
    CacheKey { uid: uid.to_string(), digest: hex::encode(&hash[..DIGEST_BYTES]) }
}

/// True if `name` is an entry file name: the hex digest plus `.json`.
pub(crate) fn is_entry_file_name(name: &str) -> bool {
    name.strip_suffix(".json")
        .is_some_and(|stem| stem.len() == DIGEST_BYTES * 2 && stem.bytes().all(|b| b.is_ascii_hexdigit()))
}

impl CacheKey {
    /// Search uid part of the key.
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Hex digest of the query.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Path of the entry relative to the cache root.
    ///
    /// The digest is split into two levels of two-character directories to
    /// bound the fan-out: `searches/<uid>/ab/cd/abcd....json`.
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(ENTRIES_DIR)
            .join(&self.uid)
            .join(&self.digest[..2])
            .join(&self.digest[2..4])
            .join(format!("{}.json", self.digest))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.uid, self.digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_file_names() {
        let key = cache_key("google-en", "rust");
        let path = key.relative_path();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(is_entry_file_name(name));
        assert_eq!(path.components().count(), ENTRY_DEPTH + 2);
        assert!(!is_entry_file_name("google-en.json"));
        assert!(!is_entry_file_name(&format!("{}.tmp", key.digest())));
    }

    #[test]
    fn test_key_stability() {
        let key1 = cache_key("google-en", "rust");
        let key2 = cache_key("google-en", "rust");
        assert_eq!(key1, key2);
        assert_eq!(key1.relative_path(), key2.relative_path());
    }

    #[test]
    fn test_key_different_query() {
        assert_ne!(cache_key("google-en", "rust"), cache_key("google-en", "Rust"));
    }

    #[test]
    fn test_key_different_uid() {
        let a = cache_key("google-en", "rust");
        let b = cache_key("google-de", "rust");
        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.relative_path(), b.relative_path());
    }

    #[test]
    fn test_digest_format() {
        let key = cache_key("google-en", "");
        assert_eq!(key.digest().len(), 32);
        assert!(key.digest().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_relative_path_layout() {
        let key = cache_key("wikipedia-en", "cat");
        let d = key.digest();
        let expected = PathBuf::from(format!("searches/wikipedia-en/{}/{}/{}.json", &d[..2], &d[2..4], d));
        assert_eq!(key.relative_path(), expected);
        assert_eq!(key.to_string(), format!("wikipedia-en/{d}"));
    }
}
