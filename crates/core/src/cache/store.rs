//! Cache store operations.
//!
//! Entries are JSON envelopes `{"written_at": ..., "value": ...}` stored at
//! the key's relative path under the cache root.

use std::collections::HashMap;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::hash::{CacheKey, ENTRIES_DIR, ENTRY_DEPTH, is_entry_file_name};
use crate::Error;

/// Prefix of temp files written next to entries before the rename.
const TEMP_PREFIX: &str = ".suggestio-";

/// Result of reading an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    /// Present and younger than the TTL.
    Fresh(T),
    /// Present but at least TTL old.
    Stale,
    /// Not present.
    Absent,
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    written_at: DateTime<Utc>,
    value: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    written_at: DateTime<Utc>,
    value: T,
}

#[derive(Deserialize)]
struct EnvelopeHeader {
    written_at: DateTime<Utc>,
}

/// Cache rooted at a directory shared between processes.
#[derive(Clone, Debug)]
pub struct FileCache {
    root: PathBuf,
    inflight: Arc<Mutex<HashMap<CacheKey, Arc<tokio::sync::Mutex<()>>>>>,
}

impl FileCache {
    /// Open a cache rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, Error> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| Error::CacheIo(format!("cannot create cache dir {}: {e}", root.display())))?;

        Ok(Self { root, inflight: Arc::new(Mutex::new(HashMap::new())) })
    }

    /// Cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of the entry for `key`.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.relative_path())
    }

    /// Read the entry for `key` and classify it against `ttl`.
    ///
    /// An entry whose age is greater than or equal to `ttl` is `Stale`.
    pub async fn lookup<T: DeserializeOwned>(&self, key: &CacheKey, ttl: Duration) -> Result<Lookup<T>, Error> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Lookup::Absent),
            Err(e) => return Err(Error::CacheIo(format!("cannot read {}: {e}", path.display()))),
        };

        let envelope: Envelope<T> = serde_json::from_slice(&bytes)
            .map_err(|e| Error::CacheIo(format!("corrupt entry {}: {e}", path.display())))?;

        if age_of(envelope.written_at) < ttl { Ok(Lookup::Fresh(envelope.value)) } else { Ok(Lookup::Stale) }
    }

    /// Write `value` for `key`, stamped with the current time.
    pub async fn store<T: Serialize>(&self, key: &CacheKey, value: &T) -> Result<(), Error> {
        self.store_at(key, value, Utc::now()).await
    }

    /// Write `value` for `key` with an explicit `written_at` stamp.
    ///
    /// The entry replaces any previous one atomically: readers see either the
    /// old or the new file, never a partial write.
    pub async fn store_at<T: Serialize>(
        &self, key: &CacheKey, value: &T, written_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        let bytes = serde_json::to_vec(&EnvelopeRef { written_at, value })
            .map_err(|e| Error::CacheIo(format!("cannot serialize entry {key}: {e}")))?;
        let path = self.path_for(key);

        tokio::task::spawn_blocking(move || {
            write_atomic(&path, &bytes).map_err(|e| Error::CacheIo(format!("cannot write {}: {e}", path.display())))
        })
        .await
        .map_err(|e| Error::CacheIo(format!("cache writer failed: {e}")))?
    }

    /// Return the fresh entry for `key`, or compute, store and return a new one.
    ///
    /// Read failures count as a miss and write failures are logged; neither
    /// fails the call. A failing `compute` leaves the stored entry untouched
    /// and its error is returned.
    pub async fn get_or_compute<T, F, Fut>(&self, key: &CacheKey, ttl: Duration, compute: F) -> Result<T, Error>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;

        match self.lookup::<T>(key, ttl).await {
            Ok(Lookup::Fresh(value)) => {
                tracing::debug!(%key, "cache hit");
                return Ok(value);
            }
            Ok(Lookup::Stale) => tracing::debug!(%key, "cache entry expired"),
            Ok(Lookup::Absent) => tracing::debug!(%key, "cache miss"),
            Err(e) => tracing::warn!(%key, error = %e, "cache read failed, treating as miss"),
        }

        let value = compute().await?;

        if let Err(e) = self.store(key, &value).await {
            tracing::warn!(%key, error = %e, "cache write failed");
        }

        Ok(value)
    }

    /// Delete entries at least `ttl` old, corrupt entries, and abandoned temp files.
    ///
    /// Only files at entry positions (`searches/<uid>/xx/yy/`) are
    /// considered; anything else under the root is left alone.
    /// Returns the number of deleted files.
    pub async fn purge_expired(&self, ttl: Duration) -> Result<u64, Error> {
        let entries = self.root.join(ENTRIES_DIR);
        tokio::task::spawn_blocking(move || purge_dir(&entries, 0, ttl))
            .await
            .map_err(|e| Error::CacheIo(format!("cache purge failed: {e}")))?
    }

    fn key_lock(&self, key: &CacheKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut inflight = self.inflight.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        inflight.entry(key.clone()).or_default().clone()
    }
}

/// Age of an entry; timestamps in the future count as brand new.
fn age_of(written_at: DateTime<Utc>) -> Duration {
    Utc::now().signed_duration_since(written_at).to_std().unwrap_or(Duration::ZERO)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "entry path has no parent"))?;
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::Builder::new().prefix(TEMP_PREFIX).suffix(".tmp").tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn purge_dir(dir: &Path, depth: usize, ttl: Duration) -> Result<u64, Error> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(Error::CacheIo(format!("cannot list {}: {e}", dir.display()))),
    };

    let mut deleted = 0;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            if depth < ENTRY_DEPTH {
                deleted += purge_dir(&path, depth + 1, ttl)?;
            }
            continue;
        }
        if depth != ENTRY_DEPTH || !file_type.is_file() {
            continue;
        }

        let name = entry.file_name();
        let name = name.to_string_lossy();
        let expired = if name.starts_with(TEMP_PREFIX) {
            let modified = entry.metadata()?.modified()?;
            SystemTime::now().duration_since(modified).unwrap_or(Duration::ZERO) >= ttl
        } else if is_entry_file_name(&name) {
            match std::fs::read(&path).ok().and_then(|b| serde_json::from_slice::<EnvelopeHeader>(&b).ok()) {
                Some(header) => age_of(header.written_at) >= ttl,
                None => true,
            }
        } else {
            false
        };

        if expired {
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    tracing::debug!("purged {}", path.display());
                    deleted += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::CacheIo(format!("cannot delete {}: {e}", path.display()))),
            }
        }
    }

    Ok(deleted)
}
