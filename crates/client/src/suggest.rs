//! Cached suggestion lookup: fetch, decode and extract behind the file cache.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use suggestio_core::{Error, FileCache, SearchConfig, cache_key, env_resolver};

use crate::decode;
use crate::extract::extract;
use crate::fetch::FetchClient;

const PREVIEW_CHARS: usize = 200;

/// Resolves `$NAME` references in URL templates.
pub type Resolver = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Suggestion source for configured searches.
#[derive(Clone)]
pub struct Suggester {
    fetch: FetchClient,
    cache: FileCache,
    ttl: Duration,
    resolve: Resolver,
}

impl fmt::Debug for Suggester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suggester")
            .field("fetch", &self.fetch)
            .field("cache", &self.cache)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl Suggester {
    /// Suggester resolving template variables from the process environment.
    pub fn new(fetch: FetchClient, cache: FileCache, ttl: Duration) -> Self {
        Self::with_resolver(fetch, cache, ttl, Arc::new(env_resolver))
    }

    pub fn with_resolver(fetch: FetchClient, cache: FileCache, ttl: Duration, resolve: Resolver) -> Self {
        Self { fetch, cache, ttl, resolve }
    }

    pub fn cache(&self) -> &FileCache {
        &self.cache
    }

    /// Suggestions for `query` on `search`, served from cache while fresh.
    ///
    /// A search without a suggest URL yields no suggestions and never touches
    /// the network. When `deadline` passes before the suggestions are in,
    /// the call fails with `Error::Cancelled` and nothing is cached.
    pub async fn suggestions(
        &self, search: &SearchConfig, query: &str, deadline: Option<Instant>,
    ) -> Result<Vec<String>, Error> {
        if search.suggest_url.trim().is_empty() {
            tracing::debug!(uid = %search.uid, "search has no suggest URL");
            return Ok(Vec::new());
        }

        let key = cache_key(&search.uid, query);

        self.cache
            .get_or_compute(&key, self.ttl, move || async move {
                match deadline {
                    Some(deadline) if deadline <= Instant::now() => {
                        Err(Error::Cancelled("deadline passed before fetch".into()))
                    }
                    Some(deadline) => tokio::time::timeout_at(deadline, self.fetch_suggestions(search, query))
                        .await
                        .unwrap_or_else(|_| Err(Error::Cancelled(format!("no suggestions for {query:?} before deadline")))),
                    None => self.fetch_suggestions(search, query).await,
                }
            })
            .await
    }

    async fn fetch_suggestions(&self, search: &SearchConfig, query: &str) -> Result<Vec<String>, Error> {
        let url = search.suggest_url_for(query, |name: &str| (self.resolve)(name));
        let response = self.fetch.fetch(&url).await?;

        let body = decode::normalize(
            &response.bytes,
            response.content_encoding.as_deref(),
            response.content_type.as_deref(),
            self.fetch.config().max_bytes,
        )?;

        tracing::debug!(
            uid = %search.uid,
            bytes = body.len(),
            preview = %preview(&body),
            "suggest response",
        );

        let suggestions = extract(&body, &search.jsonpath)?;
        tracing::debug!(uid = %search.uid, count = suggestions.len(), "extracted suggestions");

        Ok(suggestions)
    }
}

fn preview(body: &[u8]) -> String {
    String::from_utf8_lossy(body).chars().take(PREVIEW_CHARS).collect()
}
