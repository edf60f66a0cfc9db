//! Search configurations.
//!
//! A search is stored as `<uid>.json` in the searches directory and
//! describes one remote suggestion service.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::template::{Escaping, build_url};

/// A configured suggestion source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Icon shown next to every result.
    #[serde(default)]
    pub icon: String,

    /// Path expression selecting suggestions in the suggest response.
    #[serde(default)]
    pub jsonpath: String,

    /// Launcher keyword.
    #[serde(default)]
    pub keyword: String,

    /// Percent-encode the query as a path segment instead of query-string encoding.
    #[serde(default)]
    pub pcencode: bool,

    /// Template of the URL opened for a chosen term.
    pub search_url: String,

    /// Template of the URL returning suggestions.
    #[serde(default)]
    pub suggest_url: String,

    /// Display title, used as the result subtitle.
    #[serde(default)]
    pub title: String,

    /// Unique identifier, also the file stem.
    #[serde(default)]
    pub uid: String,
}

impl SearchConfig {
    /// Escaping policy chosen by `pcencode`.
    pub fn escaping(&self) -> Escaping {
        Escaping::from_pcencode(self.pcencode)
    }

    /// URL that runs the search for `query`.
    pub fn search_url_for<F>(&self, query: &str, resolve: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        build_url(&self.search_url, query, self.escaping(), resolve)
    }

    /// URL that fetches suggestions for `query`.
    pub fn suggest_url_for<F>(&self, query: &str, resolve: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        build_url(&self.suggest_url, query, self.escaping(), resolve)
    }

    /// Load the search `uid` from `<dir>/<uid>.json`.
    ///
    /// The uid from the file name wins over any uid stored in the file.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `uid` is not a plain file stem and
    /// `Error::ConfigLoad` if the file is missing, unreadable or corrupt.
    pub async fn load(dir: impl AsRef<Path>, uid: &str) -> Result<Self, Error> {
        validate_uid(uid)?;

        let path = dir.as_ref().join(format!("{uid}.json"));
        tracing::debug!("loading search from {} ...", path.display());

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| Error::ConfigLoad(format!("cannot read search {uid:?} at {}: {e}", path.display())))?;

        let mut search: SearchConfig = serde_json::from_slice(&bytes)
            .map_err(|e| Error::ConfigLoad(format!("corrupt search {uid:?} at {}: {e}", path.display())))?;
        search.uid = uid.to_string();

        Ok(search)
    }
}

/// Check that `uid` is usable as a single file or directory name.
pub fn validate_uid(uid: &str) -> Result<(), Error> {
    if uid.is_empty() {
        return Err(Error::InvalidInput("search id cannot be empty".into()));
    }
    if uid == "." || uid == ".." || uid.contains(['/', '\\', '\0']) {
        return Err(Error::InvalidInput(format!("invalid search id: {uid:?}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wikipedia() -> SearchConfig {
        SearchConfig {
            icon: "icons/wikipedia.png".into(),
            jsonpath: "$[1][*]".into(),
            keyword: "w".into(),
            pcencode: true,
            search_url: "https://en.wikipedia.org/wiki/{query}".into(),
            suggest_url: "https://en.wikipedia.org/w/api.php?action=opensearch&search={query}".into(),
            title: "Wikipedia (English)".into(),
            uid: "wikipedia-en".into(),
        }
    }

    #[test]
    fn test_urls_for_query() {
        let search = wikipedia();
        let none = |_: &str| -> Option<String> { None };
        assert_eq!(search.search_url_for("Rust lang", none), "https://en.wikipedia.org/wiki/Rust%20lang");
        assert_eq!(
            search.suggest_url_for("Rust lang", none),
            "https://en.wikipedia.org/w/api.php?action=opensearch&search=Rust%20lang"
        );
    }

    #[test]
    fn test_query_escaping_when_not_pcencode() {
        let search = SearchConfig { pcencode: false, ..wikipedia() };
        assert_eq!(search.search_url_for("Rust lang", |_| None), "https://en.wikipedia.org/wiki/Rust+lang");
    }

    #[test]
    fn test_validate_uid() {
        assert!(validate_uid("google-en").is_ok());
        assert!(matches!(validate_uid(""), Err(Error::InvalidInput(_))));
        assert!(matches!(validate_uid(".."), Err(Error::InvalidInput(_))));
        assert!(matches!(validate_uid("a/b"), Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_load_overrides_uid() {
        let dir = tempfile::tempdir().unwrap();
        let body = serde_json::json!({
            "icon": "google.png",
            "jsonpath": "$[1][*]",
            "keyword": "g",
            "pcencode": false,
            "search_url": "https://www.google.com/search?q={query}",
            "suggest_url": "https://suggestqueries.google.com/complete/search?client=firefox&q={query}",
            "title": "Google (English)",
            "uid": "something-else"
        });
        std::fs::write(dir.path().join("google-en.json"), body.to_string()).unwrap();

        let search = SearchConfig::load(dir.path(), "google-en").await.unwrap();
        assert_eq!(search.uid, "google-en");
        assert_eq!(search.title, "Google (English)");
        assert_eq!(search.escaping(), Escaping::Query);
    }

    #[tokio::test]
    async fn test_load_missing_search() {
        let dir = tempfile::tempdir().unwrap();
        let result = SearchConfig::load(dir.path(), "nope").await;
        assert!(matches!(result, Err(Error::ConfigLoad(_))));
    }

    #[tokio::test]
    async fn test_load_corrupt_search() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        let result = SearchConfig::load(dir.path(), "broken").await;
        assert!(matches!(result, Err(Error::ConfigLoad(_))));
    }
}
