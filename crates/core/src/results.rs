//! Result assembly and the launcher feed.
//!
//! Turns a suggestion list into selectable records and serializes them in
//! the script-filter JSON shape the launcher reads from stdout.

use serde::Serialize;
use serde::ser::{SerializeStruct, Serializer};

use crate::search::SearchConfig;

/// Title of the placeholder shown when there is nothing to list.
pub const EMPTY_TITLE: &str = "No Results";

/// Subtitle of the placeholder shown when there is nothing to list.
pub const EMPTY_SUBTITLE: &str = "Try a different query?";

/// One selectable result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    /// Suggestion text.
    pub title: String,
    /// Title of the search that produced it.
    pub subtitle: String,
    /// Action URL: the search URL for `title`.
    pub arg: String,
    /// Stable identifier, the action URL.
    pub uid: String,
    /// Text the launcher puts in its input on tab completion.
    pub autocomplete: String,
    /// Icon reference of the search.
    pub icon: String,
    /// Whether the record can be actioned.
    pub valid: bool,
}

impl ResultRecord {
    fn for_term<F>(search: &SearchConfig, term: &str, resolve: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = search.search_url_for(term, resolve);
        Self {
            title: term.to_string(),
            subtitle: search.title.clone(),
            arg: url.clone(),
            uid: url,
            autocomplete: format!("{term} "),
            icon: search.icon.clone(),
            valid: true,
        }
    }
}

/// Assembly switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssembleOptions {
    /// List the literal query too, and keep suggestions equal to it.
    pub include_query: bool,
    /// Serialize record uids so the launcher can sort and deduplicate.
    pub emit_uids: bool,
}

/// Records ready for the launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    records: Vec<ResultRecord>,
    emit_uids: bool,
}

impl Feed {
    /// Feed reporting a fatal error as its only, non-actionable item.
    pub fn error(message: impl Into<String>) -> Self {
        let record = ResultRecord {
            title: message.into(),
            subtitle: "Check the log for details".into(),
            arg: String::new(),
            uid: String::new(),
            autocomplete: String::new(),
            icon: String::new(),
            valid: false,
        };
        Self { records: vec![record], emit_uids: false }
    }

    /// Assembled records.
    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    /// True when there is nothing to show; the feed then serializes a
    /// "No Results" placeholder instead of an empty list.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Serialize to the launcher's JSON format.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Build the feed for `suggestions` of `query` on `search`.
///
/// A suggestion equal to the query (ignoring case) is dropped unless
/// `include_query` is set. The literal query is appended when
/// `include_query` is set or there are no suggestions at all.
pub fn assemble<F>(
    search: &SearchConfig, query: &str, suggestions: &[String], options: AssembleOptions, resolve: F,
) -> Feed
where
    F: Fn(&str) -> Option<String>,
{
    let mut records: Vec<ResultRecord> = suggestions
        .iter()
        .filter(|term| options.include_query || !eq_ignore_case(term, query))
        .map(|term| ResultRecord::for_term(search, term, &resolve))
        .collect();

    if options.include_query || suggestions.is_empty() {
        records.push(ResultRecord::for_term(search, query, &resolve));
    }

    Feed { records, emit_uids: options.emit_uids }
}

/// Case-insensitive equality, code point by code point.
///
/// Two code points match when either their lowercase or their uppercase
/// mappings agree, so `ſ`/`s`, the Kelvin sign/`k` and `ς`/`σ` all match.
fn eq_ignore_case(a: &str, b: &str) -> bool {
    let (mut xs, mut ys) = (a.chars(), b.chars());
    loop {
        match (xs.next(), ys.next()) {
            (None, None) => return true,
            (Some(x), Some(y)) if fold_eq(x, y) => {}
            _ => return false,
        }
    }
}

fn fold_eq(x: char, y: char) -> bool {
    x == y || x.to_lowercase().eq(y.to_lowercase()) || x.to_uppercase().eq(y.to_uppercase())
}

#[derive(Serialize)]
struct Icon<'a> {
    path: &'a str,
}

#[derive(Serialize)]
struct Item<'a> {
    title: &'a str,
    subtitle: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    arg: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    uid: Option<&'a str>,
    #[serde(skip_serializing_if = "str::is_empty")]
    autocomplete: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon: Option<Icon<'a>>,
    valid: bool,
}

impl<'a> Item<'a> {
    fn from_record(record: &'a ResultRecord, emit_uids: bool) -> Self {
        Self {
            title: &record.title,
            subtitle: &record.subtitle,
            arg: &record.arg,
            uid: (emit_uids && !record.uid.is_empty()).then_some(record.uid.as_str()),
            autocomplete: &record.autocomplete,
            icon: (!record.icon.is_empty()).then_some(Icon { path: &record.icon }),
            valid: record.valid,
        }
    }

    fn placeholder() -> Self {
        Self {
            title: EMPTY_TITLE,
            subtitle: EMPTY_SUBTITLE,
            arg: "",
            uid: None,
            autocomplete: "",
            icon: None,
            valid: false,
        }
    }
}

impl Serialize for Feed {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let items: Vec<Item<'_>> = if self.records.is_empty() {
            vec![Item::placeholder()]
        } else {
            self.records.iter().map(|r| Item::from_record(r, self.emit_uids)).collect()
        };

        let mut feed = serializer.serialize_struct("Feed", 1)?;
        feed.serialize_field("items", &items)?;
        feed.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search() -> SearchConfig {
        SearchConfig {
            icon: "google.png".into(),
            jsonpath: "$[1][*]".into(),
            keyword: "g".into(),
            pcencode: false,
            search_url: "https://www.google.com/search?q={query}".into(),
            suggest_url: "https://suggestqueries.google.com/complete/search?client=firefox&q={query}".into(),
            title: "Google".into(),
            uid: "google-en".into(),
        }
    }

    fn none(_: &str) -> Option<String> {
        None
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn titles(feed: &Feed) -> Vec<&str> {
        feed.records().iter().map(|r| r.title.as_str()).collect()
    }

    #[test]
    fn test_exact_match_skipped_without_trailing_query() {
        let feed = assemble(&search(), "cat", &strings(&["cat", "category"]), AssembleOptions::default(), none);
        assert_eq!(titles(&feed), vec!["category"]);
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let feed = assemble(&search(), "cat", &strings(&["CAT", "Category"]), AssembleOptions::default(), none);
        assert_eq!(titles(&feed), vec!["Category"]);
    }

    #[test]
    fn test_case_folding_per_code_point() {
        assert!(eq_ignore_case("Rust", "rUST"));
        assert!(eq_ignore_case("ſun", "sun"));
        assert!(eq_ignore_case("\u{212A}elvin", "kelvin"));
        assert!(eq_ignore_case("σοφός", "ΣΟΦΌΣ"));
        assert!(eq_ignore_case("ß", "ẞ"));
        assert!(!eq_ignore_case("ß", "ss"));
        assert!(!eq_ignore_case("cat", "cats"));
        assert!(!eq_ignore_case("", "a"));
    }

    #[test]
    fn test_include_query_keeps_match_and_appends_query() {
        let options = AssembleOptions { include_query: true, ..Default::default() };
        let feed = assemble(&search(), "cat", &strings(&["cat", "category"]), options, none);
        assert_eq!(titles(&feed), vec!["cat", "category", "cat"]);
    }

    #[test]
    fn test_empty_suggestions_fall_back_to_query() {
        let feed = assemble(&search(), "zebra", &[], AssembleOptions::default(), none);
        assert_eq!(titles(&feed), vec!["zebra"]);
        assert!(!feed.is_empty());
    }

    #[test]
    fn test_only_exact_match_gives_empty_feed() {
        let feed = assemble(&search(), "cat", &strings(&["Cat"]), AssembleOptions::default(), none);
        assert!(feed.is_empty());

        let json: serde_json::Value = serde_json::from_str(&feed.to_json().unwrap()).unwrap();
        assert_eq!(json["items"][0]["title"], EMPTY_TITLE);
        assert_eq!(json["items"][0]["subtitle"], EMPTY_SUBTITLE);
        assert_eq!(json["items"][0]["valid"], false);
    }

    #[test]
    fn test_record_fields() {
        let feed = assemble(&search(), "cat", &strings(&["cat food"]), AssembleOptions::default(), none);
        let record = &feed.records()[0];
        assert_eq!(record.title, "cat food");
        assert_eq!(record.subtitle, "Google");
        assert_eq!(record.arg, "https://www.google.com/search?q=cat+food");
        assert_eq!(record.uid, record.arg);
        assert_eq!(record.autocomplete, "cat food ");
        assert_eq!(record.icon, "google.png");
        assert!(record.valid);
    }

    #[test]
    fn test_uids_only_serialized_when_enabled() {
        let suggestions = strings(&["dog"]);

        let feed = assemble(&search(), "d", &suggestions, AssembleOptions::default(), none);
        let json: serde_json::Value = serde_json::from_str(&feed.to_json().unwrap()).unwrap();
        assert!(json["items"][0].get("uid").is_none());

        let options = AssembleOptions { emit_uids: true, ..Default::default() };
        let feed = assemble(&search(), "d", &suggestions, options, none);
        let json: serde_json::Value = serde_json::from_str(&feed.to_json().unwrap()).unwrap();
        assert_eq!(json["items"][0]["uid"], "https://www.google.com/search?q=dog");
        assert_eq!(json["items"][0]["icon"]["path"], "google.png");
    }

    #[test]
    fn test_error_feed() {
        let feed = Feed::error("HTTP_ERROR: 404 Not Found");
        let json: serde_json::Value = serde_json::from_str(&feed.to_json().unwrap()).unwrap();
        assert_eq!(json["items"].as_array().unwrap().len(), 1);
        assert_eq!(json["items"][0]["title"], "HTTP_ERROR: 404 Not Found");
        assert_eq!(json["items"][0]["valid"], false);
        assert!(json["items"][0].get("arg").is_none());
    }
}
