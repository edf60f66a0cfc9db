//! URL templates for search and suggest endpoints.
//!
//! A template is a URL containing the `{query}` placeholder and, optionally,
//! `$NAME` or `${NAME}` references to variables such as a locale or API key.
//! Variable lookup goes through a caller-supplied resolver so nothing here
//! reads global state.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};

/// Placeholder replaced by the escaped query.
pub const QUERY_PLACEHOLDER: &str = "{query}";

/// Characters escaped in a path segment.
///
/// Everything but unreserved characters and `&+:=@`. `$` is escaped so a
/// query can never introduce a variable reference.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'&')
    .remove(b'+')
    .remove(b':')
    .remove(b'=')
    .remove(b'@');

/// How text is made safe for inclusion in a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Escaping {
    /// Percent-encoding for a path segment (`a b` -> `a%20b`).
    Path,
    /// Query-string encoding (`a b` -> `a+b`).
    Query,
}

impl Escaping {
    /// Pick the policy from a search's `pcencode` flag.
    pub fn from_pcencode(pcencode: bool) -> Self {
        if pcencode { Escaping::Path } else { Escaping::Query }
    }
}

/// Escape `value` according to `escaping`.
pub fn escape(value: &str, escaping: Escaping) -> String {
    match escaping {
        Escaping::Path => utf8_percent_encode(value, PATH_SEGMENT).to_string(),
        Escaping::Query => url::form_urlencoded::byte_serialize(value.as_bytes()).collect(),
    }
}

/// Expand `$NAME` and `${NAME}` references using `resolve`.
///
/// Names are `[A-Za-z0-9_]+`. Unknown names expand to nothing. Anything that
/// is not a well-formed reference is copied through unchanged.
pub fn expand<F>(template: &str, resolve: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        match parse_reference(after) {
            Some((name, consumed)) => {
                out.push_str(&resolve(name).unwrap_or_default());
                rest = &after[consumed..];
            }
            None => {
                out.push('$');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Parse the name following a `$`, returning it and the bytes consumed.
fn parse_reference(s: &str) -> Option<(&str, usize)> {
    if let Some(braced) = s.strip_prefix('{') {
        let end = braced.find('}')?;
        let name = &braced[..end];
        if !name.is_empty() && name.bytes().all(is_name_byte) { Some((name, end + 2)) } else { None }
    } else {
        let len = s.bytes().take_while(|b| is_name_byte(*b)).count();
        if len > 0 { Some((&s[..len], len)) } else { None }
    }
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Build a URL from `template` for `query`.
///
/// Every `{query}` is replaced with the escaped query, then variable
/// references are expanded with their values escaped the same way.
pub fn build_url<F>(template: &str, query: &str, escaping: Escaping, resolve: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let substituted = template.replace(QUERY_PLACEHOLDER, &escape(query, escaping));
    expand(&substituted, |name| resolve(name).map(|value| escape(&value, escaping)))
}

/// Resolver backed by the process environment.
pub fn env_resolver(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn fixed(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_escape_query() {
        assert_eq!(escape("rust lang", Escaping::Query), "rust+lang");
        assert_eq!(escape("a&b=c", Escaping::Query), "a%26b%3Dc");
        assert_eq!(escape("café", Escaping::Query), "caf%C3%A9");
    }

    #[test]
    fn test_escape_path() {
        assert_eq!(escape("rust lang", Escaping::Path), "rust%20lang");
        assert_eq!(escape("a/b?c", Escaping::Path), "a%2Fb%3Fc");
        assert_eq!(escape("a+b@c", Escaping::Path), "a+b@c");
        assert_eq!(escape("$HOME", Escaping::Path), "%24HOME");
    }

    #[test]
    fn test_from_pcencode() {
        assert_eq!(Escaping::from_pcencode(true), Escaping::Path);
        assert_eq!(Escaping::from_pcencode(false), Escaping::Query);
    }

    #[test]
    fn test_expand_plain_and_braced() {
        let resolve = fixed(&[("LANG", "en"), ("REGION", "us")]);
        assert_eq!(expand("hl=$LANG&gl=${REGION}", &resolve), "hl=en&gl=us");
    }

    #[test]
    fn test_expand_unknown_is_empty() {
        let resolve = fixed(&[]);
        assert_eq!(expand("hl=$LANG&x=1", resolve), "hl=&x=1");
    }

    #[test]
    fn test_expand_malformed_passes_through() {
        let resolve = fixed(&[("A", "1")]);
        assert_eq!(expand("cost: $ 5", &resolve), "cost: $ 5");
        assert_eq!(expand("x=${A", &resolve), "x=${A");
        assert_eq!(expand("x=${}", &resolve), "x=${}");
        assert_eq!(expand("x=${A-B}", &resolve), "x=${A-B}");
        assert_eq!(expand("end$", &resolve), "end$");
    }

    #[test]
    fn test_build_url_replaces_every_placeholder() {
        let url = build_url("https://x.test/{query}?q={query}", "a b", Escaping::Query, fixed(&[]));
        assert_eq!(url, "https://x.test/a+b?q=a+b");
    }

    #[test]
    fn test_build_url_escapes_variables() {
        let resolve = fixed(&[("LOCALE", "en US")]);
        let url = build_url("https://x.test/s?q={query}&hl=${LOCALE}", "q", Escaping::Path, resolve);
        assert_eq!(url, "https://x.test/s?q=q&hl=en%20US");
    }

    #[test]
    fn test_query_cannot_inject_variables() {
        let resolve = fixed(&[("SECRET", "leak")]);
        for escaping in [Escaping::Path, Escaping::Query] {
            let url = build_url("https://x.test/?q={query}", "$SECRET", escaping, &resolve);
            assert!(!url.contains("leak"), "{url}");
        }
    }

    #[test]
    fn test_build_url_always_parses() {
        let queries = ["", "simple", "two words", "üñíçødé", "a/b?c#d", "100% & more", "{query}", "$HOME ${X}"];
        let templates = [
            "https://suggest.test/complete?client=firefox&q={query}",
            "https://wiki.test/w/api.php?action=opensearch&search={query}&lang=${LANG}",
            "https://shop.test/search/{query}",
        ];
        let resolve = fixed(&[("LANG", "de ch")]);
        for template in templates {
            for query in queries {
                for escaping in [Escaping::Path, Escaping::Query] {
                    let built = build_url(template, query, escaping, &resolve);
                    assert!(url::Url::parse(&built).is_ok(), "{built}");
                }
            }
        }
    }
}
