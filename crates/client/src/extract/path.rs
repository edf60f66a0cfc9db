//! Path expressions over JSON documents.
//!
//! Grammar:
//!
//! ```text
//! path      := '$' step* '+'
//! step      := '.' name | '.*' | '[' selectors ']'
//! selectors := '*' | selector (',' selector)*
//! selector  := integer | integer? ':' integer? | quoted-name | '*'
//! ```
//!
//! The trailing `+` asks for the matched values themselves. Negative indices
//! count from the end of an array; slices follow half-open `[start:end)`
//! semantics with clamping.

use std::fmt;

use serde_json::Value;

/// Marker requesting the values of the matched nodes.
pub const VALUE_MARKER: char = '+';

/// Errors raised while compiling a path expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("path must start with '$'")]
    MissingRoot,

    #[error("unexpected {found:?} at offset {offset}")]
    Unexpected { offset: usize, found: char },

    #[error("unexpected end of path")]
    UnexpectedEnd,

    #[error("empty name at offset {0}")]
    EmptyName(usize),

    #[error("invalid index {0:?}")]
    InvalidIndex(String),

    #[error("{0} not supported")]
    Unsupported(&'static str),
}

/// A path step that does not fit the node it is applied to.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected {expected} at {location}, found {found}")]
pub struct EvalError {
    pub location: String,
    pub expected: &'static str,
    pub found: &'static str,
}

impl EvalError {
    fn new(location: &str, expected: &'static str, found: &Value) -> Self {
        Self { location: location.to_string(), expected, found: kind_of(found) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Selector {
    Name(String),
    Index(i64),
    Slice { start: Option<i64>, end: Option<i64> },
    Wildcard,
}

/// A compiled path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
    source: String,
    steps: Vec<Vec<Selector>>,
}

impl PathExpr {
    /// Compile `expr`, appending the value marker when it is missing.
    pub fn parse(expr: &str) -> Result<Self, PathError> {
        let expr = expr.trim();
        let source = if expr.ends_with(VALUE_MARKER) { expr.to_string() } else { format!("{expr}{VALUE_MARKER}") };
        let body = &source[..source.len() - VALUE_MARKER.len_utf8()];
        let steps = Parser::new(body).parse()?;
        Ok(Self { source, steps })
    }

    /// Normalized source text, always ending with the value marker.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Evaluate against `doc`, returning matches in document order.
    ///
    /// Missing names and out-of-range indices simply match nothing. A step
    /// applied to a node of the wrong kind (a name on an array, an index on
    /// an object, anything on a scalar) is an error.
    pub fn evaluate<'a>(&self, doc: &'a Value) -> Result<Vec<&'a Value>, EvalError> {
        let mut current: Vec<(String, &'a Value)> = vec![("$".to_string(), doc)];

        for step in &self.steps {
            let mut next = Vec::new();
            for (location, node) in &current {
                for selector in step {
                    selector.select(location, node, &mut next)?;
                }
            }
            current = next;
        }

        Ok(current.into_iter().map(|(_, node)| node).collect())
    }
}

impl fmt::Display for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Selector {
    fn select<'a>(&self, location: &str, node: &'a Value, out: &mut Vec<(String, &'a Value)>) -> Result<(), EvalError> {
        match (self, node) {
            (Selector::Name(name), Value::Object(map)) => {
                if let Some(child) = map.get(name) {
                    out.push((format!("{location}[{name:?}]"), child));
                }
            }
            (Selector::Name(_), other) => return Err(EvalError::new(location, "object", other)),
            (Selector::Index(index), Value::Array(items)) => {
                if let Some(i) = resolve_index(*index, items.len()) {
                    out.push((format!("{location}[{i}]"), &items[i]));
                }
            }
            (Selector::Slice { start, end }, Value::Array(items)) => {
                let (from, to) = slice_bounds(*start, *end, items.len());
                for i in from..to {
                    out.push((format!("{location}[{i}]"), &items[i]));
                }
            }
            (Selector::Index(_) | Selector::Slice { .. }, other) => {
                return Err(EvalError::new(location, "array", other));
            }
            (Selector::Wildcard, Value::Array(items)) => {
                out.extend(items.iter().enumerate().map(|(i, child)| (format!("{location}[{i}]"), child)));
            }
            (Selector::Wildcard, Value::Object(map)) => {
                out.extend(map.iter().map(|(name, child)| (format!("{location}[{name:?}]"), child)));
            }
            (Selector::Wildcard, other) => return Err(EvalError::new(location, "array or object", other)),
        }
        Ok(())
    }
}

fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let i = if index < 0 { len + index } else { index };
    (0..len).contains(&i).then_some(i as usize)
}

fn slice_bounds(start: Option<i64>, end: Option<i64>, len: usize) -> (usize, usize) {
    let len = len as i64;
    let clamp = |bound: i64| if bound < 0 { (len + bound).max(0) } else { bound.min(len) };
    let from = clamp(start.unwrap_or(0));
    let to = clamp(end.unwrap_or(len));
    if from >= to { (0, 0) } else { (from as usize, to as usize) }
}

/// JSON kind name used in diagnostics.
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self { chars: input.chars().collect(), pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn unexpected(&self) -> PathError {
        match self.peek() {
            Some(found) => PathError::Unexpected { offset: self.pos, found },
            None => PathError::UnexpectedEnd,
        }
    }

    fn expect(&mut self, want: char) -> Result<(), PathError> {
        if self.peek() == Some(want) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn parse(mut self) -> Result<Vec<Vec<Selector>>, PathError> {
        if self.next() != Some('$') {
            return Err(PathError::MissingRoot);
        }

        let mut steps = Vec::new();
        while let Some(c) = self.peek() {
            match c {
                '.' => {
                    self.pos += 1;
                    match self.peek() {
                        Some('.') => return Err(PathError::Unsupported("recursive descent")),
                        Some('*') => {
                            self.pos += 1;
                            steps.push(vec![Selector::Wildcard]);
                        }
                        _ => steps.push(vec![Selector::Name(self.name()?)]),
                    }
                }
                '[' => {
                    self.pos += 1;
                    steps.push(self.bracket()?);
                }
                _ => return Err(self.unexpected()),
            }
        }
        Ok(steps)
    }

    fn name(&mut self) -> Result<String, PathError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| !matches!(c, '.' | '[' | ']') && !c.is_whitespace()) {
            self.pos += 1;
        }
        if start == self.pos {
            return match self.peek() {
                Some(_) => Err(PathError::EmptyName(start)),
                None => Err(PathError::UnexpectedEnd),
            };
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn bracket(&mut self) -> Result<Vec<Selector>, PathError> {
        self.skip_ws();
        if matches!(self.peek(), Some('?' | '(')) {
            return Err(PathError::Unsupported("filter expressions"));
        }

        let mut selectors = Vec::new();
        loop {
            self.skip_ws();
            selectors.push(self.selector()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(']') => {
                    self.pos += 1;
                    return Ok(selectors);
                }
                _ => return Err(self.unexpected()),
            }
        }
    }

    fn selector(&mut self) -> Result<Selector, PathError> {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                Ok(Selector::Name(self.quoted(quote)?))
            }
            Some('*') => {
                self.pos += 1;
                Ok(Selector::Wildcard)
            }
            _ => {
                let start = self.integer()?;
                self.skip_ws();
                if self.peek() == Some(':') {
                    self.pos += 1;
                    self.skip_ws();
                    let end = self.integer()?;
                    Ok(Selector::Slice { start, end })
                } else {
                    start.map(Selector::Index).ok_or_else(|| self.unexpected())
                }
            }
        }
    }

    fn integer(&mut self) -> Result<Option<i64>, PathError> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if start == self.pos {
            return Ok(None);
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse().map(Some).map_err(|_| PathError::InvalidIndex(text))
    }

    fn quoted(&mut self, quote: char) -> Result<String, PathError> {
        let mut out = String::new();
        loop {
            match self.next() {
                Some('\\') => out.push(self.next().ok_or(PathError::UnexpectedEnd)?),
                Some(c) if c == quote => return Ok(out),
                Some(c) => out.push(c),
                None => return Err(PathError::UnexpectedEnd),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(expr: &str, doc: &Value) -> Result<Vec<Value>, EvalError> {
        let path = PathExpr::parse(expr).unwrap();
        path.evaluate(doc).map(|found| found.into_iter().cloned().collect())
    }

    #[test]
    fn test_marker_appended_once() {
        assert_eq!(PathExpr::parse("$[1]").unwrap().as_str(), "$[1]+");
        assert_eq!(PathExpr::parse("$[1]+").unwrap().as_str(), "$[1]+");
        assert_eq!(PathExpr::parse(" $.a ").unwrap().to_string(), "$.a+");
    }

    #[test]
    fn test_dot_names_and_wildcard() {
        let doc = json!({"data": [{"value": "a"}, {"value": "b"}]});
        assert_eq!(eval("$.data[*].value+", &doc).unwrap(), vec![json!("a"), json!("b")]);
        assert_eq!(eval("$.data.*.value", &doc).unwrap(), vec![json!("a"), json!("b")]);
    }

    #[test]
    fn test_opensearch_shape() {
        let doc = json!(["rust", ["rust", "rust lang", "rustacean"], [], []]);
        assert_eq!(eval("$[1][*]", &doc).unwrap(), vec![json!("rust"), json!("rust lang"), json!("rustacean")]);
    }

    #[test]
    fn test_object_wildcard_keeps_document_order() {
        let doc: Value = serde_json::from_str(r#"{"z": "first", "a": "second", "m": "third"}"#).unwrap();
        assert_eq!(eval("$.*", &doc).unwrap(), vec![json!("first"), json!("second"), json!("third")]);
    }

    #[test]
    fn test_quoted_names() {
        let doc = json!({"odd key": {"it's": "x"}});
        assert_eq!(eval(r#"$["odd key"]['it\'s']"#, &doc).unwrap(), vec![json!("x")]);
    }

    #[test]
    fn test_negative_index_and_slices() {
        let doc = json!(["a", "b", "c", "d"]);
        assert_eq!(eval("$[-1]", &doc).unwrap(), vec![json!("d")]);
        assert_eq!(eval("$[1:3]", &doc).unwrap(), vec![json!("b"), json!("c")]);
        assert_eq!(eval("$[:2]", &doc).unwrap(), vec![json!("a"), json!("b")]);
        assert_eq!(eval("$[-2:]", &doc).unwrap(), vec![json!("c"), json!("d")]);
        assert_eq!(eval("$[3:1]", &doc).unwrap(), Vec::<Value>::new());
        assert_eq!(eval("$[0:100]", &doc).unwrap().len(), 4);
    }

    #[test]
    fn test_union() {
        let doc = json!(["a", "b", "c"]);
        assert_eq!(eval("$[2, 0]", &doc).unwrap(), vec![json!("c"), json!("a")]);

        let doc = json!({"x": "1", "y": "2"});
        assert_eq!(eval(r#"$["y","x"]"#, &doc).unwrap(), vec![json!("2"), json!("1")]);
    }

    #[test]
    fn test_missing_matches_nothing() {
        let doc = json!({"data": ["a"]});
        assert!(eval("$.nothing", &doc).unwrap().is_empty());
        assert!(eval("$.data[5]", &doc).unwrap().is_empty());
    }

    #[test]
    fn test_kind_mismatch_is_eval_error() {
        let doc = json!({"error": "quota exceeded"});
        let err = eval("$[1][*]", &doc).unwrap_err();
        assert_eq!(err.location, "$");
        assert_eq!(err.expected, "array");
        assert_eq!(err.found, "object");

        let err = eval("$.error.code", &doc).unwrap_err();
        assert_eq!(err.found, "string");
        assert_eq!(err.to_string(), r#"expected object at $["error"], found string"#);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(PathExpr::parse("data[0]"), Err(PathError::MissingRoot));
        assert_eq!(PathExpr::parse("$[0"), Err(PathError::UnexpectedEnd));
        assert_eq!(PathExpr::parse("$..name"), Err(PathError::Unsupported("recursive descent")));
        assert_eq!(PathExpr::parse("$[?(@.x)]"), Err(PathError::Unsupported("filter expressions")));
        assert_eq!(PathExpr::parse("$[-]"), Err(PathError::InvalidIndex("-".into())));
        assert_eq!(PathExpr::parse("$.[0]"), Err(PathError::EmptyName(2)));
        assert!(matches!(PathExpr::parse("$x"), Err(PathError::Unexpected { offset: 1, found: 'x' })));
        assert!(matches!(PathExpr::parse("$['open"), Err(PathError::UnexpectedEnd)));
    }

    #[test]
    fn test_root_only() {
        let doc = json!("solo");
        assert_eq!(eval("$", &doc).unwrap(), vec![json!("solo")]);
    }
}
