//! Suggestion extraction from decoded response bodies.

pub mod path;

use serde_json::Value;
use suggestio_core::Error;

pub use path::{EvalError, PathError, PathExpr, kind_of};

/// Extract the suggestion strings selected by `expr` from a JSON body.
///
/// An empty expression selects nothing. Every match must be a JSON string.
///
/// # Errors
///
/// - `Error::BadPath` if `expr` does not compile
/// - `Error::InvalidJson` if `body` is not JSON
/// - `Error::PathEval` if `expr` does not fit the document's shape
/// - `Error::Extract` if a match is not a string
pub fn extract(body: &[u8], expr: &str) -> Result<Vec<String>, Error> {
    if expr.trim().is_empty() {
        return Ok(Vec::new());
    }

    let path = PathExpr::parse(expr).map_err(|e| Error::BadPath(format!("{expr}: {e}")))?;
    let doc: Value = serde_json::from_slice(body).map_err(|e| Error::InvalidJson(e.to_string()))?;

    let matches = path.evaluate(&doc).map_err(|e| Error::PathEval(format!("{path}: {e}")))?;

    matches
        .into_iter()
        .map(|value| match value {
            Value::String(s) => Ok(s.clone()),
            other => Err(Error::Extract(format!("{path} matched {}, not a string", kind_of(other)))),
        })
        .collect()
}
