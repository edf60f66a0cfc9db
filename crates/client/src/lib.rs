//! Client side of suggestio.
//!
//! This crate fetches suggest endpoints, normalizes their bodies to UTF-8,
//! extracts suggestion strings and caches them through `suggestio-core`.

pub mod decode;
pub mod extract;
pub mod fetch;
pub mod suggest;

pub use extract::{PathExpr, extract};
pub use fetch::{FetchClient, FetchConfig, FetchResponse};
pub use suggest::{Resolver, Suggester};
