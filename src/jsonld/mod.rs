//! Payload parsing
//!
//! A [`PayloadParser`] turns payload text into a [`Graph`]. The default
//! implementation, [`JsonLdParser`], expands a JSON-LD document into triples.

mod context;
mod parser;

use crate::graph::Graph;
use thiserror::Error;

pub use context::{ActiveContext, Coercion, TermDefinition};
pub use parser::JsonLdParser;

/// Errors from turning a payload into a graph
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("payload is not UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid JSON-LD document: {0}")]
    InvalidDocument(String),

    #[error("unsupported JSON-LD feature: {0}")]
    Unsupported(String),
}

/// Turns raw payload text into an in-memory graph.
pub trait PayloadParser: Send + Sync {
    /// Media type this parser reads (for logging)
    fn media_type(&self) -> &str;

    fn parse(&self, payload: &str) -> Result<Graph, ParseError>;
}
