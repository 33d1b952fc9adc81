// src/transform/mod.rs

//! Transformers: upstream payload parsers keyed by name.
//!
//! Each transformer consumes a raw response body and produces normalized
//! articles plus the pagination metadata the provider uses to decide when a
//! crawl is exhausted.

mod dummy;
mod pulselive;

pub use dummy::DummyTransformer;
pub use pulselive::PulseLiveTransformer;

use crate::error::{AppError, Result};
use crate::models::{Article, PageInfo};

/// A parser for one upstream response shape.
pub trait Transformer: Send + Sync {
    /// Parse a response body into normalized articles and page metadata.
    fn transform(&self, body: &[u8]) -> Result<(Vec<Article>, Option<PageInfo>)>;
}

/// Look up a transformer by its configured name.
///
/// Unknown names are a configuration error; callers reject the source at
/// startup rather than at request time.
pub fn get_transformer(name: &str) -> Result<Box<dyn Transformer>> {
    match name {
        pulselive::NAME => Ok(Box::new(PulseLiveTransformer)),
        dummy::NAME => Ok(Box::new(DummyTransformer)),
        other => Err(AppError::config(format!("transformer not found: {other}"))),
    }
}

/// Whether `name` resolves to a registered transformer.
pub fn is_known(name: &str) -> bool {
    matches!(name, pulselive::NAME | dummy::NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_resolves_known_names() {
        assert!(get_transformer("pulselive").is_ok());
        assert!(get_transformer("dummy").is_ok());
        assert!(get_transformer("unknown").is_err());
    }

    #[test]
    fn known_matches_registry() {
        assert!(is_known("pulselive"));
        assert!(is_known("dummy"));
        assert!(!is_known(""));
    }
}
