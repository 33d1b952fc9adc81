// src/error.rs

//! Unified error handling for the ingestion engine.

use std::fmt;

use thiserror::Error;

/// Result type alias for ingestion operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Document store error
    #[error("store error: {0}")]
    Store(#[from] mongodb::error::Error),

    /// Event channel error
    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("validation error: {0}")]
    Validation(String),

    /// Upstream payload could not be parsed
    #[error("parse error for {provider}: {message}")]
    Parse { provider: String, message: String },

    /// Upstream returned a non-retryable status
    #[error("provider {provider} returned status {status}")]
    UnexpectedStatus {
        provider: String,
        status: reqwest::StatusCode,
    },

    /// Circuit breaker is open; the crawl fails fast
    #[error("circuit breaker open for {provider}")]
    CircuitOpen { provider: String },

    /// Crawling error with provider context
    #[error("crawl error for {provider}: {message}")]
    Crawl { provider: String, message: String },

    /// Operation aborted by shutdown
    #[error("operation cancelled")]
    Cancelled,
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a parse error with provider context.
    pub fn parse(provider: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Parse {
            provider: provider.into(),
            message: message.to_string(),
        }
    }

    /// Create a crawl error with provider context.
    pub fn crawl(provider: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Crawl {
            provider: provider.into(),
            message: message.to_string(),
        }
    }
}
