// src/config.rs

//! Configuration loading from the environment and the sources file.
//!
//! Scalar settings come from environment variables (a `.env` file is honored
//! when present); the crawl sources are a JSON list loaded once at startup
//! and immutable thereafter.

use std::fs::File;
use std::time::Duration;

use serde::Deserialize;
use tracing::{error, warn};

use crate::error::{AppError, Result};
use crate::transform;

const DEFAULT_PULSE_URL: &str = "https://content-ecb.pulselive.com/content/ecb/text/EN/";

/// Pagination style for a source.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationConfig {
    /// "page" or "offset"
    #[serde(default)]
    pub r#type: String,
    /// Query parameter carrying the page value, e.g. "page", "start"
    #[serde(default)]
    pub page_param: String,
    /// Query parameter carrying the page size, e.g. "pageSize", "limit"
    #[serde(default)]
    pub limit_param: String,
    #[serde(default)]
    pub default_limit: u32,
}

/// A single upstream source definition.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
    pub transformer: String,
    #[serde(default)]
    pub pagination: PaginationConfig,
}

impl SourceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(AppError::validation("source name is required"));
        }
        if self.url.is_empty() {
            return Err(AppError::validation("source url is required"));
        }
        if !self.url.starts_with("http") {
            return Err(AppError::validation("source url must start with http/https"));
        }
        if !transform::is_known(&self.transformer) {
            return Err(AppError::validation(format!(
                "unknown transformer: {}",
                self.transformer
            )));
        }
        Ok(())
    }
}

/// Fully resolved service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub mongo_uri: String,
    pub mongo_db_name: String,
    pub mongo_collection: String,
    pub poll_interval: Duration,
    pub batch_size: usize,
    pub worker_pool_size: usize,
    pub kafka_brokers: Vec<String>,
    pub kafka_topic: String,
    pub kafka_dlq_topic: String,
    pub sources_file_path: String,
    pub otel_endpoint: Option<String>,
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Load configuration from the environment, then the sources file.
    ///
    /// Fails hard on out-of-range scalars; invalid individual sources are
    /// skipped with an error log.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let brokers = env_or("KAFKA_BROKERS", "kafka:29092");

        let mut cfg = Config {
            server_port: env_parsed("SERVER_PORT", 8080)?,
            mongo_uri: env_or("MONGO_URI", "mongodb://mongodb:27017"),
            mongo_db_name: env_or("MONGO_DB_NAME", "news_crawler"),
            mongo_collection: env_or("MONGO_COLLECTION", "articles"),
            poll_interval: env_duration("POLL_INTERVAL", Duration::from_secs(60))?,
            batch_size: env_parsed("BATCH_SIZE", 20)?,
            worker_pool_size: env_parsed("WORKER_POOL_SIZE", 5)?,
            kafka_brokers: brokers
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            kafka_topic: env_or("KAFKA_TOPIC", "news_articles"),
            kafka_dlq_topic: env_or("KAFKA_DLQ_TOPIC", "news_articles_dlq"),
            sources_file_path: env_or("SOURCES_FILE_PATH", "config/sources.json"),
            otel_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok(),
            sources: Vec::new(),
        };
        cfg.sources = load_sources(&cfg.sources_file_path);

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.mongo_uri.is_empty() {
            return Err(AppError::validation("MONGO_URI is required"));
        }
        if self.kafka_brokers.is_empty() {
            return Err(AppError::validation("KAFKA_BROKERS is required"));
        }
        if !(1..=20_000).contains(&self.batch_size) {
            return Err(AppError::validation(format!(
                "BATCH_SIZE must be within 1..=20000, got {}",
                self.batch_size
            )));
        }
        if !(1..=100).contains(&self.worker_pool_size) {
            return Err(AppError::validation(format!(
                "WORKER_POOL_SIZE must be within 1..=100, got {}",
                self.worker_pool_size
            )));
        }
        Ok(())
    }
}

/// Load and validate the sources file.
///
/// Falls back to a single built-in PulseLive source when the file cannot be
/// opened, so a bare deployment still ingests something.
fn load_sources(path: &str) -> Vec<SourceConfig> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            warn!(path, error = %e, "could not open sources file, using default PulseLive source");
            return vec![SourceConfig {
                name: "default-pulselive".to_string(),
                url: env_or("PULSE_API_URL", DEFAULT_PULSE_URL),
                transformer: "pulselive".to_string(),
                pagination: PaginationConfig::default(),
            }];
        }
    };

    let sources: Vec<SourceConfig> = match serde_json::from_reader(file) {
        Ok(s) => s,
        Err(e) => {
            error!(path, error = %e, "error decoding sources file");
            return Vec::new();
        }
    };

    let valid: Vec<SourceConfig> = sources
        .into_iter()
        .filter(|s| match s.validate() {
            Ok(()) => true,
            Err(e) => {
                error!(name = %s.name, error = %e, "invalid source config, skipping");
                false
            }
        })
        .collect();

    if valid.is_empty() {
        warn!(path, "no valid sources found in sources file");
    }
    valid
}

fn env_or(key: &str, fallback: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| fallback.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, fallback: T) -> Result<T> {
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map_err(|_| AppError::config(format!("{key} is not a valid number: {value}"))),
        Err(_) => Ok(fallback),
    }
}

fn env_duration(key: &str, fallback: Duration) -> Result<Duration> {
    match std::env::var(key) {
        Ok(value) => parse_duration(&value)
            .ok_or_else(|| AppError::config(format!("{key} is not a valid duration: {value}"))),
        Err(_) => Ok(fallback),
    }
}

/// Parse "90s" / "2m" / "1h" style strings, or a bare integer as seconds.
fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    for (suffix, scale) in [("s", 1), ("m", 60), ("h", 3600)] {
        if let Some(number) = value.strip_suffix(suffix) {
            let number: u64 = number.trim().parse().ok()?;
            return Some(Duration::from_secs(number * scale));
        }
    }
    None
}
