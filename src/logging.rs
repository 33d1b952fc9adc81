// src/logging.rs

//! Structured logging setup and noise control.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` controls filtering; `LOG_FORMAT=json` switches to JSON output
/// for log shippers, anything else stays human-readable.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Reduces log noise by sampling repeated errors: the first occurrence of a
/// key is logged, then every Nth.
pub struct ErrorSampler {
    counts: Mutex<HashMap<String, u64>>,
    interval: u64,
}

impl ErrorSampler {
    pub fn new(interval: u64) -> Self {
        Self {
            counts: Mutex::new(HashMap::new()),
            interval: interval.max(1),
        }
    }

    /// Whether this occurrence of `key` should be logged.
    pub fn should_log(&self, key: &str) -> bool {
        let mut counts = self.counts.lock().expect("sampler lock poisoned");
        let count = counts.entry(key.to_string()).or_insert(0);
        *count += 1;
        *count == 1 || *count % self.interval == 0
    }

    /// Occurrences recorded for `key` so far.
    pub fn count(&self, key: &str) -> u64 {
        self.counts
            .lock()
            .expect("sampler lock poisoned")
            .get(key)
            .copied()
            .unwrap_or(0)
    }
}
