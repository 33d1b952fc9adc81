// src/provider/circuit_breaker.rs

//! Circuit breaker guarding upstream page fetches.
//!
//! Opens after a run of consecutive failures, fails fast while open, and
//! admits a single trial request after the cool-down. State transitions are
//! surfaced through the `circuit_breaker_state` gauge (0 closed, 1 half-open,
//! 2 open) labeled by source.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use metrics::gauge;
use tracing::warn;

use crate::error::{AppError, Result};
use crate::metrics::CIRCUIT_BREAKER_STATE;

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that trip the breaker. Default: 3
    pub failure_threshold: u32,
    /// How long the breaker stays open before admitting a trial. Default: 30s
    pub cool_down: Duration,
    /// Rolling interval after which closed-state counts reset. Default: 60s
    pub interval: Duration,
    /// Trial requests admitted while half-open. Default: 1
    pub max_trial_requests: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cool_down: Duration::from_secs(30),
            interval: Duration::from_secs(60),
            max_trial_requests: 1,
        }
    }
}

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    HalfOpen,
    Open,
}

impl BreakerState {
    fn gauge_value(self) -> f64 {
        match self {
            BreakerState::Closed => 0.0,
            BreakerState::HalfOpen => 1.0,
            BreakerState::Open => 2.0,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    requests: u32,
    consecutive_failures: u32,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    counts: Counts,
    /// Incremented on every state or interval rollover; stale results from a
    /// previous generation are ignored.
    generation: u64,
    /// When the current open/closed window expires
    expiry: Option<Instant>,
}

/// A permit to run one wrapped operation; feed the outcome back via
/// [`CircuitBreaker::on_result`].
#[derive(Debug, Clone, Copy)]
pub struct Permit {
    generation: u64,
}

/// Per-source circuit breaker.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, CircuitBreakerConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let interval = config.interval;
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                counts: Counts::default(),
                generation: 0,
                expiry: Some(Instant::now() + interval),
            }),
        }
    }

    /// Current state, advancing open → half-open if the cool-down elapsed.
    pub fn state(&self) -> BreakerState {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        self.advance(&mut inner, Instant::now());
        inner.state
    }

    /// Ask permission to run one operation.
    ///
    /// Fails with [`AppError::CircuitOpen`] while open, or while half-open
    /// once the trial quota is spent.
    pub fn try_acquire(&self) -> Result<Permit> {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        let now = Instant::now();
        self.advance(&mut inner, now);

        match inner.state {
            BreakerState::Open => Err(AppError::CircuitOpen {
                provider: self.name.clone(),
            }),
            BreakerState::HalfOpen if inner.counts.requests >= self.config.max_trial_requests => {
                Err(AppError::CircuitOpen {
                    provider: self.name.clone(),
                })
            }
            _ => {
                inner.counts.requests += 1;
                Ok(Permit {
                    generation: inner.generation,
                })
            }
        }
    }

    /// Report the outcome of a permitted operation.
    pub fn on_result(&self, permit: Permit, success: bool) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        let now = Instant::now();
        self.advance(&mut inner, now);
        if permit.generation != inner.generation {
            return;
        }

        if success {
            match inner.state {
                BreakerState::Closed => inner.counts.consecutive_failures = 0,
                BreakerState::HalfOpen => self.transition(&mut inner, BreakerState::Closed, now),
                BreakerState::Open => {}
            }
        } else {
            match inner.state {
                BreakerState::Closed => {
                    inner.counts.consecutive_failures += 1;
                    if inner.counts.consecutive_failures >= self.config.failure_threshold {
                        self.transition(&mut inner, BreakerState::Open, now);
                    }
                }
                BreakerState::HalfOpen => self.transition(&mut inner, BreakerState::Open, now),
                BreakerState::Open => {}
            }
        }
    }

    /// Roll the open window into half-open and expire closed-state counts.
    fn advance(&self, inner: &mut Inner, now: Instant) {
        match inner.state {
            BreakerState::Open => {
                if inner.expiry.is_some_and(|e| now >= e) {
                    self.transition(inner, BreakerState::HalfOpen, now);
                }
            }
            BreakerState::Closed => {
                if inner.expiry.is_some_and(|e| now >= e) {
                    // New rolling interval
                    inner.generation += 1;
                    inner.counts = Counts::default();
                    inner.expiry = Some(now + self.config.interval);
                }
            }
            BreakerState::HalfOpen => {}
        }
    }

    fn transition(&self, inner: &mut Inner, to: BreakerState, now: Instant) {
        let from = inner.state;
        if from == to {
            return;
        }
        inner.state = to;
        inner.generation += 1;
        inner.counts = Counts::default();
        inner.expiry = match to {
            BreakerState::Open => Some(now + self.config.cool_down),
            BreakerState::Closed => Some(now + self.config.interval),
            BreakerState::HalfOpen => None,
        };

        warn!(source = %self.name, ?from, ?to, "circuit breaker state changed");
        gauge!(CIRCUIT_BREAKER_STATE, "source" => self.name.clone()).set(to.gauge_value());
    }
}
