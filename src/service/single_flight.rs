// src/service/single_flight.rs

//! Per-provider mutual exclusion.
//!
//! At most one crawl per provider name may be in flight process-wide; a
//! worker that loses the race drops its job instead of piling up behind a
//! slow upstream.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Concurrent set of provider names with an in-flight crawl.
#[derive(Clone, Default)]
pub struct SingleFlight {
    active: Arc<Mutex<HashSet<String>>>,
}

/// Releases the provider's slot when dropped.
pub struct FlightGuard {
    active: Arc<Mutex<HashSet<String>>>,
    name: String,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for `name`. Returns `None` if a crawl for that
    /// provider is already in flight.
    pub fn try_acquire(&self, name: &str) -> Option<FlightGuard> {
        let mut active = self.active.lock().expect("single-flight lock poisoned");
        if !active.insert(name.to_string()) {
            return None;
        }
        Some(FlightGuard {
            active: self.active.clone(),
            name: name.to_string(),
        })
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.active
            .lock()
            .expect("single-flight lock poisoned")
            .contains(name)
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.active
            .lock()
            .expect("single-flight lock poisoned")
            .remove(&self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_rejected_until_release() {
        let flights = SingleFlight::new();

        let guard = flights.try_acquire("pulselive").expect("first claim");
        assert!(flights.try_acquire("pulselive").is_none());
        assert!(flights.is_active("pulselive"));

        // Another provider is unaffected
        let other = flights.try_acquire("dummy").expect("independent claim");
        drop(other);

        drop(guard);
        assert!(!flights.is_active("pulselive"));
        assert!(flights.try_acquire("pulselive").is_some());
    }

    #[test]
    fn guard_releases_even_when_work_panics() {
        let flights = SingleFlight::new();
        let flights2 = flights.clone();

        let result = std::panic::catch_unwind(move || {
            let _guard = flights2.try_acquire("pulselive").unwrap();
            panic!("crawl blew up");
        });
        assert!(result.is_err());
        assert!(!flights.is_active("pulselive"));
    }
}
