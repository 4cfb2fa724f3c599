//! Drain circuit breaker (spec §4.4.2).
//!
//! Shaped like the teacher pack's window-based breakers (see
//! `kikokikok-aeterna/memory/src/circuit_breaker.rs`) but evaluated once
//! per drain batch rather than over a rolling time window, since that is
//! the unit the spec defines trip/reset in terms of.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::SyncConfig;

pub struct CircuitBreaker {
    clock: Arc<dyn Clock>,
    reset_after_secs: i64,
    failure_rate_threshold: f64,
    min_sample: usize,
    open_until: Mutex<Option<i64>>,
}

impl CircuitBreaker {
    pub fn new(clock: Arc<dyn Clock>, config: &SyncConfig) -> Self {
        Self {
            clock,
            reset_after_secs: config.circuit_breaker_reset_after.as_secs() as i64,
            failure_rate_threshold: config.circuit_breaker_failure_rate,
            min_sample: config.circuit_breaker_min_sample,
            open_until: Mutex::new(None),
        }
    }

    /// Whether the drain should be skipped at step 3 right now.
    pub fn is_open(&self) -> bool {
        matches!(*self.open_until.lock(), Some(t) if self.clock.now() < t)
    }

    /// Feed the outcome of one drain batch. Trips the breaker if the batch
    /// was large and bad enough; otherwise closes it if the batch shows at
    /// least two successes.
    pub fn record_batch(&self, attempted: usize, failed: usize) {
        if attempted == 0 {
            return;
        }
        let failure_rate = failed as f64 / attempted as f64;
        let successes = attempted - failed;
        let mut open_until = self.open_until.lock();

        if attempted >= self.min_sample && failure_rate >= self.failure_rate_threshold {
            let reset_at = self.clock.now() + self.reset_after_secs;
            warn!(attempted, failed, reset_at, "circuit breaker tripped");
            *open_until = Some(reset_at);
        } else if successes >= 2 && open_until.is_some() {
            info!(attempted, successes, "circuit breaker reset");
            *open_until = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;

    fn breaker() -> (FakeClock, CircuitBreaker) {
        let clock = FakeClock::default();
        let cb = CircuitBreaker::new(Arc::new(clock.clone()), &SyncConfig::default());
        (clock, cb)
    }

    #[test]
    fn trips_on_high_failure_rate_over_min_sample() {
        let (_clock, cb) = breaker();
        assert!(!cb.is_open());
        cb.record_batch(5, 4);
        assert!(cb.is_open());
    }

    #[test]
    fn does_not_trip_below_min_sample() {
        let (_clock, cb) = breaker();
        cb.record_batch(3, 3);
        assert!(!cb.is_open());
    }

    #[test]
    fn does_not_trip_below_failure_rate() {
        let (_clock, cb) = breaker();
        cb.record_batch(5, 3);
        assert!(!cb.is_open());
    }

    #[test]
    fn resets_after_two_successes_in_a_later_batch() {
        let (_clock, cb) = breaker();
        cb.record_batch(5, 5);
        assert!(cb.is_open());
        cb.record_batch(3, 1);
        assert!(!cb.is_open());
    }

    #[test]
    fn resets_after_timeout_elapses() {
        let (clock, cb) = breaker();
        cb.record_batch(5, 5);
        assert!(cb.is_open());
        clock.advance(301);
        assert!(!cb.is_open());
    }
}
