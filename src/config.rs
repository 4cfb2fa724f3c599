//! Centralized tunable constants (spec §6, §10.3).
//!
//! Every magic number named in the spec lives here, not scattered across
//! `sync::engine` and `db::queue` as bare `const`s. Tests shrink the
//! time-based windows; production uses `SyncConfig::default()`.

use std::time::Duration;

/// Tunables governing the sync engine and queue behavior.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Retry budget before an operation is dead-lettered.
    pub max_retry: u32,
    /// Upper bound on concurrent remote operations per drain batch.
    pub max_concurrent_operations: usize,
    /// Per-operation remote transaction timeout.
    pub transaction_timeout: Duration,
    /// Minimum spacing between `trigger_sync` attempts.
    pub min_sync_interval: Duration,
    /// Debounce window after a network reconnect edge before draining.
    pub network_reconnect_debounce: Duration,
    /// Interval between periodic background pulls.
    pub periodic_pull_interval: Duration,
    /// Failure rate (0.0-1.0) that trips the circuit breaker.
    pub circuit_breaker_failure_rate: f64,
    /// Minimum sample size before the failure rate is evaluated.
    pub circuit_breaker_min_sample: usize,
    /// How long the circuit stays open once tripped.
    pub circuit_breaker_reset_after: Duration,
    /// Age at which a settled soft-deleted row is eligible for hard removal
    /// by the housekeeping pass, independent of normal hard-delete-on-confirm.
    pub stale_tombstone_gc: Duration,
    /// Window of food-log history pulled on first sync.
    pub initial_pull_window: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retry: 10,
            max_concurrent_operations: 5,
            transaction_timeout: Duration::from_secs(30),
            min_sync_interval: Duration::from_secs(30),
            network_reconnect_debounce: Duration::from_secs(3),
            periodic_pull_interval: Duration::from_secs(1800),
            circuit_breaker_failure_rate: 0.8,
            circuit_breaker_min_sample: 5,
            circuit_breaker_reset_after: Duration::from_secs(300),
            stale_tombstone_gc: Duration::from_secs(30 * 24 * 3600),
            initial_pull_window: Duration::from_secs(90 * 24 * 3600),
        }
    }
}

impl SyncConfig {
    /// Exponential backoff for a given retry attempt (0-indexed), capped at
    /// 300s: `min(2^(retry_count+1), 300)` (spec §4.4 step 5).
    pub fn backoff_for(&self, retry_count: u32) -> Duration {
        let capped_exp = retry_count.min(62);
        let seconds = 2u64.saturating_pow(capped_exp + 1).min(300);
        Duration::from_secs(seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_series_matches_spec_e4() {
        let cfg = SyncConfig::default();
        let expected = [2u64, 4, 8, 16, 32, 64, 128, 256, 300, 300];
        for (i, &want) in expected.iter().enumerate() {
            assert_eq!(cfg.backoff_for(i as u32).as_secs(), want, "retry {i}");
        }
    }
}
