//! Diagnostic counters for the validator.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Running counters, updated lock-free by concurrent validations.
#[derive(Debug, Default)]
pub struct ValidatorStats {
    hits: AtomicU64,
    misses: AtomicU64,
    upstream_errors: AtomicU64,
    cache_write_failures: AtomicU64,
    coalesced: AtomicU64,
    follow_ups: AtomicU64,
}

impl ValidatorStats {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_upstream_error(&self) {
        self.upstream_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_write_failure(&self) {
        self.cache_write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_follow_up(&self) {
        self.follow_ups.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy of the counters.
    pub fn snapshot(&self) -> ValidatorStatsSnapshot {
        ValidatorStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            upstream_errors: self.upstream_errors.load(Ordering::Relaxed),
            cache_write_failures: self.cache_write_failures.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            follow_ups: self.follow_ups.load(Ordering::Relaxed),
        }
    }
}

/// Validator counters at one point in time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorStatsSnapshot {
    /// Validations answered with a cached membership
    pub hits: u64,
    /// Validations that found nothing in the cache
    pub misses: u64,
    /// Upstream calls that failed
    pub upstream_errors: u64,
    /// Fetched memberships that could not be cached
    pub cache_write_failures: u64,
    /// Misses that waited on another caller's in-flight fetch
    pub coalesced: u64,
    /// Coalesced waiters that asked about other groups and made their own
    /// upstream call
    pub follow_ups: u64,
}

impl ValidatorStatsSnapshot {
    /// Fraction of validations served from the cache.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
