//! Cache Statistics Module
//!
//! Tracks local store performance metrics including hits, misses, and evictions.

use serde::Serialize;

// == Local Stats ==
/// Tracks local store performance metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LocalStats {
    /// Number of successful local retrievals
    pub hits: u64,
    /// Number of failed local retrievals (key not found or expired)
    pub misses: u64,
    /// Number of entries evicted for capacity or by explicit eviction
    pub evictions: u64,
    /// Number of entries removed by TTL expiry
    pub expirations: u64,
    /// Current number of entries in the store
    pub total_entries: usize,
    /// Current number of pinned entries
    pub pinned_entries: usize,
    /// Configured capacity
    pub capacity: usize,
}

impl LocalStats {
    // == Constructor ==
    /// Creates a new LocalStats with all counters at zero.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    // == Hit Rate ==
    /// Calculates the hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }

    pub fn record_expirations(&mut self, count: usize) {
        self.expirations += count as u64;
    }
}
