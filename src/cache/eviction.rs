//! Eviction Ranking Module
//!
//! Orders eviction candidates using remaining TTL as a recency proxy.
//!
//! No access recency is tracked. The candidate with the least remaining TTL is
//! evicted first; ties go to the entry inserted earliest. Entries without an
//! expiry rank last, and pinned entries are never candidates.

use std::cmp::Ordering;

// == Eviction Candidate ==
/// A key considered for eviction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictionCandidate {
    /// Candidate key
    pub key: String,
    /// Remaining TTL in milliseconds, None = no expiry
    pub ttl_remaining_ms: Option<u64>,
    /// Insertion timestamp (Unix milliseconds), 0 when unknown
    pub inserted_at: u64,
}

impl EvictionCandidate {
    /// Creates a candidate.
    pub fn new(key: impl Into<String>, ttl_remaining_ms: Option<u64>, inserted_at: u64) -> Self {
        Self {
            key: key.into(),
            ttl_remaining_ms,
            inserted_at,
        }
    }

    fn priority(&self, other: &Self) -> Ordering {
        let ttl = |c: &Self| c.ttl_remaining_ms.unwrap_or(u64::MAX);
        ttl(self)
            .cmp(&ttl(other))
            .then(self.inserted_at.cmp(&other.inserted_at))
            .then_with(|| self.key.cmp(&other.key))
    }
}

// == Select Victims ==
/// Returns up to `count` keys in eviction order.
pub fn select_victims(mut candidates: Vec<EvictionCandidate>, count: usize) -> Vec<String> {
    if count == 0 || candidates.is_empty() {
        return Vec::new();
    }
    candidates.sort_by(|a, b| a.priority(b));
    candidates
        .into_iter()
        .take(count)
        .map(|c| c.key)
        .collect()
}
