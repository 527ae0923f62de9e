//! Engine report types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::LocalStats;
use crate::durable::MemoryInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// Backend currently answering as source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActiveBackend {
    Durable,
    Local,
}

// == Health Report ==
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub backend: ActiveBackend,
    /// Unix ms when the current degraded period began
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded_since: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

// == Durable Stats ==
#[derive(Debug, Clone, Default, Serialize)]
pub struct DurableStats {
    pub keys: usize,
    pub pinned_keys: usize,
    pub memory: MemoryInfo,
}

// == Engine Stats ==
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub status: HealthStatus,
    /// Gets answered by either backend
    pub hits: u64,
    /// Gets answered by neither backend
    pub misses: u64,
    pub hit_rate: f64,
    pub local: LocalStats,
    /// Absent when the durable backend is unreachable or not configured
    pub durable: Option<DurableStats>,
    pub durable_failures: u64,
}

// == Warm Report ==
/// Outcome counts of a warm run. Informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WarmReport {
    pub requested: usize,
    pub hits: usize,
    pub misses: usize,
    pub failed: usize,
}
