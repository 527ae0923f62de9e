//! Health Tracker
//!
//! Records whether the durable backend is currently reachable.
//!
//! State machine: `Ready ⇄ Degraded`. Any durable failure moves to `Degraded`;
//! only a successful liveness probe moves back to `Ready`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::current_timestamp_ms;

// == Backend State ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendState {
    Ready,
    Degraded,
}

// == Health Tracker ==
/// Process-wide reachability state of the durable backend.
#[derive(Debug)]
pub struct HealthTracker {
    ready: AtomicBool,
    /// Unix ms of the last transition into Degraded, 0 while Ready
    degraded_since: AtomicU64,
    /// Durable failures observed since startup
    failures: AtomicU64,
}

impl HealthTracker {
    /// Creates a tracker starting in `Degraded`; a probe must succeed first.
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
            degraded_since: AtomicU64::new(current_timestamp_ms()),
            failures: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> BackendState {
        if self.is_ready() {
            BackendState::Ready
        } else {
            BackendState::Degraded
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Records a durable failure during `operation`.
    pub fn mark_degraded(&self, operation: &str, reason: &str) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        if self.ready.swap(false, Ordering::AcqRel) {
            self.degraded_since
                .store(current_timestamp_ms(), Ordering::Release);
            warn!(
                "Durable backend degraded during {}: {}; serving from local store",
                operation, reason
            );
        } else {
            debug!("Durable {} failed while degraded: {}", operation, reason);
        }
    }

    /// Records a successful liveness probe.
    pub fn mark_ready(&self) {
        if !self.ready.swap(true, Ordering::AcqRel) {
            self.degraded_since.store(0, Ordering::Release);
            info!("Durable backend reachable, leaving degraded mode");
        }
    }

    /// Unix ms when the current degraded period began, None while Ready.
    pub fn degraded_since(&self) -> Option<u64> {
        match self.degraded_since.load(Ordering::Acquire) {
            0 => None,
            since => Some(since),
        }
    }

    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}
