//! Degradation boundary around the durable store.
//!
//! Every durable call made by the engine goes through [`GuardedDurable::call`].
//! It skips the backend while degraded, bounds each call with a timeout, and on
//! failure logs, marks the health tracker degraded and yields `None`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use super::DurableStore;
use crate::error::{DurableError, DurableResult};
use crate::health::HealthTracker;

/// Boxed future returned by durable store methods.
pub type DurableFuture<'a, T> = Pin<Box<dyn Future<Output = DurableResult<T>> + Send + 'a>>;

#[derive(Clone)]
pub struct GuardedDurable {
    store: Option<Arc<dyn DurableStore>>,
    health: Arc<HealthTracker>,
    timeout: Duration,
}

impl GuardedDurable {
    pub fn new(store: Arc<dyn DurableStore>, health: Arc<HealthTracker>, timeout: Duration) -> Self {
        Self {
            store: Some(store),
            health,
            timeout,
        }
    }

    /// A guard with no backend behind it; every call yields `None`.
    pub fn local_only(health: Arc<HealthTracker>) -> Self {
        Self {
            store: None,
            health,
            timeout: Duration::ZERO,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.store.is_some()
    }

    /// True when a backend exists and is not degraded.
    pub fn is_available(&self) -> bool {
        self.is_configured() && self.health.is_ready()
    }

    pub fn health(&self) -> &Arc<HealthTracker> {
        &self.health
    }

    /// Runs `f` against the backend unless degraded.
    ///
    /// Returns `None` when degraded, unconfigured, failed or timed out.
    pub async fn call<'a, T, F>(&'a self, operation: &'static str, f: F) -> Option<T>
    where
        F: FnOnce(&'a dyn DurableStore) -> DurableFuture<'a, T>,
    {
        let store = self.store.as_deref()?;
        if !self.health.is_ready() {
            return None;
        }
        match tokio::time::timeout(self.timeout, f(store)).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(err)) => {
                self.health.mark_degraded(operation, &err.to_string());
                None
            }
            Err(_) => {
                let err = DurableError::Timeout(self.timeout);
                self.health.mark_degraded(operation, &err.to_string());
                None
            }
        }
    }

    /// Explicit liveness probe. Runs even while degraded and is the only way
    /// back to `Ready`.
    pub async fn probe(&self) -> bool {
        let Some(store) = self.store.as_deref() else {
            return false;
        };
        match tokio::time::timeout(self.timeout, store.ping()).await {
            Ok(Ok(())) => {
                self.health.mark_ready();
                true
            }
            Ok(Err(err)) => {
                self.health.mark_degraded("ping", &err.to_string());
                false
            }
            Err(_) => {
                let err = DurableError::Timeout(self.timeout);
                self.health.mark_degraded("ping", &err.to_string());
                false
            }
        }
    }
}
