//! Session counters shared between the watcher task and its control handle.

use chrono::Utc;
use std::sync::{PoisonError, RwLock};

use crate::types::WatcherStats;

#[derive(Debug, Default)]
pub struct StatsAggregator {
    inner: RwLock<WatcherStats>,
}

impl StatsAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new session: zero counters, fresh start time, disconnected.
    pub fn reset(&self) {
        let mut stats = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *stats = WatcherStats {
            start_time: Utc::now(),
            ..WatcherStats::idle()
        };
    }

    pub fn set_connected(&self, connected: bool) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .is_connected = connected;
    }

    pub fn record_processed(&self, signature: &str) {
        let mut stats = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        stats.total_processed += 1;
        stats.last_signature = Some(signature.to_string());
    }

    pub fn record_domain(&self) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .domains_found += 1;
    }

    #[must_use]
    pub fn snapshot(&self) -> WatcherStats {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
