//! Watcher statistics and the events pushed to feed subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::registration::DomainRegistration;

/// Counters for one watcher session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatcherStats {
    pub total_processed: u64,
    pub domains_found: u64,
    pub last_signature: Option<String>,
    pub is_connected: bool,
    pub start_time: DateTime<Utc>,
}

impl WatcherStats {
    /// Zeroed, disconnected stats starting now.
    #[must_use]
    pub fn idle() -> Self {
        Self {
            total_processed: 0,
            domains_found: 0,
            last_signature: None,
            is_connected: false,
            start_time: Utc::now(),
        }
    }
}

impl Default for WatcherStats {
    fn default() -> Self {
        Self::idle()
    }
}

/// Frame pushed over the event feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum IndexerEvent {
    NewDomain { domain: DomainRegistration },
    Stats { stats: WatcherStats },
}

impl IndexerEvent {
    /// Serializes the event as one newline-terminated JSON line.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the event cannot be encoded.
    pub fn to_frame(&self) -> crate::utils::error::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Answer of the control surface's status operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatcherStatus {
    pub is_running: bool,
    pub stats: WatcherStats,
}
