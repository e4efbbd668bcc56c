//! Live transaction sources for the watcher.
//!
//! Two interchangeable strategies produce the same event stream: polling
//! `getSignaturesForAddress` ([`poller::Poller`]) and a `logsSubscribe`
//! push subscription ([`websocket::WebSocketSource`]).

use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Represents a transaction event from a source.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionEvent {
    /// A signature from RPC polling; logs must be fetched separately
    Signature {
        signature: String,
        slot: u64,
        block_time: Option<i64>,
        failed: bool,
    },
    /// A signature with its logs, pushed by `logsSubscribe`
    LogEvent {
        signature: String,
        logs: Vec<String>,
        err: Option<serde_json::Value>,
        slot: u64,
    },
}

impl TransactionEvent {
    /// Returns the signature associated with this event.
    pub fn signature(&self) -> &str {
        match self {
            TransactionEvent::Signature { signature, .. }
            | TransactionEvent::LogEvent { signature, .. } => signature,
        }
    }

    /// Returns the slot associated with this event.
    pub fn slot(&self) -> u64 {
        match self {
            TransactionEvent::Signature { slot, .. } | TransactionEvent::LogEvent { slot, .. } => {
                *slot
            }
        }
    }

    /// Execution failed on chain.
    pub fn failed(&self) -> bool {
        match self {
            TransactionEvent::Signature { failed, .. } => *failed,
            TransactionEvent::LogEvent { err, .. } => err.as_ref().is_some_and(|e| !e.is_null()),
        }
    }
}

/// How the watcher paces calls to [`TransactionSource::next_batch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// `next_batch` returns immediately; the watcher sleeps `interval` between polls
    Polling { interval: Duration },
    /// `next_batch` waits for pushed events
    Subscription,
}

/// Unified interface for transaction sources (Polling or WebSocket)
#[async_trait]
pub trait TransactionSource: Send + Sync {
    /// Reaches the upstream once before the watcher reports itself running.
    ///
    /// Failures here are start-time errors and are returned to the caller of
    /// `DomainWatcher::start`.
    async fn initialize(&mut self) -> Result<()>;

    /// Get the next batch of transaction events, oldest first.
    async fn next_batch(&mut self) -> Result<Vec<TransactionEvent>>;

    /// Releases upstream resources (e.g. `logsUnsubscribe`).
    async fn close(&mut self) {}

    fn kind(&self) -> SourceKind;

    /// Get a human-readable name for this source (for logging)
    fn source_name(&self) -> &str;
}

pub mod poller;
pub mod websocket;
