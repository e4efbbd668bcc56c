//! Live watcher service.
//!
//! `DomainWatcher` owns one background task that drains a
//! [`TransactionSource`], turns registrations into [`DomainRegistration`]s,
//! persists them and publishes events. The store and broadcaster are
//! injected; one watcher is expected per process.

use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{CommitmentLevel, IndexerConfig, SourceConfig, WatcherConfig};
use crate::core::broadcaster::EventBroadcaster;
use crate::core::dedup::{deduplicator, SignatureDeduplicator};
use crate::core::fetcher::Fetcher;
use crate::core::parser::LogParser;
use crate::core::stats::StatsAggregator;
use crate::storage::DomainStore;
use crate::streams::poller::Poller;
use crate::streams::websocket::WebSocketSource;
use crate::streams::{SourceKind, TransactionEvent, TransactionSource};
use crate::types::{DomainRegistration, IndexerEvent, WatcherStats, WatcherStatus};
use crate::utils::error::Result;
use crate::utils::logging::{log, log_error, log_registration, LogLevel};
use crate::utils::rpc::RpcProvider;

enum RunState {
    Stopped,
    Running {
        cancel: CancellationToken,
        handle: JoinHandle<()>,
    },
}

struct WatcherContext {
    program_id: Pubkey,
    config: WatcherConfig,
    fetcher: Fetcher,
    parser: Arc<LogParser>,
    store: Arc<dyn DomainStore>,
    broadcaster: EventBroadcaster,
    stats: Arc<StatsAggregator>,
}

/// Start/stop/status control surface over the live ingestion task.
pub struct DomainWatcher {
    source: SourceConfig,
    commitment: CommitmentLevel,
    context: Arc<WatcherContext>,
    state: Mutex<RunState>,
}

impl DomainWatcher {
    pub fn new(
        config: &IndexerConfig,
        rpc: Arc<dyn RpcProvider>,
        parser: Arc<LogParser>,
        store: Arc<dyn DomainStore>,
        broadcaster: EventBroadcaster,
    ) -> Self {
        Self {
            source: config.source.clone(),
            commitment: config.commitment_level,
            context: Arc::new(WatcherContext {
                program_id: config.program_id,
                config: config.watcher.clone(),
                fetcher: Fetcher::with_provider(rpc),
                parser,
                store,
                broadcaster,
                stats: Arc::new(StatsAggregator::new()),
            }),
            state: Mutex::new(RunState::Stopped),
        }
    }

    /// Starts the strategy selected by the source configuration.
    ///
    /// # Errors
    ///
    /// Returns the source's error when the upstream cannot be reached; the
    /// watcher stays stopped in that case.
    pub async fn start(&self) -> Result<()> {
        let source: Box<dyn TransactionSource> = match &self.source {
            SourceConfig::Rpc {
                poll_interval_secs,
                page_size,
                ..
            } => Box::new(Poller::new(
                self.context.fetcher.provider(),
                self.context.program_id,
                *page_size,
                Duration::from_secs(*poll_interval_secs),
            )),
            SourceConfig::WebSocket {
                ws_url,
                reconnect_delay_secs,
                ..
            } => Box::new(WebSocketSource::new(
                ws_url.clone(),
                self.context.program_id,
                self.commitment,
                *reconnect_delay_secs,
            )),
        };
        self.start_with_source(source).await
    }

    /// Starts the watcher over an explicit source. A no-op while running.
    #[tracing::instrument(skip_all, fields(source = source.source_name()))]
    pub async fn start_with_source(&self, mut source: Box<dyn TransactionSource>) -> Result<()> {
        let mut state = self.state.lock().await;
        if let RunState::Running { handle, .. } = &*state {
            if !handle.is_finished() {
                tracing::debug!("Watcher already running");
                return Ok(());
            }
        }

        source
            .initialize()
            .await
            .inspect_err(|e| log_error("Watcher start", &e.to_string()))?;

        let ctx = &self.context;
        ctx.stats.reset();
        ctx.stats.set_connected(true);
        ctx.broadcaster.publish_stats(ctx.stats.snapshot());

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(Arc::clone(ctx), source, cancel.clone()));
        *state = RunState::Running { cancel, handle };

        log(
            LogLevel::Success,
            &format!("Watcher started for {}", ctx.program_id),
        );
        Ok(())
    }

    /// Stops the watcher and waits for the task to finish. A no-op when stopped.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        let RunState::Running { cancel, handle } = std::mem::replace(&mut *state, RunState::Stopped)
        else {
            return;
        };

        cancel.cancel();
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Watcher task ended abnormally");
        }

        let ctx = &self.context;
        ctx.stats.set_connected(false);
        ctx.broadcaster.publish_stats(ctx.stats.snapshot());
        log(LogLevel::Info, "Watcher stopped");
    }

    pub async fn status(&self) -> WatcherStatus {
        let is_running = match &*self.state.lock().await {
            RunState::Running { handle, .. } => !handle.is_finished(),
            RunState::Stopped => false,
        };
        WatcherStatus {
            is_running,
            stats: self.context.stats.snapshot(),
        }
    }

    #[must_use]
    pub fn stats(&self) -> WatcherStats {
        self.context.stats.snapshot()
    }
}

async fn run(
    ctx: Arc<WatcherContext>,
    mut source: Box<dyn TransactionSource>,
    cancel: CancellationToken,
) {
    let mut dedup = deduplicator(ctx.config.dedup_capacity);
    let kind = source.kind();
    tracing::info!(source = source.source_name(), "Watcher loop running");

    while !cancel.is_cancelled() {
        // Push sources block until events arrive; polls run to completion.
        let batch = match kind {
            SourceKind::Subscription => tokio::select! {
                () = cancel.cancelled() => break,
                batch = source.next_batch() => batch,
            },
            SourceKind::Polling { .. } => source.next_batch().await,
        };

        let pause = match batch {
            Ok(events) => {
                ctx.set_connected(true);
                let idle = events.is_empty();
                for event in events {
                    if cancel.is_cancelled() {
                        break;
                    }
                    if ctx.handle_event(event, dedup.as_mut()).await {
                        ctx.pause(ctx.config.signature_delay(), &cancel).await;
                    }
                }
                match kind {
                    SourceKind::Polling { .. } if idle => ctx.config.idle_backoff(),
                    SourceKind::Polling { interval } => interval,
                    SourceKind::Subscription => Duration::ZERO,
                }
            }
            Err(e) => {
                log_error(source.source_name(), &e.to_string());
                ctx.set_connected(false);
                match kind {
                    // Subscriptions wait out their own reconnect delay.
                    SourceKind::Subscription => Duration::ZERO,
                    SourceKind::Polling { .. } => ctx.config.error_backoff(),
                }
            }
        };

        ctx.pause(pause, &cancel).await;
    }

    source.close().await;
    tracing::info!(processed = ctx.stats.snapshot().total_processed, "Watcher loop exited");
}

impl WatcherContext {
    async fn pause(&self, duration: Duration, cancel: &CancellationToken) {
        if duration.is_zero() {
            return;
        }
        tokio::select! {
            () = cancel.cancelled() => {}
            () = tokio::time::sleep(duration) => {}
        }
    }

    fn set_connected(&self, connected: bool) {
        if self.stats.snapshot().is_connected != connected {
            self.stats.set_connected(connected);
            self.broadcaster.publish_stats(self.stats.snapshot());
        }
    }

    /// Processes one event; returns `false` for duplicates within the session.
    async fn handle_event(
        &self,
        event: TransactionEvent,
        dedup: &mut dyn SignatureDeduplicator,
    ) -> bool {
        let signature = event.signature().to_string();
        if dedup.seen(&signature) {
            tracing::debug!(signature = %signature, "Duplicate signature skipped");
            return false;
        }
        dedup.mark_seen(&signature);
        self.stats.record_processed(&signature);

        if let Err(e) = self.ingest(event).await {
            tracing::warn!(signature = %signature, error = %e, "Signature not ingested");
        }

        self.broadcaster.publish_stats(self.stats.snapshot());
        true
    }

    async fn ingest(&self, event: TransactionEvent) -> Result<()> {
        if event.failed() {
            tracing::debug!(signature = event.signature(), "Failed on chain; ignored");
            return Ok(());
        }
        if self.store.find_by_signature(event.signature()).await?.is_some() {
            tracing::debug!(signature = event.signature(), "Already stored");
            return Ok(());
        }

        let registration = match event {
            TransactionEvent::Signature { signature, .. } => {
                match self.registration_from_fetch(&signature).await? {
                    Some(registration) => registration,
                    None => return Ok(()),
                }
            }
            TransactionEvent::LogEvent {
                signature, logs, ..
            } => {
                let Some(name) = self.parser.extract_domain(Some(logs.as_slice())) else {
                    return Ok(());
                };
                self.registration_from_push(name, signature).await
            }
        };

        if self.store.upsert(&registration).await?.is_inserted() {
            self.stats.record_domain();
            log_registration(&registration.signature, &registration.name, &registration.owner);
            self.broadcaster.publish(IndexerEvent::NewDomain {
                domain: registration,
            });
        }
        Ok(())
    }

    async fn registration_from_fetch(&self, signature: &str) -> Result<Option<DomainRegistration>> {
        let Some(tx) = self.fetcher.fetch_transaction(signature).await? else {
            tracing::warn!(signature, "Transaction not found; skipped");
            return Ok(None);
        };
        if tx.failed {
            return Ok(None);
        }

        let parsed = self.parser.parse(&tx);
        let Some(name) = parsed.domain else {
            return Ok(None);
        };
        if parsed.owner.is_none() {
            tracing::debug!(signature, name = %name, "Owner not determinable; recorded without one");
        }
        let owner = parsed.owner.unwrap_or_default();
        Ok(Some(DomainRegistration::from_transaction(name, owner, &tx)))
    }

    /// Pushed logs already carry the name; the fetch only adds block time,
    /// fee and owner, and its failure degrades to a best-effort record.
    async fn registration_from_push(&self, name: String, signature: String) -> DomainRegistration {
        if !self.config.fetch_details {
            return DomainRegistration::without_details(name, signature);
        }

        match self.fetcher.fetch_transaction(&signature).await {
            Ok(Some(tx)) => {
                let owner = self.parser.extract_owner(&tx).unwrap_or_default();
                DomainRegistration::from_transaction(name, owner, &tx)
            }
            Ok(None) => {
                tracing::warn!(signature = %signature, "Details unavailable; using log data only");
                DomainRegistration::without_details(name, signature)
            }
            Err(e) => {
                tracing::warn!(signature = %signature, error = %e, "Detail fetch failed; using log data only");
                DomainRegistration::without_details(name, signature)
            }
        }
    }
}
