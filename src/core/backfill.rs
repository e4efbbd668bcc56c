//! Historical backfill.
//!
//! Each run walks one page further back from the persisted cursor, fetches
//! the transactions it has not recorded yet, and commits registrations,
//! audit records and the advanced cursor together at the end. Nothing is
//! persisted mid-page.

use chrono::Utc;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::{BackfillConfig, MAX_PAGE_SIZE};
use crate::core::broadcaster::EventBroadcaster;
use crate::core::fetcher::Fetcher;
use crate::core::parser::LogParser;
use crate::storage::{BackfillCommit, BackfillStore};
use crate::types::{BackfillState, DomainRegistration, IndexerEvent, RawTransaction, TransactionRecord};
use crate::utils::error::Result;
use crate::utils::logging::{log, log_batch, LogLevel};
use crate::utils::rpc::RpcProvider;

pub use crate::storage::BackfillStatus;

/// Outcome of one backfill run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    /// Cursor the page was requested before.
    pub cursor: Option<String>,
    pub page_size: usize,
    /// Signatures returned by the upstream page.
    pub signatures: usize,
    /// Signatures skipped because they were already recorded.
    pub already_known: usize,
    pub fetched: usize,
    pub fetch_failures: usize,
    /// Transactions that failed on chain.
    pub failed_transactions: usize,
    /// Transactions in which a domain name was found.
    pub domains_detected: usize,
    /// Registrations (name and owner) emitted this run.
    pub registrations: usize,
    pub new_domains: Vec<DomainRegistration>,
    /// The upstream page was empty.
    pub exhausted: bool,
    pub cancelled: bool,
    /// Checkpoint after the run.
    pub state: Option<BackfillState>,
}

pub struct BackfillEngine {
    program_id: Pubkey,
    config: BackfillConfig,
    rpc: Arc<dyn RpcProvider>,
    fetcher: Fetcher,
    parser: Arc<LogParser>,
    store: Arc<dyn BackfillStore>,
    broadcaster: Option<EventBroadcaster>,
    cancellation_token: CancellationToken,
}

impl BackfillEngine {
    pub fn new(
        program_id: Pubkey,
        config: BackfillConfig,
        rpc: Arc<dyn RpcProvider>,
        parser: Arc<LogParser>,
        store: Arc<dyn BackfillStore>,
    ) -> Self {
        Self {
            program_id,
            config,
            fetcher: Fetcher::with_provider(Arc::clone(&rpc)),
            rpc,
            parser,
            store,
            broadcaster: None,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Publishes newly inserted registrations after each commit.
    #[must_use]
    pub fn with_broadcaster(mut self, broadcaster: EventBroadcaster) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    pub async fn status(&self) -> Result<BackfillStatus> {
        self.store.backfill_status().await
    }

    /// Runs one page of backfill. `limit` overrides the configured page size.
    ///
    /// # Errors
    ///
    /// Fails when the signature page cannot be obtained or the store rejects
    /// the commit. Individual transaction fetch failures are only counted.
    #[tracing::instrument(skip_all, fields(program_id = %self.program_id, limit = ?limit))]
    pub async fn run(&self, limit: Option<usize>) -> Result<BackfillReport> {
        let started = Instant::now();
        let page_size = limit.unwrap_or(self.config.page_size).clamp(1, MAX_PAGE_SIZE);

        let previous = self.store.load_backfill_state().await?;
        let cursor = match &previous {
            Some(state) => state.last_processed_signature.clone(),
            None => self.config.start_signature.clone(),
        };

        let mut report = BackfillReport {
            cursor: cursor.clone(),
            page_size,
            state: previous.clone(),
            ..BackfillReport::default()
        };

        log(
            LogLevel::Info,
            &format!(
                "Backfill: requesting {page_size} signatures before {}",
                cursor.as_deref().unwrap_or("<newest>")
            ),
        );

        let page = self
            .rpc
            .get_signatures(&self.program_id, cursor.as_deref(), page_size)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Backfill aborted: signature page unavailable"))?;

        report.signatures = page.len();
        let Some(oldest) = page.last().map(|info| info.signature.clone()) else {
            log(LogLevel::Success, "Backfill: history exhausted, nothing to do");
            report.exhausted = true;
            return Ok(report);
        };

        let signatures: Vec<String> = page.iter().map(|info| info.signature.clone()).collect();
        let known = self.store.known_signatures(&signatures).await?;
        let pending: Vec<String> = signatures
            .into_iter()
            .filter(|sig| !known.contains(sig))
            .collect();
        report.already_known = known.len();

        let previous_total = previous.as_ref().map_or(0, |s| s.total_transactions);

        if pending.is_empty() {
            let state = BackfillState {
                last_processed_signature: Some(oldest),
                total_transactions: previous_total,
                last_run: Utc::now(),
            };
            self.store.save_backfill_state(&state).await?;
            log(
                LogLevel::Info,
                "Backfill: page already recorded, cursor advanced",
            );
            report.state = Some(state);
            return Ok(report);
        }

        let mut domains = Vec::new();
        let mut transactions = Vec::new();
        let delay = Duration::from_millis(self.config.fetch_delay_ms);
        let chunks: Vec<&[String]> = pending.chunks(self.config.concurrency.max(1)).collect();

        for (index, chunk) in chunks.iter().enumerate() {
            if self.cancellation_token.is_cancelled() {
                log(LogLevel::Warning, "Backfill cancelled; nothing persisted");
                report.cancelled = true;
                return Ok(report);
            }

            for (signature, result) in self.fetcher.fetch_transactions(chunk).await {
                match result {
                    Ok(Some(tx)) => {
                        report.fetched += 1;
                        self.collect(tx, &mut report, &mut domains, &mut transactions);
                    }
                    Ok(None) => {
                        report.fetch_failures += 1;
                        tracing::warn!(signature = %signature, "Transaction not found; skipped");
                    }
                    Err(e) => {
                        report.fetch_failures += 1;
                        tracing::warn!(signature = %signature, error = %e, "Transaction fetch failed; skipped");
                    }
                }
            }

            if index + 1 < chunks.len() && !delay.is_zero() {
                tokio::select! {
                    () = self.cancellation_token.cancelled() => {}
                    () = tokio::time::sleep(delay) => {}
                }
            }
        }

        let state = BackfillState {
            last_processed_signature: Some(oldest),
            total_transactions: previous_total + transactions.len() as u64,
            last_run: Utc::now(),
        };

        let summary = self
            .store
            .commit_backfill(BackfillCommit {
                domains,
                transactions,
                state: state.clone(),
            })
            .await?;

        if let Some(broadcaster) = &self.broadcaster {
            for domain in &summary.inserted_domains {
                broadcaster.publish(IndexerEvent::NewDomain {
                    domain: domain.clone(),
                });
            }
        }

        log_batch(
            report.fetched,
            report.signatures,
            u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        );
        tracing::info!(
            new_domains = summary.inserted_domains.len(),
            duplicates = summary.duplicate_domains,
            detected = report.domains_detected,
            cursor = state.last_processed_signature.as_deref().unwrap_or_default(),
            "Backfill run committed"
        );

        report.new_domains = summary.inserted_domains;
        report.state = Some(state);
        Ok(report)
    }

    fn collect(
        &self,
        tx: RawTransaction,
        report: &mut BackfillReport,
        domains: &mut Vec<DomainRegistration>,
        transactions: &mut Vec<TransactionRecord>,
    ) {
        if tx.failed {
            report.failed_transactions += 1;
            tracing::debug!(signature = %tx.signature, "Failed on chain; ignored");
            return;
        }

        let parsed = self.parser.parse(&tx);
        let Some(name) = parsed.domain.clone() else {
            return;
        };
        report.domains_detected += 1;

        if let Some(owner) = parsed.owner.clone() {
            domains.push(DomainRegistration::from_transaction(name.clone(), owner, &tx));
            report.registrations += 1;
        } else {
            tracing::debug!(signature = %tx.signature, name = %name, "Domain without owner");
        }

        transactions.push(TransactionRecord {
            signature: tx.signature,
            slot: tx.slot,
            block_time: tx.block_time,
            domain: name,
            owner: parsed.owner,
            transaction: tx.raw,
        });
    }
}
