//! Persistence collaborators for registrations and the backfill checkpoint.
//!
//! Every store treats a duplicate signature as a successful no-op
//! ([`UpsertOutcome::AlreadyExists`]); the signature is the identity key
//! across restarts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::types::{
    BackfillState, DomainFilter, DomainPage, DomainRegistration, Pagination, TransactionRecord,
};
use crate::utils::error::Result;

pub mod file;
pub mod memory;
pub mod postgres;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    AlreadyExists,
}

impl UpsertOutcome {
    #[must_use]
    pub fn is_inserted(self) -> bool {
        matches!(self, UpsertOutcome::Inserted)
    }
}

#[async_trait]
pub trait DomainStore: Send + Sync {
    async fn find_by_signature(&self, signature: &str) -> Result<Option<DomainRegistration>>;

    /// Inserts unless a registration with the same signature exists.
    async fn upsert(&self, domain: &DomainRegistration) -> Result<UpsertOutcome>;

    async fn count(&self, filter: &DomainFilter) -> Result<u64>;

    /// Matching registrations, newest timestamp first.
    async fn query(
        &self,
        filter: &DomainFilter,
        pagination: Pagination,
    ) -> Result<Vec<DomainRegistration>>;

    async fn page(&self, filter: &DomainFilter, pagination: Pagination) -> Result<DomainPage> {
        let total = self.count(filter).await?;
        let domains = self.query(filter, pagination).await?;
        Ok(DomainPage::new(domains, total, pagination))
    }
}

/// Everything one backfill run persists, applied as a unit.
#[derive(Debug, Clone, Default)]
pub struct BackfillCommit {
    pub domains: Vec<DomainRegistration>,
    pub transactions: Vec<TransactionRecord>,
    pub state: BackfillState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitSummary {
    /// Registrations that were new to the store.
    pub inserted_domains: Vec<DomainRegistration>,
    pub inserted_transactions: usize,
    pub duplicate_domains: usize,
}

/// Checkpoint plus audit-log totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillStatus {
    pub state: Option<BackfillState>,
    pub transactions_recorded: u64,
    /// Distinct domain names seen in the audit log.
    pub domains_detected: u64,
}

#[async_trait]
pub trait BackfillStore: DomainStore {
    async fn load_backfill_state(&self) -> Result<Option<BackfillState>>;

    async fn save_backfill_state(&self, state: &BackfillState) -> Result<()>;

    /// The subset of `signatures` already present in the audit log or the
    /// registration table.
    async fn known_signatures(&self, signatures: &[String]) -> Result<HashSet<String>>;

    /// Merges domains and transactions (deduplicated by signature) and
    /// stores the new checkpoint in one step.
    async fn commit_backfill(&self, commit: BackfillCommit) -> Result<CommitSummary>;

    async fn backfill_status(&self) -> Result<BackfillStatus>;
}
