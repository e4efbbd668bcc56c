//! In-process store, used by tests and as the working set of the JSON store.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

use super::{
    BackfillCommit, BackfillStatus, BackfillStore, CommitSummary, DomainStore, UpsertOutcome,
};
use crate::types::{BackfillState, DomainFilter, DomainRegistration, Pagination, TransactionRecord};
use crate::utils::error::Result;

/// Registrations, audit records and checkpoint held in memory.
#[derive(Debug, Clone, Default)]
pub(crate) struct Ledger {
    pub(crate) domains: HashMap<String, DomainRegistration>,
    pub(crate) transactions: HashMap<String, TransactionRecord>,
    pub(crate) state: Option<BackfillState>,
}

impl Ledger {
    pub(crate) fn from_parts(
        domains: Vec<DomainRegistration>,
        transactions: Vec<TransactionRecord>,
        state: Option<BackfillState>,
    ) -> Self {
        let mut ledger = Self {
            state,
            ..Self::default()
        };
        for domain in domains {
            ledger.domains.entry(domain.signature.clone()).or_insert(domain);
        }
        for tx in transactions {
            ledger.transactions.entry(tx.signature.clone()).or_insert(tx);
        }
        ledger
    }

    pub(crate) fn upsert(&mut self, domain: &DomainRegistration) -> UpsertOutcome {
        if self.domains.contains_key(&domain.signature) {
            return UpsertOutcome::AlreadyExists;
        }
        self.domains
            .insert(domain.signature.clone(), domain.clone());
        UpsertOutcome::Inserted
    }

    pub(crate) fn count(&self, filter: &DomainFilter) -> u64 {
        self.domains.values().filter(|d| filter.matches(d)).count() as u64
    }

    pub(crate) fn query(&self, filter: &DomainFilter, pagination: Pagination) -> Vec<DomainRegistration> {
        newest_first(self.domains.values().filter(|d| filter.matches(d)))
            .into_iter()
            .skip(pagination.offset())
            .take(pagination.limit as usize)
            .cloned()
            .collect()
    }

    pub(crate) fn known(&self, signatures: &[String]) -> HashSet<String> {
        signatures
            .iter()
            .filter(|sig| self.transactions.contains_key(*sig) || self.domains.contains_key(*sig))
            .cloned()
            .collect()
    }

    pub(crate) fn apply(&mut self, commit: BackfillCommit) -> CommitSummary {
        let mut summary = CommitSummary::default();
        for domain in commit.domains {
            match self.upsert(&domain) {
                UpsertOutcome::Inserted => summary.inserted_domains.push(domain),
                UpsertOutcome::AlreadyExists => summary.duplicate_domains += 1,
            }
        }
        for tx in commit.transactions {
            if !self.transactions.contains_key(&tx.signature) {
                self.transactions.insert(tx.signature.clone(), tx);
                summary.inserted_transactions += 1;
            }
        }
        self.state = Some(commit.state);
        summary
    }

    pub(crate) fn status(&self) -> BackfillStatus {
        let detected: HashSet<&str> = self
            .transactions
            .values()
            .map(|tx| tx.domain.as_str())
            .filter(|domain| !domain.is_empty())
            .collect();
        BackfillStatus {
            state: self.state.clone(),
            transactions_recorded: self.transactions.len() as u64,
            domains_detected: detected.len() as u64,
        }
    }

    /// Registrations newest first, for stable file output.
    pub(crate) fn sorted_domains(&self) -> Vec<&DomainRegistration> {
        newest_first(self.domains.values())
    }

    /// `sorted_domains` as it would read after inserting `domain`.
    pub(crate) fn sorted_domains_with<'a>(
        &'a self,
        domain: &'a DomainRegistration,
    ) -> Vec<&'a DomainRegistration> {
        newest_first(self.domains.values().chain(std::iter::once(domain)))
    }

    pub(crate) fn sorted_transactions(&self) -> Vec<TransactionRecord> {
        let mut txs: Vec<TransactionRecord> = self.transactions.values().cloned().collect();
        txs.sort_by(|a, b| b.slot.cmp(&a.slot).then_with(|| a.signature.cmp(&b.signature)));
        txs
    }
}

/// Newest timestamp first; ties broken by signature.
fn newest_first<'a>(
    domains: impl Iterator<Item = &'a DomainRegistration>,
) -> Vec<&'a DomainRegistration> {
    let mut sorted: Vec<&DomainRegistration> = domains.collect();
    sorted.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| a.signature.cmp(&b.signature))
    });
    sorted
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    ledger: RwLock<Ledger>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn transactions(&self) -> Vec<TransactionRecord> {
        self.ledger.read().await.sorted_transactions()
    }
}

#[async_trait]
impl DomainStore for MemoryStore {
    async fn find_by_signature(&self, signature: &str) -> Result<Option<DomainRegistration>> {
        Ok(self.ledger.read().await.domains.get(signature).cloned())
    }

    async fn upsert(&self, domain: &DomainRegistration) -> Result<UpsertOutcome> {
        Ok(self.ledger.write().await.upsert(domain))
    }

    async fn count(&self, filter: &DomainFilter) -> Result<u64> {
        Ok(self.ledger.read().await.count(filter))
    }

    async fn query(
        &self,
        filter: &DomainFilter,
        pagination: Pagination,
    ) -> Result<Vec<DomainRegistration>> {
        Ok(self.ledger.read().await.query(filter, pagination))
    }
}

#[async_trait]
impl BackfillStore for MemoryStore {
    async fn load_backfill_state(&self) -> Result<Option<BackfillState>> {
        Ok(self.ledger.read().await.state.clone())
    }

    async fn save_backfill_state(&self, state: &BackfillState) -> Result<()> {
        self.ledger.write().await.state = Some(state.clone());
        Ok(())
    }

    async fn known_signatures(&self, signatures: &[String]) -> Result<HashSet<String>> {
        Ok(self.ledger.read().await.known(signatures))
    }

    async fn commit_backfill(&self, commit: BackfillCommit) -> Result<CommitSummary> {
        Ok(self.ledger.write().await.apply(commit))
    }

    async fn backfill_status(&self) -> Result<BackfillStatus> {
        Ok(self.ledger.read().await.status())
    }
}
