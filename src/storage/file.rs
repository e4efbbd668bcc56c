//! JSON files in a data directory: `domains.json`, `transactions.json` and
//! `backfill-state.json`.
//!
//! Files are replaced through a temp file and a rename. A backfill commit
//! writes the checkpoint last, so after a crash the data can be ahead of
//! the cursor but never behind it.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::memory::Ledger;
use super::{
    BackfillCommit, BackfillStatus, BackfillStore, CommitSummary, DomainStore, UpsertOutcome,
};
use crate::types::{BackfillState, DomainFilter, DomainRegistration, Pagination, TransactionRecord};
use crate::utils::error::{IndexerError, Result};

const DOMAINS_FILE: &str = "domains.json";
const TRANSACTIONS_FILE: &str = "transactions.json";
const STATE_FILE: &str = "backfill-state.json";

#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    ledger: Mutex<Ledger>,
}

impl JsonFileStore {
    /// Opens (creating if needed) the data directory and loads existing files.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be created or a file holds invalid JSON.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;

        let domains: Vec<DomainRegistration> = read_json(&dir.join(DOMAINS_FILE))
            .await?
            .unwrap_or_default();
        let transactions: Vec<TransactionRecord> = read_json(&dir.join(TRANSACTIONS_FILE))
            .await?
            .unwrap_or_default();
        let state: Option<BackfillState> = read_json(&dir.join(STATE_FILE)).await?;

        tracing::debug!(
            dir = %dir.display(),
            domains = domains.len(),
            transactions = transactions.len(),
            "Opened JSON store"
        );

        Ok(Self {
            dir,
            ledger: Mutex::new(Ledger::from_parts(domains, transactions, state)),
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn write_domains(&self, ledger: &Ledger) -> Result<()> {
        write_json(&self.dir.join(DOMAINS_FILE), &ledger.sorted_domains()).await
    }

    async fn write_transactions(&self, ledger: &Ledger) -> Result<()> {
        write_json(&self.dir.join(TRANSACTIONS_FILE), &ledger.sorted_transactions()).await
    }

    async fn write_state(&self, state: &BackfillState) -> Result<()> {
        write_json(&self.dir.join(STATE_FILE), state).await
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            IndexerError::DecodingError(format!("Corrupt store file {}: {e}", path.display()))
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl DomainStore for JsonFileStore {
    async fn find_by_signature(&self, signature: &str) -> Result<Option<DomainRegistration>> {
        Ok(self.ledger.lock().await.domains.get(signature).cloned())
    }

    async fn upsert(&self, domain: &DomainRegistration) -> Result<UpsertOutcome> {
        let mut ledger = self.ledger.lock().await;
        if ledger.domains.contains_key(&domain.signature) {
            return Ok(UpsertOutcome::AlreadyExists);
        }

        // Write first; the in-memory set only changes once the file has.
        write_json(
            &self.dir.join(DOMAINS_FILE),
            &ledger.sorted_domains_with(domain),
        )
        .await?;
        Ok(ledger.upsert(domain))
    }

    async fn count(&self, filter: &DomainFilter) -> Result<u64> {
        Ok(self.ledger.lock().await.count(filter))
    }

    async fn query(
        &self,
        filter: &DomainFilter,
        pagination: Pagination,
    ) -> Result<Vec<DomainRegistration>> {
        Ok(self.ledger.lock().await.query(filter, pagination))
    }
}

#[async_trait]
impl BackfillStore for JsonFileStore {
    async fn load_backfill_state(&self) -> Result<Option<BackfillState>> {
        Ok(self.ledger.lock().await.state.clone())
    }

    async fn save_backfill_state(&self, state: &BackfillState) -> Result<()> {
        let mut ledger = self.ledger.lock().await;
        self.write_state(state).await?;
        ledger.state = Some(state.clone());
        Ok(())
    }

    async fn known_signatures(&self, signatures: &[String]) -> Result<HashSet<String>> {
        Ok(self.ledger.lock().await.known(signatures))
    }

    async fn commit_backfill(&self, commit: BackfillCommit) -> Result<CommitSummary> {
        let mut ledger = self.ledger.lock().await;
        let state = commit.state.clone();

        let mut next = ledger.clone();
        let summary = next.apply(commit);

        if !summary.inserted_domains.is_empty() {
            self.write_domains(&next).await?;
        }
        if summary.inserted_transactions > 0 {
            self.write_transactions(&next).await?;
        }
        self.write_state(&state).await?;

        *ledger = next;
        Ok(summary)
    }

    async fn backfill_status(&self) -> Result<BackfillStatus> {
        Ok(self.ledger.lock().await.status())
    }
}
