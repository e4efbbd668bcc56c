#![allow(dead_code)]

use async_trait::async_trait;
use solana_domain_indexer::config::{BackfillConfig, ParserConfig, DEFAULT_PROGRAM_ID};
use solana_domain_indexer::core::broadcaster::Subscription;
use solana_domain_indexer::types::{RawTransaction, SignatureInfo};
use solana_domain_indexer::utils::rpc::RpcProvider;
use solana_domain_indexer::{DomainRegistration, IndexerError, IndexerEvent, LogParser, Result};
use solana_sdk::pubkey::Pubkey;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SYSTEM_PROGRAM: &str = "11111111111111111111111111111111";

pub fn program_id() -> Pubkey {
    Pubkey::from_str(DEFAULT_PROGRAM_ID).unwrap()
}

pub fn parser() -> Arc<LogParser> {
    Arc::new(LogParser::new(&ParserConfig::default(), &program_id()).unwrap())
}

/// Backfill settings without the production pacing or starting cursor.
pub fn fast_backfill(page_size: usize) -> BackfillConfig {
    BackfillConfig {
        page_size,
        fetch_delay_ms: 0,
        concurrency: 2,
        start_signature: None,
    }
}

/// Scripted upstream: a newest-first signature history plus the
/// transactions behind it.
#[derive(Default)]
pub struct FakeRpc {
    history: Mutex<Vec<SignatureInfo>>,
    transactions: Mutex<HashMap<String, RawTransaction>>,
    broken_transactions: Mutex<HashSet<String>>,
    signatures_down: AtomicBool,
    signature_calls: AtomicUsize,
    transaction_calls: AtomicUsize,
}

impl FakeRpc {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Appends a registration as the newest transaction; returns its owner.
    pub fn push_registration(&self, signature: &str, name: &str) -> String {
        let owner = Pubkey::new_unique().to_string();
        let tx = RawTransaction {
            slot: self.next_slot(),
            block_time: Some(1_700_000_000),
            fee: 5000,
            ..RawTransaction::from_parts(
                signature,
                vec![
                    format!("Program {DEFAULT_PROGRAM_ID} invoke [1]"),
                    format!("Program log: Buying domain {name}"),
                    format!("Program {DEFAULT_PROGRAM_ID} success"),
                ],
                vec![
                    DEFAULT_PROGRAM_ID.to_string(),
                    SYSTEM_PROGRAM.to_string(),
                    owner.clone(),
                ],
            )
        };
        self.push(tx);
        owner
    }

    /// Appends a registration whose account keys hold no owner candidate.
    pub fn push_ownerless_registration(&self, signature: &str, name: &str) {
        let tx = RawTransaction {
            slot: self.next_slot(),
            block_time: Some(1_700_000_000),
            fee: 5000,
            ..RawTransaction::from_parts(
                signature,
                vec![format!("Program log: Buying domain {name}")],
                vec![DEFAULT_PROGRAM_ID.to_string(), SYSTEM_PROGRAM.to_string()],
            )
        };
        self.push(tx);
    }

    /// Appends a transaction whose logs mention no domain.
    pub fn push_unrelated(&self, signature: &str) {
        let tx = RawTransaction {
            slot: self.next_slot(),
            ..RawTransaction::from_parts(
                signature,
                vec!["Program log: Instruction: Transfer".to_string()],
                vec![SYSTEM_PROGRAM.to_string()],
            )
        };
        self.push(tx);
    }

    /// Appends a registration that failed on chain.
    pub fn push_failed(&self, signature: &str, name: &str) {
        self.push_registration(signature, name);
        if let Some(info) = self.history.lock().unwrap().first_mut() {
            info.failed = true;
        }
        if let Some(tx) = self.transactions.lock().unwrap().get_mut(signature) {
            tx.failed = true;
        }
    }

    /// Lists a signature without a transaction behind it.
    pub fn push_missing(&self, signature: &str) {
        let mut info = SignatureInfo::new(signature);
        info.slot = self.next_slot();
        self.history.lock().unwrap().insert(0, info);
    }

    /// Registers a transaction for lookups without listing it in history.
    pub fn insert_transaction(&self, tx: RawTransaction) {
        self.transactions
            .lock()
            .unwrap()
            .insert(tx.signature.clone(), tx);
    }

    pub fn break_transaction(&self, signature: &str) {
        self.broken_transactions
            .lock()
            .unwrap()
            .insert(signature.to_string());
    }

    pub fn set_signatures_down(&self, down: bool) {
        self.signatures_down.store(down, Ordering::SeqCst);
    }

    pub fn signature_calls(&self) -> usize {
        self.signature_calls.load(Ordering::SeqCst)
    }

    pub fn transaction_calls(&self) -> usize {
        self.transaction_calls.load(Ordering::SeqCst)
    }

    fn next_slot(&self) -> u64 {
        self.history.lock().unwrap().len() as u64 + 100
    }

    fn push(&self, tx: RawTransaction) {
        let info = SignatureInfo {
            signature: tx.signature.clone(),
            slot: tx.slot,
            block_time: tx.block_time,
            failed: tx.failed,
        };
        self.history.lock().unwrap().insert(0, info);
        self.insert_transaction(tx);
    }
}

#[async_trait]
impl RpcProvider for FakeRpc {
    async fn get_signatures(
        &self,
        _program_id: &Pubkey,
        before: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>> {
        self.signature_calls.fetch_add(1, Ordering::SeqCst);
        if self.signatures_down.load(Ordering::SeqCst) {
            return Err(IndexerError::RpcError("getSignaturesForAddress: 503".into()));
        }

        let history = self.history.lock().unwrap();
        let start = match before {
            None => 0,
            Some(cursor) => match history.iter().position(|info| info.signature == cursor) {
                Some(index) => index + 1,
                None => return Ok(Vec::new()),
            },
        };
        Ok(history.iter().skip(start).take(limit).cloned().collect())
    }

    async fn get_transaction(&self, signature: &str) -> Result<Option<RawTransaction>> {
        self.transaction_calls.fetch_add(1, Ordering::SeqCst);
        if self.broken_transactions.lock().unwrap().contains(signature) {
            return Err(IndexerError::RpcError(format!("getTransaction {signature}: 429")));
        }
        Ok(self.transactions.lock().unwrap().get(signature).cloned())
    }
}

/// Waits for the next `newDomain` event, skipping stats frames.
pub async fn next_domain(subscription: &mut Subscription) -> DomainRegistration {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match subscription.recv().await {
                Some(IndexerEvent::NewDomain { domain }) => return domain,
                Some(IndexerEvent::Stats { .. }) => continue,
                None => panic!("subscription closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for a newDomain event")
}
