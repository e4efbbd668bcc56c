//! Polling strategy.
//!
//! Each call to `next_batch` requests the newest page of signatures for the
//! program and returns the ones newer than the last signature seen, oldest
//! first. The watcher owns the sleep between polls.

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use std::time::Duration;

use super::{SourceKind, TransactionEvent, TransactionSource};
use crate::types::SignatureInfo;
use crate::utils::error::Result;
use crate::utils::rpc::RpcProvider;

pub struct Poller {
    rpc: Arc<dyn RpcProvider>,
    program_id: Pubkey,
    page_size: usize,
    poll_interval: Duration,
    last_signature: Option<String>,
}

impl Poller {
    #[must_use]
    pub fn new(
        rpc: Arc<dyn RpcProvider>,
        program_id: Pubkey,
        page_size: usize,
        poll_interval: Duration,
    ) -> Self {
        Self {
            rpc,
            program_id,
            page_size,
            poll_interval,
            last_signature: None,
        }
    }

    #[must_use]
    pub fn last_signature(&self) -> Option<&str> {
        self.last_signature.as_deref()
    }

    /// Fetches one page and advances the last-seen signature to its head.
    ///
    /// # Errors
    ///
    /// Propagates the provider's error; the cursor is left untouched.
    pub async fn fetch_new_signatures(&mut self) -> Result<Vec<SignatureInfo>> {
        let page = self
            .rpc
            .get_signatures(&self.program_id, None, self.page_size)
            .await?;

        let fresh = newer_than(&page, self.last_signature.as_deref());
        if let Some(head) = page.first() {
            self.last_signature = Some(head.signature.clone());
        }

        Ok(fresh)
    }
}

/// Signatures of a newest-first `page` that precede `last_seen`, returned
/// oldest first. When `last_seen` is not on the page the whole page is new.
#[must_use]
pub fn newer_than(page: &[SignatureInfo], last_seen: Option<&str>) -> Vec<SignatureInfo> {
    let cutoff = last_seen
        .and_then(|seen| page.iter().position(|info| info.signature == seen))
        .unwrap_or(page.len());

    page[..cutoff].iter().rev().cloned().collect()
}

#[async_trait]
impl TransactionSource for Poller {
    async fn initialize(&mut self) -> Result<()> {
        let newest = self.rpc.get_signatures(&self.program_id, None, 1).await?;
        self.last_signature = newest.into_iter().next().map(|info| info.signature);

        tracing::info!(
            program_id = %self.program_id,
            last_signature = self.last_signature.as_deref().unwrap_or("none"),
            "Poller initialized"
        );
        Ok(())
    }

    async fn next_batch(&mut self) -> Result<Vec<TransactionEvent>> {
        let fresh = self.fetch_new_signatures().await?;
        if !fresh.is_empty() {
            tracing::debug!(count = fresh.len(), "Fetched new signatures");
        }

        Ok(fresh
            .into_iter()
            .map(|info| TransactionEvent::Signature {
                signature: info.signature,
                slot: info.slot,
                block_time: info.block_time,
                failed: info.failed,
            })
            .collect())
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Polling {
            interval: self.poll_interval,
        }
    }

    fn source_name(&self) -> &str {
        "Poller"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(sigs: &[&str]) -> Vec<SignatureInfo> {
        sigs.iter().map(|s| SignatureInfo::new(*s)).collect()
    }

    fn names(infos: &[SignatureInfo]) -> Vec<&str> {
        infos.iter().map(|i| i.signature.as_str()).collect()
    }

    #[test]
    fn test_positions_before_last_seen_oldest_first() {
        let p = page(&["s5", "s4", "s3", "s2", "s1"]);
        assert_eq!(names(&newer_than(&p, Some("s3"))), vec!["s4", "s5"]);
    }

    #[test]
    fn test_last_seen_at_head_yields_nothing() {
        let p = page(&["s5", "s4"]);
        assert!(newer_than(&p, Some("s5")).is_empty());
    }

    #[test]
    fn test_unknown_last_seen_takes_whole_page() {
        let p = page(&["s3", "s2", "s1"]);
        assert_eq!(names(&newer_than(&p, Some("s0"))), vec!["s1", "s2", "s3"]);
        assert_eq!(names(&newer_than(&p, None)), vec!["s1", "s2", "s3"]);
        assert!(newer_than(&[], Some("s1")).is_empty());
    }
}
