//! Transaction fetching.
//!
//! Wraps an [`RpcProvider`] with single and batch fetches. Batch fetches run
//! concurrently and report one result per signature, so one failure never
//! hides the others.

use futures_util::future::join_all;
use std::sync::Arc;

use crate::config::CommitmentLevel;
use crate::types::RawTransaction;
use crate::utils::error::Result;
use crate::utils::rpc::{DefaultRpcProvider, RpcProvider};

/// Transaction fetcher for retrieving full transaction details.
///
/// # Example
///
/// ```no_run
/// # use solana_domain_indexer::core::fetcher::Fetcher;
/// # use solana_domain_indexer::config::CommitmentLevel;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = Fetcher::new("http://127.0.0.1:8899", CommitmentLevel::Confirmed);
/// match fetcher.fetch_transaction("5j7s6NiJS3JAkvgkoc18WVAsiSaci2pxB2A6ueCJP4tprA2TFg9wSyTLeYouxPBJEMzJinENTkpA52YStRW5Dia7").await? {
///     Some(tx) => println!("{} log lines", tx.logs.map(|l| l.len()).unwrap_or(0)),
///     None => println!("not found"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Fetcher {
    rpc: Arc<dyn RpcProvider>,
}

impl Fetcher {
    /// Creates a new `Fetcher` with a [`DefaultRpcProvider`] backed by `rpc_url`.
    #[must_use]
    pub fn new(rpc_url: &str, commitment: CommitmentLevel) -> Self {
        Self {
            rpc: Arc::new(DefaultRpcProvider::new_with_commitment(
                rpc_url,
                commitment.into(),
            )),
        }
    }

    /// Creates a `Fetcher` backed by a custom [`RpcProvider`].
    #[must_use]
    pub fn with_provider(rpc: Arc<dyn RpcProvider>) -> Self {
        Self { rpc }
    }

    #[must_use]
    pub fn provider(&self) -> Arc<dyn RpcProvider> {
        Arc::clone(&self.rpc)
    }

    /// Fetches a single transaction by its signature; `Ok(None)` when the
    /// node does not have it.
    pub async fn fetch_transaction(&self, signature: &str) -> Result<Option<RawTransaction>> {
        self.rpc.get_transaction(signature).await
    }

    /// Fetches all `signatures` concurrently, preserving input order.
    pub async fn fetch_transactions(
        &self,
        signatures: &[String],
    ) -> Vec<(String, Result<Option<RawTransaction>>)> {
        let fetches = signatures.iter().map(|signature| async move {
            let result = self.rpc.get_transaction(signature).await;
            (signature.clone(), result)
        });
        join_all(fetches).await
    }
}
