//! Upstream chain RPC collaborator.
//!
//! Signatures cross this boundary as base58 strings; the projections the
//! indexer needs are lifted out of the encoded transaction here so the rest
//! of the crate never touches `solana-transaction-status` types.

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_client::GetConfirmedSignaturesForAddress2Config;
use solana_client::rpc_config::RpcTransactionConfig;
use solana_client::rpc_request::RpcRequest;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::TransactionVersion;
use solana_transaction_status::option_serializer::OptionSerializer;
use solana_transaction_status::{
    EncodedConfirmedTransactionWithStatusMeta, EncodedTransaction, UiMessage,
    UiTransactionEncoding,
};
use std::str::FromStr;

use crate::types::{RawTransaction, SignatureInfo, TransactionEncoding};
use crate::utils::error::{IndexerError, Result};

#[async_trait]
pub trait RpcProvider: Send + Sync {
    /// Signatures involving `address`, newest first, strictly older than
    /// `before` when given.
    async fn get_signatures(
        &self,
        address: &Pubkey,
        before: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>>;

    /// Full transaction, or `None` when the node does not know the signature.
    async fn get_transaction(&self, signature: &str) -> Result<Option<RawTransaction>>;
}

pub struct DefaultRpcProvider {
    client: RpcClient,
    commitment: CommitmentConfig,
}

impl DefaultRpcProvider {
    /// Creates a provider connecting to `rpc_url` with confirmed commitment.
    pub fn new(rpc_url: &str) -> Self {
        Self::new_with_commitment(rpc_url, CommitmentConfig::confirmed())
    }

    /// Creates a provider with a specific commitment configuration.
    pub fn new_with_commitment(rpc_url: &str, commitment: CommitmentConfig) -> Self {
        Self {
            client: RpcClient::new_with_commitment(rpc_url.to_string(), commitment),
            commitment,
        }
    }
}

#[async_trait]
impl RpcProvider for DefaultRpcProvider {
    async fn get_signatures(
        &self,
        address: &Pubkey,
        before: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>> {
        let before = before
            .map(|sig| {
                Signature::from_str(sig).map_err(|e| {
                    IndexerError::ConfigError(format!("Invalid cursor signature '{sig}': {e}"))
                })
            })
            .transpose()?;

        let config = GetConfirmedSignaturesForAddress2Config {
            before,
            until: None,
            limit: Some(limit),
            commitment: Some(self.commitment),
        };
        let statuses = self
            .client
            .get_signatures_for_address_with_config(address, config)
            .await?;

        Ok(statuses
            .into_iter()
            .map(|status| SignatureInfo {
                signature: status.signature,
                slot: status.slot,
                block_time: status.block_time,
                failed: status.err.is_some(),
            })
            .collect())
    }

    async fn get_transaction(&self, signature: &str) -> Result<Option<RawTransaction>> {
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Json),
            commitment: Some(self.commitment),
            max_supported_transaction_version: Some(0),
        };
        // `send` instead of `get_transaction_with_config` so a null result
        // surfaces as `None` rather than a client error.
        let encoded: Option<EncodedConfirmedTransactionWithStatusMeta> = self
            .client
            .send(
                RpcRequest::GetTransaction,
                serde_json::json!([signature, config]),
            )
            .await?;

        encoded
            .map(|tx| raw_transaction_from_encoded(signature, tx))
            .transpose()
    }
}

/// Lifts logs, static account keys, fee and status out of an RPC transaction.
///
/// # Errors
///
/// Returns a serialization error if the payload cannot be re-encoded for the
/// audit copy.
pub fn raw_transaction_from_encoded(
    signature: &str,
    tx: EncodedConfirmedTransactionWithStatusMeta,
) -> Result<RawTransaction> {
    let raw = serde_json::to_value(&tx)?;

    let encoding = match tx.transaction.version {
        Some(TransactionVersion::Number(_)) => TransactionEncoding::Versioned,
        _ => TransactionEncoding::Legacy,
    };

    let account_keys = match &tx.transaction.transaction {
        EncodedTransaction::Json(ui_tx) => match &ui_tx.message {
            UiMessage::Raw(message) => message.account_keys.clone(),
            UiMessage::Parsed(message) => message
                .account_keys
                .iter()
                .map(|account| account.pubkey.clone())
                .collect(),
        },
        EncodedTransaction::Accounts(list) => list
            .account_keys
            .iter()
            .map(|account| account.pubkey.clone())
            .collect(),
        _ => Vec::new(),
    };

    let (logs, fee, failed) = match tx.transaction.meta {
        Some(meta) => {
            let logs = match meta.log_messages {
                OptionSerializer::Some(logs) => Some(logs),
                _ => None,
            };
            (logs, meta.fee, meta.err.is_some())
        }
        None => (None, 0, false),
    };

    Ok(RawTransaction {
        signature: signature.to_string(),
        slot: tx.slot,
        block_time: tx.block_time,
        fee,
        logs,
        account_keys,
        encoding,
        failed,
        raw,
    })
}
