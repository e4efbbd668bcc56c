//! Registration records and the raw upstream projections they are built from.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// One accepted domain registration. The `signature` is the identity key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainRegistration {
    pub name: String,
    pub signature: String,
    /// Block time when known, otherwise the wall-clock time of discovery.
    pub timestamp: DateTime<Utc>,
    /// Unix seconds; authoritative when present.
    #[serde(default)]
    pub block_time: Option<i64>,
    /// Registering wallet; empty when it could not be determined.
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub fee: Option<u64>,
}

impl DomainRegistration {
    /// Builds a registration from a fetched transaction, taking time and fee
    /// from the transaction itself.
    #[must_use]
    pub fn from_transaction(name: String, owner: String, tx: &RawTransaction) -> Self {
        Self {
            name,
            signature: tx.signature.clone(),
            timestamp: block_time_or_now(tx.block_time),
            block_time: tx.block_time,
            owner,
            fee: Some(tx.fee),
        }
    }

    /// Best-effort record for a pushed log event whose transaction could not
    /// be fetched: discovery time, zero fee, empty owner.
    #[must_use]
    pub fn without_details(name: String, signature: String) -> Self {
        Self {
            name,
            signature,
            timestamp: Utc::now(),
            block_time: None,
            owner: String::new(),
            fee: Some(0),
        }
    }
}

/// Converts a unix block time into a timestamp, falling back to now.
#[must_use]
pub fn block_time_or_now(block_time: Option<i64>) -> DateTime<Utc> {
    block_time
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .unwrap_or_else(Utc::now)
}

/// Message encoding family, which determines the owner account position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionEncoding {
    #[default]
    Legacy,
    Versioned,
}

/// The parts of an upstream transaction the indexer reads.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTransaction {
    pub signature: String,
    pub slot: u64,
    pub block_time: Option<i64>,
    pub fee: u64,
    /// `None` when the node did not record log messages.
    pub logs: Option<Vec<String>>,
    /// Static account keys in message order.
    pub account_keys: Vec<String>,
    pub encoding: TransactionEncoding,
    /// Execution failed on chain.
    pub failed: bool,
    /// Full RPC payload, kept for the audit log.
    pub raw: serde_json::Value,
}

impl RawTransaction {
    /// A transaction carrying only logs and account keys.
    #[must_use]
    pub fn from_parts(
        signature: impl Into<String>,
        logs: Vec<String>,
        account_keys: Vec<String>,
    ) -> Self {
        Self {
            signature: signature.into(),
            slot: 0,
            block_time: None,
            fee: 0,
            logs: Some(logs),
            account_keys,
            encoding: TransactionEncoding::Legacy,
            failed: false,
            raw: serde_json::Value::Null,
        }
    }
}

/// One entry of a `getSignaturesForAddress` page (newest first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureInfo {
    pub signature: String,
    pub slot: u64,
    pub block_time: Option<i64>,
    pub failed: bool,
}

impl SignatureInfo {
    #[must_use]
    pub fn new(signature: impl Into<String>) -> Self {
        Self {
            signature: signature.into(),
            slot: 0,
            block_time: None,
            failed: false,
        }
    }
}

/// Audit record for every backfilled transaction in which a domain was found.
///
/// Also reads the older `transactions.json` entry shape
/// (`domainName`, `fullTransaction`, no slot).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub signature: String,
    #[serde(default)]
    pub slot: u64,
    #[serde(default)]
    pub block_time: Option<i64>,
    /// Empty for legacy entries that never had a name extracted.
    #[serde(default, alias = "domainName")]
    pub domain: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default, alias = "fullTransaction")]
    pub transaction: serde_json::Value,
}

/// Resumable backfill cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillState {
    /// Oldest signature reached so far; the next run pages from here.
    pub last_processed_signature: Option<String>,
    pub total_transactions: u64,
    pub last_run: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_transaction_entry() {
        let entry = serde_json::json!({
            "signature": "legacy-sig",
            "blockTime": 1_700_000_000,
            "timestamp": "2023-11-14T22:13:20.000Z",
            "fullTransaction": { "slot": 250_000_000, "meta": { "fee": 5000 } },
            "domainName": "alice.skr"
        });

        let record: TransactionRecord = serde_json::from_value(entry).unwrap();
        assert_eq!(record.domain, "alice.skr");
        assert_eq!(record.slot, 0);
        assert_eq!(record.block_time, Some(1_700_000_000));
        assert_eq!(record.transaction["meta"]["fee"], 5000);

        let unnamed: TransactionRecord =
            serde_json::from_value(serde_json::json!({ "signature": "bare", "fullTransaction": null }))
                .unwrap();
        assert!(unnamed.domain.is_empty());
    }

    #[test]
    fn test_registration_json_shape() {
        let reg = DomainRegistration {
            name: "alice.skr".into(),
            signature: "sig1".into(),
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            block_time: Some(1_700_000_000),
            owner: "Owner1111".into(),
            fee: Some(5000),
        };
        let value = serde_json::to_value(&reg).unwrap();
        assert_eq!(value["blockTime"], 1_700_000_000);
        assert_eq!(value["timestamp"], "2023-11-14T22:13:20Z");
        assert_eq!(value["owner"], "Owner1111");
    }

    #[test]
    fn test_backfill_state_reads_camel_case() {
        let state: BackfillState = serde_json::from_str(
            r#"{"lastProcessedSignature":"abc","totalTransactions":42,"lastRun":"2025-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(state.last_processed_signature.as_deref(), Some("abc"));
        assert_eq!(state.total_transactions, 42);
    }

    #[test]
    fn test_without_details_fallback() {
        let reg = DomainRegistration::without_details("bob.skr".into(), "sig".into());
        assert_eq!(reg.fee, Some(0));
        assert!(reg.owner.is_empty());
        assert!(reg.block_time.is_none());
    }
}
