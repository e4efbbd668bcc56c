//! Owner extraction from a transaction's account-key list.
//!
//! The registering wallet sits at a fixed position in the registrar's
//! instruction accounts. That position is configured per message encoding
//! (`OwnerIndexConfig`), and when the key list is too short the first key
//! that is neither the program nor a well-known system address is used.

use solana_sdk::pubkey::Pubkey;
use std::collections::HashSet;

use crate::config::OwnerIndexConfig;
use crate::types::TransactionEncoding;

/// Programs and sysvars that never own a domain.
pub const WELL_KNOWN_ADDRESSES: [&str; 9] = [
    "11111111111111111111111111111111",
    "ComputeBudget111111111111111111111111111111",
    "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA",
    "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb",
    "ATokenGPvbdGMxhBByy4qV3ySRQxPbLkQAgs5NYqGPe7",
    "SysvarRent111111111111111111111111111111111",
    "Sysvar1nstructions1111111111111111111111111",
    "MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr",
    "Memo1UhkJRfHyvLMcVucJwxXeuD728EqVDDwQDxFMNo",
];

/// Picks the owner address out of a transaction's static account keys.
pub trait OwnerStrategy: Send + Sync {
    fn owner(&self, account_keys: &[String], encoding: TransactionEncoding) -> Option<String>;
}

/// Positional heuristic keyed by message encoding.
#[derive(Debug, Clone)]
pub struct PositionalOwnerStrategy {
    indices: OwnerIndexConfig,
    excluded: HashSet<String>,
}

impl PositionalOwnerStrategy {
    #[must_use]
    pub fn new(program_id: &Pubkey, indices: OwnerIndexConfig) -> Self {
        let mut excluded: HashSet<String> = WELL_KNOWN_ADDRESSES
            .iter()
            .map(|addr| (*addr).to_string())
            .collect();
        excluded.insert(program_id.to_string());
        Self { indices, excluded }
    }

    #[must_use]
    pub fn index_for(&self, encoding: TransactionEncoding) -> usize {
        match encoding {
            TransactionEncoding::Legacy => self.indices.legacy,
            TransactionEncoding::Versioned => self.indices.versioned,
        }
    }

    fn is_excluded(&self, key: &str) -> bool {
        key.is_empty() || self.excluded.contains(key)
    }
}

impl OwnerStrategy for PositionalOwnerStrategy {
    fn owner(&self, account_keys: &[String], encoding: TransactionEncoding) -> Option<String> {
        if let Some(key) = account_keys.get(self.index_for(encoding)) {
            if !key.is_empty() {
                return Some(key.clone());
            }
        }

        account_keys
            .iter()
            .find(|key| !self.is_excluded(key))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const PROGRAM: &str = "TLDHkysf5pCnKsVA4gXpNvmy7psXLPEu4LAdDJthT9S";
    const OWNER: &str = "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin";

    fn strategy(indices: OwnerIndexConfig) -> PositionalOwnerStrategy {
        PositionalOwnerStrategy::new(&Pubkey::from_str(PROGRAM).unwrap(), indices)
    }

    fn keys(list: &[&str]) -> Vec<String> {
        list.iter().map(|k| (*k).to_string()).collect()
    }

    #[test]
    fn test_designated_index_in_bounds() {
        let s = strategy(OwnerIndexConfig::default());
        let account_keys = keys(&[PROGRAM, "11111111111111111111111111111111", OWNER]);

        assert_eq!(
            s.owner(&account_keys, TransactionEncoding::Legacy).as_deref(),
            Some(OWNER)
        );
        assert_eq!(
            s.owner(&account_keys, TransactionEncoding::Versioned).as_deref(),
            Some(OWNER)
        );
    }

    #[test]
    fn test_index_differs_per_encoding() {
        let s = strategy(OwnerIndexConfig {
            legacy: 1,
            versioned: 2,
        });
        let account_keys = keys(&["Payer111", "LegacyOwner", "VersionedOwner"]);

        assert_eq!(
            s.owner(&account_keys, TransactionEncoding::Legacy).as_deref(),
            Some("LegacyOwner")
        );
        assert_eq!(
            s.owner(&account_keys, TransactionEncoding::Versioned).as_deref(),
            Some("VersionedOwner")
        );
    }

    #[test]
    fn test_fallback_skips_program_and_system() {
        let s = strategy(OwnerIndexConfig {
            legacy: 7,
            versioned: 7,
        });
        let account_keys = keys(&[
            PROGRAM,
            "11111111111111111111111111111111",
            "ComputeBudget111111111111111111111111111111",
            OWNER,
        ]);

        assert_eq!(
            s.owner(&account_keys, TransactionEncoding::Legacy).as_deref(),
            Some(OWNER)
        );
    }

    #[test]
    fn test_no_candidate() {
        let s = strategy(OwnerIndexConfig::default());
        assert!(s.owner(&[], TransactionEncoding::Legacy).is_none());
        assert!(s
            .owner(
                &keys(&[PROGRAM, "11111111111111111111111111111111"]),
                TransactionEncoding::Legacy
            )
            .is_none());
    }
}
