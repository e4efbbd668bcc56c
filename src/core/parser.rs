//! Domain extraction from transaction logs.
//!
//! Rules are tried in order against the log lines joined with `\n`; the
//! first match wins and the captured name is lower-cased. Owner extraction
//! is delegated to an [`OwnerStrategy`].

use regex::Regex;
use solana_sdk::pubkey::Pubkey;

use crate::config::ParserConfig;
use crate::core::owner::{OwnerStrategy, PositionalOwnerStrategy};
use crate::types::RawTransaction;
use crate::utils::error::{IndexerError, Result};

/// Domain name and owner found in one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTransaction {
    pub domain: Option<String>,
    pub owner: Option<String>,
}

impl ParsedTransaction {
    /// Both projections present.
    #[must_use]
    pub fn registration(&self) -> Option<(&str, &str)> {
        match (&self.domain, &self.owner) {
            (Some(domain), Some(owner)) => Some((domain.as_str(), owner.as_str())),
            _ => None,
        }
    }
}

pub struct LogParser {
    rules: Vec<Regex>,
    owner: Box<dyn OwnerStrategy>,
}

impl std::fmt::Debug for LogParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogParser")
            .field("rules", &self.rules.iter().map(Regex::as_str).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl LogParser {
    /// Builds the rule set for `config.tld` with the positional owner strategy.
    ///
    /// # Errors
    ///
    /// Returns `IndexerError::ConfigError` if a rule fails to compile.
    pub fn new(config: &ParserConfig, program_id: &Pubkey) -> Result<Self> {
        let owner = PositionalOwnerStrategy::new(program_id, config.owner_index);
        Self::with_owner_strategy(config, Box::new(owner))
    }

    /// Builds the rule set with a caller-supplied owner strategy.
    ///
    /// # Errors
    ///
    /// Returns `IndexerError::ConfigError` if a rule fails to compile.
    pub fn with_owner_strategy(
        config: &ParserConfig,
        owner: Box<dyn OwnerStrategy>,
    ) -> Result<Self> {
        let name = format!(r"([a-z0-9._-]+\.{})", regex::escape(&config.tld));
        let mut patterns = vec![
            format!(r"(?i)Buying domain\s+{name}"),
            format!(r"(?i)register(?:ing)?\s+{name}"),
            format!(r"(?i)domain[:\s]+{name}"),
        ];
        if config.loose_match {
            patterns.push(format!("(?i){name}"));
        }

        let rules = patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    IndexerError::ConfigError(format!("Invalid domain pattern '{p}': {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules, owner })
    }

    /// First rule match across all log lines, lower-cased.
    #[must_use]
    pub fn extract_domain(&self, logs: Option<&[String]>) -> Option<String> {
        let logs = logs?;
        if logs.is_empty() {
            return None;
        }
        let text = logs.join("\n");

        self.rules.iter().find_map(|rule| {
            rule.captures(&text)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_lowercase())
        })
    }

    #[must_use]
    pub fn extract_owner(&self, tx: &RawTransaction) -> Option<String> {
        self.owner.owner(&tx.account_keys, tx.encoding)
    }

    #[must_use]
    pub fn parse(&self, tx: &RawTransaction) -> ParsedTransaction {
        let domain = self.extract_domain(tx.logs.as_deref());
        let owner = domain.as_ref().and_then(|_| self.extract_owner(tx));
        ParsedTransaction { domain, owner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const PROGRAM: &str = "TLDHkysf5pCnKsVA4gXpNvmy7psXLPEu4LAdDJthT9S";
    const SYSTEM: &str = "11111111111111111111111111111111";
    const OWNER: &str = "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin";

    fn parser(loose: bool) -> LogParser {
        let config = ParserConfig {
            loose_match: loose,
            ..ParserConfig::default()
        };
        LogParser::new(&config, &Pubkey::from_str(PROGRAM).unwrap()).unwrap()
    }

    fn logs(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|l| (*l).to_string()).collect()
    }

    #[test]
    fn test_buying_domain_rule() {
        let lines = logs(&[
            "Program TLDHkysf5pCnKsVA4gXpNvmy7psXLPEu4LAdDJthT9S invoke [1]",
            "Program log: Buying domain Alice.SKR",
            "Program TLDHkysf5pCnKsVA4gXpNvmy7psXLPEu4LAdDJthT9S success",
        ]);
        assert_eq!(
            parser(false).extract_domain(Some(&lines)).as_deref(),
            Some("alice.skr")
        );
    }

    #[test]
    fn test_register_and_domain_rules() {
        let p = parser(false);
        assert_eq!(
            p.extract_domain(Some(&logs(&["Program log: Registering bob.skr"])))
                .as_deref(),
            Some("bob.skr")
        );
        assert_eq!(
            p.extract_domain(Some(&logs(&["Program log: register carol-1.skr"])))
                .as_deref(),
            Some("carol-1.skr")
        );
        assert_eq!(
            p.extract_domain(Some(&logs(&["Program log: domain: dave_x.skr"])))
                .as_deref(),
            Some("dave_x.skr")
        );
    }

    #[test]
    fn test_rule_order_wins_over_line_order() {
        let lines = logs(&[
            "Program log: domain: first.skr",
            "Program log: Buying domain second.skr",
        ]);
        assert_eq!(
            parser(false).extract_domain(Some(&lines)).as_deref(),
            Some("second.skr")
        );
    }

    #[test]
    fn test_repeated_pattern_yields_one_name() {
        let lines = logs(&[
            "Program log: Buying domain alice.skr",
            "Program log: Buying domain alice.skr",
        ]);
        assert_eq!(
            parser(false).extract_domain(Some(&lines)).as_deref(),
            Some("alice.skr")
        );
    }

    #[test]
    fn test_no_match() {
        let p = parser(false);
        assert!(p.extract_domain(None).is_none());
        assert!(p.extract_domain(Some(&[])).is_none());
        assert!(p
            .extract_domain(Some(&logs(&["Program log: Instruction: Transfer"])))
            .is_none());
        assert!(p
            .extract_domain(Some(&logs(&["Program log: Buying domain alice.sol"])))
            .is_none());
        assert!(p
            .extract_domain(Some(&logs(&["Program log: minted alice.skr"])))
            .is_none());
    }

    #[test]
    fn test_loose_rule_is_opt_in() {
        let lines = logs(&["Program log: minted alice.skr"]);
        assert!(parser(false).extract_domain(Some(&lines)).is_none());
        assert_eq!(
            parser(true).extract_domain(Some(&lines)).as_deref(),
            Some("alice.skr")
        );
    }

    #[test]
    fn test_custom_tld() {
        let config = ParserConfig {
            tld: "abc".into(),
            ..ParserConfig::default()
        };
        let p = LogParser::new(&config, &Pubkey::from_str(PROGRAM).unwrap()).unwrap();
        assert_eq!(
            p.extract_domain(Some(&logs(&["Program log: Buying domain zed.abc"])))
                .as_deref(),
            Some("zed.abc")
        );
    }

    #[test]
    fn test_parse_end_to_end() {
        let tx = RawTransaction::from_parts(
            "sig1",
            logs(&["Program log: Buying domain alice.skr"]),
            logs(&[PROGRAM, SYSTEM, OWNER]),
        );
        let parsed = parser(false).parse(&tx);
        assert_eq!(parsed.registration(), Some(("alice.skr", OWNER)));
    }

    #[test]
    fn test_parse_domain_without_owner() {
        let tx = RawTransaction::from_parts(
            "sig2",
            logs(&["Program log: Buying domain alice.skr"]),
            logs(&[PROGRAM, SYSTEM]),
        );
        let parsed = parser(false).parse(&tx);
        assert_eq!(parsed.domain.as_deref(), Some("alice.skr"));
        assert!(parsed.owner.is_none());
        assert!(parsed.registration().is_none());
    }
}
