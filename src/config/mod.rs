//! Configuration management for the domain indexer.
//!
//! This module provides a builder-pattern configuration, plus an
//! environment loader used by the binary. All values have defaults tuned to
//! stay under public RPC rate limits.

use crate::utils::error::{IndexerError, Result};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Registrar program for `.skr` domains.
pub const DEFAULT_PROGRAM_ID: &str = "TLDHkysf5pCnKsVA4gXpNvmy7psXLPEu4LAdDJthT9S";

/// Public mainnet endpoint used when neither `RPC_URL` nor `HELIUS_RPC` is set.
pub const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

/// Top-level domain suffix registered by the default program.
pub const DEFAULT_TLD: &str = "skr";

/// Signature the first backfill run starts paging from.
pub const DEFAULT_BACKFILL_START: &str =
    "2LSFccEnZXeFy3SqjnGGNBBwErsghTZxGei4BgrSuunaSmXFCkUDLBavEih4rGXMvXLjnwtz6ZgcNA8LgtYPCvDb";

/// Upper bound accepted by `getSignaturesForAddress`.
pub const MAX_PAGE_SIZE: usize = 1000;

const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;
const DEFAULT_POLL_PAGE_SIZE: usize = 50;
const DEFAULT_RECONNECT_DELAY_SECS: u64 = 5;
const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;

/// Commitment level for RPC reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CommitmentLevel {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl From<CommitmentLevel> for solana_sdk::commitment_config::CommitmentConfig {
    fn from(level: CommitmentLevel) -> Self {
        match level {
            CommitmentLevel::Processed => {
                solana_sdk::commitment_config::CommitmentConfig::processed()
            }
            CommitmentLevel::Confirmed => {
                solana_sdk::commitment_config::CommitmentConfig::confirmed()
            }
            CommitmentLevel::Finalized => {
                solana_sdk::commitment_config::CommitmentConfig::finalized()
            }
        }
    }
}

impl CommitmentLevel {
    /// Name used in JSON-RPC request configs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitmentLevel::Processed => "processed",
            CommitmentLevel::Confirmed => "confirmed",
            CommitmentLevel::Finalized => "finalized",
        }
    }
}

/// Configuration for the data source
#[derive(Debug, Clone)]
pub enum SourceConfig {
    /// RPC polling of `getSignaturesForAddress`
    Rpc {
        rpc_url: String,
        poll_interval_secs: u64,
        page_size: usize,
    },
    /// `logsSubscribe` push subscription; the RPC URL is used for detail fetches
    WebSocket {
        ws_url: String,
        rpc_url: String,
        reconnect_delay_secs: u64,
    },
}

/// Live watcher tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Sleep after a poll that returned nothing new.
    pub idle_backoff_secs: u64,
    /// Sleep after a failed poll.
    pub error_backoff_secs: u64,
    /// Pause between processed signatures.
    pub signature_delay_ms: u64,
    /// Fetch full transactions for pushed log events (block time, fee, owner).
    pub fetch_details: bool,
    /// Cap on remembered signatures; `None` keeps every signature for the session.
    pub dedup_capacity: Option<usize>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            idle_backoff_secs: 15,
            error_backoff_secs: 30,
            signature_delay_ms: 100,
            fetch_details: true,
            dedup_capacity: None,
        }
    }
}

impl WatcherConfig {
    #[must_use]
    pub fn idle_backoff(&self) -> Duration {
        Duration::from_secs(self.idle_backoff_secs)
    }

    #[must_use]
    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }

    #[must_use]
    pub fn signature_delay(&self) -> Duration {
        Duration::from_millis(self.signature_delay_ms)
    }
}

/// Configuration for backfill runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillConfig {
    /// Signatures requested per run
    pub page_size: usize,

    /// Delay between transaction fetches (or fetch chunks)
    pub fetch_delay_ms: u64,

    /// Concurrent transaction fetches within a page
    pub concurrency: usize,

    /// Cursor used when no checkpoint exists; `None` starts from the newest transaction
    pub start_signature: Option<String>,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            fetch_delay_ms: 3000,
            concurrency: 1,
            start_signature: Some(DEFAULT_BACKFILL_START.to_string()),
        }
    }
}

/// Account-key positions of the registering wallet, per message encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerIndexConfig {
    pub legacy: usize,
    pub versioned: usize,
}

impl Default for OwnerIndexConfig {
    fn default() -> Self {
        Self {
            legacy: 2,
            versioned: 2,
        }
    }
}

/// Domain extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Suffix without the leading dot, e.g. `skr`
    pub tld: String,
    /// Accept a bare `<label>.<tld>` anywhere in the logs as a last resort
    pub loose_match: bool,
    pub owner_index: OwnerIndexConfig,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            tld: DEFAULT_TLD.to_string(),
            loose_match: false,
            owner_index: OwnerIndexConfig::default(),
        }
    }
}

/// Configuration for the domain indexer.
///
/// Use `IndexerConfigBuilder` (or `IndexerConfig::from_env`) to construct
/// instances of this struct.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Registrar program whose transactions are watched
    pub program_id: Pubkey,

    /// Source configuration
    pub source: SourceConfig,

    /// Commitment used for every read (default: confirmed)
    pub commitment_level: CommitmentLevel,

    /// PostgreSQL URL; when absent the JSON file store is used
    pub database_url: Option<String>,

    /// Directory of the JSON file store
    pub data_dir: PathBuf,

    /// Bind address of the NDJSON event feed
    pub feed_addr: Option<String>,

    pub watcher: WatcherConfig,
    pub backfill: BackfillConfig,
    pub parser: ParserConfig,

    /// Per-subscriber channel capacity of the event broadcaster
    pub subscriber_buffer: usize,
}

impl IndexerConfig {
    /// Helper to get the RPC URL regardless of the source type
    #[must_use]
    pub fn rpc_url(&self) -> &str {
        match &self.source {
            SourceConfig::Rpc { rpc_url, .. } | SourceConfig::WebSocket { rpc_url, .. } => rpc_url,
        }
    }

    /// Poll interval of the RPC source, or 0 for push subscriptions.
    #[must_use]
    pub fn poll_interval_secs(&self) -> u64 {
        match &self.source {
            SourceConfig::Rpc {
                poll_interval_secs, ..
            } => *poll_interval_secs,
            SourceConfig::WebSocket { .. } => 0,
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// `WS_URL` selects the subscription strategy; otherwise the watcher
    /// polls `RPC_URL` (falling back to `HELIUS_RPC`, then the public
    /// mainnet endpoint).
    ///
    /// # Errors
    ///
    /// Returns `IndexerError::ConfigError` for unparseable numeric values and
    /// for anything `IndexerConfigBuilder::build` rejects.
    pub fn from_env() -> Result<Self> {
        let rpc_url = env_opt("RPC_URL")
            .or_else(|| env_opt("HELIUS_RPC"))
            .unwrap_or_else(|| DEFAULT_RPC_URL.to_string());

        let mut builder = IndexerConfigBuilder::new()
            .program_id(env_opt("PROGRAM_ID").unwrap_or_else(|| DEFAULT_PROGRAM_ID.to_string()))
            .with_data_dir(env_opt("DATA_DIR").unwrap_or_else(|| "data".to_string()));

        if let Some(secs) = env_parse::<u64>("POLL_INTERVAL_SECS")? {
            builder = builder.with_poll_interval(secs);
        }

        builder = match env_opt("WS_URL") {
            Some(ws_url) => builder.with_ws(ws_url, rpc_url),
            None => builder.with_rpc(rpc_url),
        };

        if let Some(url) = env_opt("DATABASE_URL") {
            builder = builder.with_database(url);
        }
        if let Some(addr) = env_opt("FEED_ADDR") {
            builder = builder.with_feed_addr(addr);
        }

        let mut backfill = BackfillConfig::default();
        if let Some(size) = env_parse::<usize>("BACKFILL_PAGE_SIZE")? {
            backfill.page_size = size;
        }
        if let Some(delay) = env_parse::<u64>("BACKFILL_DELAY_MS")? {
            backfill.fetch_delay_ms = delay;
        }
        if let Some(concurrency) = env_parse::<usize>("BACKFILL_CONCURRENCY")? {
            backfill.concurrency = concurrency;
        }
        builder = builder.with_backfill(backfill);

        if let Some(tld) = env_opt("DOMAIN_TLD") {
            builder = builder.with_parser(ParserConfig {
                tld,
                ..ParserConfig::default()
            });
        }

        builder.build()
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| IndexerError::ConfigError(format!("Invalid {key} '{raw}': {e}")))
        })
        .transpose()
}

/// Builder for `IndexerConfig`.
///
/// # Example
///
/// ```no_run
/// use solana_domain_indexer::IndexerConfigBuilder;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = IndexerConfigBuilder::new()
///     .with_rpc("http://127.0.0.1:8899")
///     .program_id("TLDHkysf5pCnKsVA4gXpNvmy7psXLPEu4LAdDJthT9S")
///     .with_poll_interval(10)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct IndexerConfigBuilder {
    program_id: Option<String>,
    poll_interval_secs: Option<u64>,
    page_size: Option<usize>,
    source: Option<SourceConfig>,
    commitment_level: Option<CommitmentLevel>,
    database_url: Option<String>,
    data_dir: Option<PathBuf>,
    feed_addr: Option<String>,
    watcher: Option<WatcherConfig>,
    backfill: Option<BackfillConfig>,
    parser: Option<ParserConfig>,
    subscriber_buffer: Option<usize>,
}

impl IndexerConfigBuilder {
    /// Creates a new configuration builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the polling strategy against `url`.
    #[must_use]
    pub fn with_rpc(mut self, url: impl Into<String>) -> Self {
        self.source = Some(SourceConfig::Rpc {
            rpc_url: url.into(),
            poll_interval_secs: self
                .poll_interval_secs
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            page_size: self.page_size.unwrap_or(DEFAULT_POLL_PAGE_SIZE),
        });
        self
    }

    /// Selects the push-subscription strategy.
    ///
    /// # Arguments
    ///
    /// * `ws_url` - The WebSocket URL
    /// * `rpc_url` - The RPC URL for fetching full transactions
    #[must_use]
    pub fn with_ws(mut self, ws_url: impl Into<String>, rpc_url: impl Into<String>) -> Self {
        self.source = Some(SourceConfig::WebSocket {
            ws_url: ws_url.into(),
            rpc_url: rpc_url.into(),
            reconnect_delay_secs: DEFAULT_RECONNECT_DELAY_SECS,
        });
        self
    }

    /// Sets the program ID to watch (parsed into a `Pubkey` by `build()`).
    #[must_use]
    pub fn program_id(mut self, id: impl Into<String>) -> Self {
        self.program_id = Some(id.into());
        self
    }

    /// Sets the polling interval in seconds (default: 15).
    #[must_use]
    pub fn with_poll_interval(mut self, secs: u64) -> Self {
        self.poll_interval_secs = Some(secs);
        if let Some(SourceConfig::Rpc {
            poll_interval_secs, ..
        }) = &mut self.source
        {
            *poll_interval_secs = secs;
        }
        self
    }

    /// Sets the number of signatures requested per poll (default: 50).
    #[must_use]
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        if let Some(SourceConfig::Rpc { page_size, .. }) = &mut self.source {
            *page_size = size;
        }
        self
    }

    #[must_use]
    pub fn with_commitment(mut self, level: CommitmentLevel) -> Self {
        self.commitment_level = Some(level);
        self
    }

    #[must_use]
    pub fn with_watcher(mut self, config: WatcherConfig) -> Self {
        self.watcher = Some(config);
        self
    }

    /// Sets the backfill configuration.
    #[must_use]
    pub fn with_backfill(mut self, config: BackfillConfig) -> Self {
        self.backfill = Some(config);
        self
    }

    #[must_use]
    pub fn with_parser(mut self, config: ParserConfig) -> Self {
        self.parser = Some(config);
        self
    }

    /// Sets the database connection URL.
    #[must_use]
    pub fn with_database(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_feed_addr(mut self, addr: impl Into<String>) -> Self {
        self.feed_addr = Some(addr.into());
        self
    }

    #[must_use]
    pub fn with_subscriber_buffer(mut self, capacity: usize) -> Self {
        self.subscriber_buffer = Some(capacity);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `IndexerError::ConfigError` if:
    /// - no source was selected (`with_rpc` or `with_ws`)
    /// - the program ID cannot be parsed into a valid `Pubkey`
    /// - a page size is outside `1..=1000`
    /// - backfill concurrency or the subscriber buffer is zero
    /// - the TLD is empty or contains a dot
    pub fn build(self) -> Result<IndexerConfig> {
        let program_id_str = self
            .program_id
            .unwrap_or_else(|| DEFAULT_PROGRAM_ID.to_string());

        let program_id = Pubkey::from_str(&program_id_str).map_err(|e| {
            IndexerError::ConfigError(format!("Invalid program ID '{program_id_str}': {e}"))
        })?;

        let source = self.source.ok_or_else(|| {
            IndexerError::ConfigError(
                "Source configuration (RPC or WebSocket) is required. Use .with_rpc() or .with_ws()"
                    .to_string(),
            )
        })?;

        if let SourceConfig::Rpc { page_size, .. } = &source {
            check_page_size("poll page size", *page_size)?;
        }

        let backfill = self.backfill.unwrap_or_default();
        check_page_size("backfill page size", backfill.page_size)?;
        if backfill.concurrency == 0 {
            return Err(IndexerError::ConfigError(
                "Backfill concurrency must be at least 1".to_string(),
            ));
        }

        let parser = self.parser.unwrap_or_default();
        if parser.tld.is_empty() || parser.tld.contains('.') {
            return Err(IndexerError::ConfigError(format!(
                "Invalid TLD '{}': expected a bare suffix such as 'skr'",
                parser.tld
            )));
        }

        let subscriber_buffer = self.subscriber_buffer.unwrap_or(DEFAULT_SUBSCRIBER_BUFFER);
        if subscriber_buffer == 0 {
            return Err(IndexerError::ConfigError(
                "Subscriber buffer must be at least 1".to_string(),
            ));
        }

        Ok(IndexerConfig {
            program_id,
            source,
            commitment_level: self.commitment_level.unwrap_or_default(),
            database_url: self.database_url,
            data_dir: self.data_dir.unwrap_or_else(|| PathBuf::from("data")),
            feed_addr: self.feed_addr,
            watcher: self.watcher.unwrap_or_default(),
            backfill,
            parser,
            subscriber_buffer,
        })
    }
}

fn check_page_size(what: &str, size: usize) -> Result<()> {
    if size == 0 || size > MAX_PAGE_SIZE {
        return Err(IndexerError::ConfigError(format!(
            "Invalid {what} {size}: must be within 1..={MAX_PAGE_SIZE}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_missing_source() {
        let result = IndexerConfigBuilder::new().build();
        assert!(matches!(result, Err(IndexerError::ConfigError(_))));
    }

    #[test]
    fn test_builder_invalid_program_id() {
        let result = IndexerConfigBuilder::new()
            .with_rpc("http://127.0.0.1:8899")
            .program_id("invalid_pubkey")
            .build();

        match result {
            Err(IndexerError::ConfigError(msg)) => assert!(msg.contains("Invalid program ID")),
            other => panic!("Expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_builder_defaults() {
        let config = IndexerConfigBuilder::new()
            .with_rpc("http://127.0.0.1:8899")
            .build()
            .unwrap();

        assert_eq!(config.program_id.to_string(), DEFAULT_PROGRAM_ID);
        assert_eq!(config.commitment_level, CommitmentLevel::Confirmed);
        assert_eq!(config.parser.tld, "skr");
        assert_eq!(config.parser.owner_index, OwnerIndexConfig::default());
        assert_eq!(config.backfill.page_size, 10);
        assert_eq!(config.backfill.fetch_delay_ms, 3000);
        assert_eq!(config.watcher.signature_delay(), Duration::from_millis(100));
        assert_eq!(config.subscriber_buffer, 256);

        match config.source {
            SourceConfig::Rpc {
                rpc_url,
                poll_interval_secs,
                page_size,
            } => {
                assert_eq!(rpc_url, "http://127.0.0.1:8899");
                assert_eq!(poll_interval_secs, 15);
                assert_eq!(page_size, 50);
            }
            _ => panic!("Expected RPC source"),
        }
    }

    #[test]
    fn test_poll_interval_applies_in_any_order() {
        let before = IndexerConfigBuilder::new()
            .with_poll_interval(3)
            .with_rpc("http://127.0.0.1:8899")
            .build()
            .unwrap();
        let after = IndexerConfigBuilder::new()
            .with_rpc("http://127.0.0.1:8899")
            .with_poll_interval(3)
            .build()
            .unwrap();

        assert_eq!(before.poll_interval_secs(), 3);
        assert_eq!(after.poll_interval_secs(), 3);
    }

    #[test]
    fn test_builder_websocket_config() {
        let config = IndexerConfigBuilder::new()
            .with_ws("ws://127.0.0.1:8900", "http://127.0.0.1:8899")
            .build()
            .unwrap();

        assert_eq!(config.rpc_url(), "http://127.0.0.1:8899");
        match config.source {
            SourceConfig::WebSocket {
                ws_url,
                reconnect_delay_secs,
                ..
            } => {
                assert_eq!(ws_url, "ws://127.0.0.1:8900");
                assert_eq!(reconnect_delay_secs, 5);
            }
            _ => panic!("Expected WebSocket source"),
        }
    }

    #[test]
    fn test_builder_rejects_out_of_range_page_size() {
        let result = IndexerConfigBuilder::new()
            .with_rpc("http://127.0.0.1:8899")
            .with_page_size(1001)
            .build();
        assert!(result.is_err());

        let result = IndexerConfigBuilder::new()
            .with_rpc("http://127.0.0.1:8899")
            .with_backfill(BackfillConfig {
                page_size: 0,
                ..BackfillConfig::default()
            })
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_rejects_zero_concurrency() {
        let result = IndexerConfigBuilder::new()
            .with_rpc("http://127.0.0.1:8899")
            .with_backfill(BackfillConfig {
                concurrency: 0,
                ..BackfillConfig::default()
            })
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_rejects_dotted_tld() {
        let result = IndexerConfigBuilder::new()
            .with_rpc("http://127.0.0.1:8899")
            .with_parser(ParserConfig {
                tld: ".skr".into(),
                ..ParserConfig::default()
            })
            .build();
        assert!(result.is_err());
    }
}
