//! `solana-domain-indexer` - indexes domain registrations made through a
//! Solana registrar program.
//!
//! Registrations are recognised from transaction logs (`Buying domain
//! alice.skr`, `register alice.skr`, `domain: alice.skr`); the owner is
//! taken from the transaction's account keys. Two ingestion paths feed one
//! store:
//!
//! - [`DomainWatcher`] follows new transactions, either by polling
//!   `getSignaturesForAddress` or through a `logsSubscribe` subscription,
//!   and publishes every accepted registration to an [`EventBroadcaster`].
//! - [`BackfillEngine`] walks the program's history backwards one page per
//!   run, committing registrations, audit records and its cursor together.
//!
//! Both paths key records by transaction signature, so replaying a
//! signature never produces a second record.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use solana_domain_indexer::{
//!     DefaultRpcProvider, DomainWatcher, EventBroadcaster, IndexerConfigBuilder, LogParser,
//!     MemoryStore,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = IndexerConfigBuilder::new()
//!         .with_rpc("https://api.mainnet-beta.solana.com")
//!         .with_poll_interval(15)
//!         .build()?;
//!
//!     let rpc = Arc::new(DefaultRpcProvider::new_with_commitment(
//!         config.rpc_url(),
//!         config.commitment_level.into(),
//!     ));
//!     let parser = Arc::new(LogParser::new(&config.parser, &config.program_id)?);
//!     let broadcaster = EventBroadcaster::new(config.subscriber_buffer);
//!     let mut feed = broadcaster.subscribe();
//!
//!     let watcher = DomainWatcher::new(
//!         &config,
//!         rpc,
//!         parser,
//!         Arc::new(MemoryStore::new()),
//!         broadcaster,
//!     );
//!     watcher.start().await?;
//!
//!     while let Some(event) = feed.recv().await {
//!         print!("{}", event.to_frame()?);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

// Public API exports
pub use config::{
    BackfillConfig, CommitmentLevel, IndexerConfig, IndexerConfigBuilder, OwnerIndexConfig,
    ParserConfig, SourceConfig, WatcherConfig,
};
pub use core::backfill::{BackfillEngine, BackfillReport, BackfillStatus};
pub use core::broadcaster::{EventBroadcaster, Subscription};
pub use core::fetcher::Fetcher;
pub use core::parser::{LogParser, ParsedTransaction};
pub use core::watcher::DomainWatcher;
pub use feed::serve_event_feed;
pub use storage::{
    BackfillStore, DomainStore, JsonFileStore, MemoryStore, PgStore, UpsertOutcome,
};
pub use streams::poller::Poller;
pub use streams::websocket::WebSocketSource;
pub use streams::{TransactionEvent, TransactionSource};
pub use telemetry::{init_telemetry, TelemetryConfig};
pub use types::{
    BackfillState, DomainFilter, DomainPage, DomainRegistration, IndexerEvent, Pagination,
    RawTransaction, TimeRange, WatcherStats, WatcherStatus,
};
pub use utils::error::{IndexerError, Result};
pub use utils::rpc::{DefaultRpcProvider, RpcProvider};

// Module declarations
pub mod config;
pub mod core;
pub mod feed;
pub mod storage;
pub mod streams;
pub mod telemetry;
pub mod types;
pub mod utils;
