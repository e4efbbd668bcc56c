//! Data model shared by the watcher, the backfill engine and the stores.

pub mod events;
pub mod filter;
pub mod registration;

pub use events::{IndexerEvent, WatcherStats, WatcherStatus};
pub use filter::{DomainFilter, DomainPage, Pagination, TimeRange};
pub use registration::{
    block_time_or_now, BackfillState, DomainRegistration, RawTransaction, SignatureInfo,
    TransactionEncoding, TransactionRecord,
};
