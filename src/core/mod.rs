pub mod backfill;
pub mod broadcaster;
pub mod dedup;
pub mod fetcher;
pub mod owner;
pub mod parser;
pub mod stats;
pub mod watcher;

pub use backfill::{BackfillEngine, BackfillReport};
pub use broadcaster::{EventBroadcaster, Subscription};
pub use dedup::{BoundedDeduplicator, InMemoryDeduplicator, SignatureDeduplicator};
pub use fetcher::Fetcher;
pub use owner::{OwnerStrategy, PositionalOwnerStrategy};
pub use parser::{LogParser, ParsedTransaction};
pub use stats::StatsAggregator;
pub use watcher::DomainWatcher;
