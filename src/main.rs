//! Domain indexer binary.
//!
//! ```text
//! solana-domain-indexer [watch]          follow new registrations until Ctrl-C
//! solana-domain-indexer backfill [limit] walk one page further back in history
//! solana-domain-indexer status           print checkpoint and domain counts
//! ```
//!
//! Configuration comes from the environment (and `.env`), see
//! `IndexerConfig::from_env`.

use solana_domain_indexer::utils::logging::{log, log_startup, LogLevel};
use solana_domain_indexer::{
    init_telemetry, serve_event_feed, BackfillEngine, BackfillStore, DefaultRpcProvider,
    DomainFilter, DomainStore, DomainWatcher, EventBroadcaster, IndexerConfig, IndexerError,
    JsonFileStore, LogParser, PgStore, Result, RpcProvider, TelemetryConfig,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

struct Stores {
    domains: Arc<dyn DomainStore>,
    backfill: Arc<dyn BackfillStore>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let _telemetry = init_telemetry(TelemetryConfig::default());

    let config = IndexerConfig::from_env()?;
    let mut args = std::env::args().skip(1);

    match args.next().as_deref() {
        None | Some("watch") => watch(config).await,
        Some("backfill") => {
            let limit = args
                .next()
                .map(|raw| {
                    raw.parse::<usize>().map_err(|e| {
                        IndexerError::ConfigError(format!("Invalid backfill limit '{raw}': {e}"))
                    })
                })
                .transpose()?;
            backfill(config, limit).await
        }
        Some("status") => status(config).await,
        Some(other) => Err(IndexerError::ConfigError(format!(
            "Unknown command '{other}' (expected watch, backfill or status)"
        ))),
    }
}

async fn open_stores(config: &IndexerConfig) -> Result<Stores> {
    match &config.database_url {
        Some(url) => {
            let store = Arc::new(PgStore::new(url).await?);
            store.initialize().await?;
            log(LogLevel::Info, "Using PostgreSQL store");
            Ok(Stores {
                domains: store.clone(),
                backfill: store,
            })
        }
        None => {
            let store = Arc::new(JsonFileStore::open(config.data_dir.clone()).await?);
            log(
                LogLevel::Info,
                &format!("Using JSON store in {}", store.dir().display()),
            );
            Ok(Stores {
                domains: store.clone(),
                backfill: store,
            })
        }
    }
}

fn rpc_provider(config: &IndexerConfig) -> Arc<dyn RpcProvider> {
    Arc::new(DefaultRpcProvider::new_with_commitment(
        config.rpc_url(),
        config.commitment_level.into(),
    ))
}

async fn watch(config: IndexerConfig) -> Result<()> {
    log_startup(
        &config.program_id.to_string(),
        config.rpc_url(),
        config.poll_interval_secs(),
    );

    let stores = open_stores(&config).await?;
    let parser = Arc::new(LogParser::new(&config.parser, &config.program_id)?);
    let broadcaster = EventBroadcaster::new(config.subscriber_buffer);
    let cancel = CancellationToken::new();

    let feed = match &config.feed_addr {
        Some(addr) => {
            let listener = TcpListener::bind(addr).await?;
            Some(tokio::spawn(serve_event_feed(
                listener,
                broadcaster.clone(),
                cancel.clone(),
            )))
        }
        None => None,
    };

    let watcher = DomainWatcher::new(
        &config,
        rpc_provider(&config),
        parser,
        stores.domains,
        broadcaster,
    );
    watcher.start().await?;

    tokio::signal::ctrl_c().await?;
    log(LogLevel::Info, "Shutdown requested");

    watcher.stop().await;
    cancel.cancel();
    if let Some(feed) = feed {
        match feed.await {
            Ok(result) => result?,
            Err(e) => tracing::error!(error = %e, "Event feed task failed"),
        }
    }

    let stats = watcher.status().await.stats;
    println!(
        "Processed {} signatures, {} new domains",
        stats.total_processed, stats.domains_found
    );
    Ok(())
}

async fn backfill(config: IndexerConfig, limit: Option<usize>) -> Result<()> {
    let stores = open_stores(&config).await?;
    let parser = Arc::new(LogParser::new(&config.parser, &config.program_id)?);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let engine = BackfillEngine::new(
        config.program_id,
        config.backfill.clone(),
        rpc_provider(&config),
        parser,
        stores.backfill,
    )
    .with_cancellation(cancel);

    let report = engine.run(limit).await?;

    if report.exhausted {
        println!("History exhausted; nothing older than the cursor.");
        return Ok(());
    }
    if report.cancelled {
        println!("Cancelled; checkpoint unchanged.");
        return Ok(());
    }

    println!("Page:             {} signatures", report.signatures);
    println!("Already recorded: {}", report.already_known);
    println!("Fetched:          {}", report.fetched);
    println!("Fetch failures:   {}", report.fetch_failures);
    println!("Domains detected: {}", report.domains_detected);
    println!("New domains:      {}", report.new_domains.len());
    for domain in &report.new_domains {
        println!("  {} -> {}", domain.name, domain.owner);
    }
    if let Some(cursor) = report
        .state
        .as_ref()
        .and_then(|s| s.last_processed_signature.as_deref())
    {
        println!("Cursor:           {cursor}");
    }
    Ok(())
}

async fn status(config: IndexerConfig) -> Result<()> {
    let stores = open_stores(&config).await?;

    let backfill = stores.backfill.backfill_status().await?;
    let total = stores.domains.count(&DomainFilter::default()).await?;
    let today = stores.domains.count(&DomainFilter::today()).await?;

    match &backfill.state {
        Some(state) => {
            println!(
                "Cursor:           {}",
                state.last_processed_signature.as_deref().unwrap_or("<none>")
            );
            println!("Last run:         {}", state.last_run.to_rfc3339());
        }
        None => println!("Backfill has not run yet."),
    }
    println!("Transactions:     {}", backfill.transactions_recorded);
    println!("Domains detected: {}", backfill.domains_detected);
    println!("Domains stored:   {total}");
    println!("Registered today: {today}");
    Ok(())
}
