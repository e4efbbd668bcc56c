//! PostgreSQL store.
//!
//! Tables: `domains` (one row per registration signature),
//! `domain_transactions` (backfill audit log) and a single-row
//! `backfill_state`. Inserts use `ON CONFLICT DO NOTHING`, so replays are
//! no-ops.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, QueryBuilder, Row};
use std::collections::HashSet;
use std::time::Duration;

use super::{
    BackfillCommit, BackfillStatus, BackfillStore, CommitSummary, DomainStore, UpsertOutcome,
};
use crate::types::{BackfillState, DomainFilter, DomainRegistration, Pagination};
use crate::utils::error::Result;

const INSERT_DOMAIN: &str = r"
    INSERT INTO domains (signature, name, owner, timestamp, block_time, fee)
    VALUES ($1, $2, $3, $4, $5, $6)
    ON CONFLICT (signature) DO NOTHING
";

const UPSERT_STATE: &str = r"
    INSERT INTO backfill_state (id, last_processed_signature, total_transactions, last_run)
    VALUES (1, $1, $2, $3)
    ON CONFLICT (id) DO UPDATE SET
        last_processed_signature = EXCLUDED.last_processed_signature,
        total_transactions = EXCLUDED.total_transactions,
        last_run = EXCLUDED.last_run
";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates tables and indexes if they do not exist.
    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS domains (
                signature TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                owner TEXT NOT NULL DEFAULT '',
                timestamp TIMESTAMPTZ NOT NULL,
                block_time BIGINT,
                fee BIGINT,
                created_at TIMESTAMPTZ DEFAULT NOW()
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_domains_timestamp ON domains(timestamp DESC)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_domains_name_lower ON domains(LOWER(name))")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS domain_transactions (
                signature TEXT PRIMARY KEY,
                slot BIGINT NOT NULL,
                block_time BIGINT,
                domain TEXT NOT NULL,
                owner TEXT,
                transaction JSONB,
                recorded_at TIMESTAMPTZ DEFAULT NOW()
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS backfill_state (
                id SMALLINT PRIMARY KEY CHECK (id = 1),
                last_processed_signature TEXT,
                total_transactions BIGINT NOT NULL DEFAULT 0,
                last_run TIMESTAMPTZ NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn domain_from_row(row: &PgRow) -> Result<DomainRegistration> {
    Ok(DomainRegistration {
        signature: row.try_get("signature")?,
        name: row.try_get("name")?,
        owner: row.try_get("owner")?,
        timestamp: row.try_get::<DateTime<Utc>, _>("timestamp")?,
        block_time: row.try_get("block_time")?,
        fee: row.try_get::<Option<i64>, _>("fee")?.map(to_u64),
    })
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &DomainFilter) {
    builder.push(" WHERE TRUE");
    if let Some(since) = filter.since {
        builder.push(" AND timestamp >= ").push_bind(since);
    }
    if let Some(term) = &filter.search {
        builder
            .push(" AND LOWER(name) LIKE ")
            .push_bind(format!("%{}%", escape_like(&term.to_lowercase())))
            .push(r" ESCAPE '\'");
    }
}

/// Makes `%`, `_` and `\` match literally inside a `LIKE` pattern.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl DomainStore for PgStore {
    async fn find_by_signature(&self, signature: &str) -> Result<Option<DomainRegistration>> {
        let row = sqlx::query(
            "SELECT signature, name, owner, timestamp, block_time, fee FROM domains WHERE signature = $1",
        )
        .bind(signature)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(domain_from_row).transpose()
    }

    async fn upsert(&self, domain: &DomainRegistration) -> Result<UpsertOutcome> {
        let result = sqlx::query(INSERT_DOMAIN)
            .bind(&domain.signature)
            .bind(&domain.name)
            .bind(&domain.owner)
            .bind(domain.timestamp)
            .bind(domain.block_time)
            .bind(domain.fee.map(to_i64))
            .execute(&self.pool)
            .await?;

        Ok(if result.rows_affected() == 1 {
            UpsertOutcome::Inserted
        } else {
            UpsertOutcome::AlreadyExists
        })
    }

    async fn count(&self, filter: &DomainFilter) -> Result<u64> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM domains");
        push_filter(&mut builder, filter);
        let count: i64 = builder.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(to_u64(count))
    }

    async fn query(
        &self,
        filter: &DomainFilter,
        pagination: Pagination,
    ) -> Result<Vec<DomainRegistration>> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT signature, name, owner, timestamp, block_time, fee FROM domains",
        );
        push_filter(&mut builder, filter);
        builder
            .push(" ORDER BY timestamp DESC, signature ASC LIMIT ")
            .push_bind(i64::from(pagination.limit))
            .push(" OFFSET ")
            .push_bind(i64::try_from(pagination.offset()).unwrap_or(i64::MAX));

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(domain_from_row).collect()
    }
}

#[async_trait]
impl BackfillStore for PgStore {
    async fn load_backfill_state(&self) -> Result<Option<BackfillState>> {
        let row = sqlx::query(
            "SELECT last_processed_signature, total_transactions, last_run FROM backfill_state WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(BackfillState {
                last_processed_signature: row.try_get("last_processed_signature")?,
                total_transactions: to_u64(row.try_get("total_transactions")?),
                last_run: row.try_get("last_run")?,
            })
        })
        .transpose()
    }

    async fn save_backfill_state(&self, state: &BackfillState) -> Result<()> {
        sqlx::query(UPSERT_STATE)
            .bind(&state.last_processed_signature)
            .bind(to_i64(state.total_transactions))
            .bind(state.last_run)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn known_signatures(&self, signatures: &[String]) -> Result<HashSet<String>> {
        if signatures.is_empty() {
            return Ok(HashSet::new());
        }
        let known: Vec<String> = sqlx::query_scalar(
            r"
            SELECT signature FROM domain_transactions WHERE signature = ANY($1)
            UNION
            SELECT signature FROM domains WHERE signature = ANY($1)
            ",
        )
        .bind(signatures)
        .fetch_all(&self.pool)
        .await?;

        Ok(known.into_iter().collect())
    }

    async fn commit_backfill(&self, commit: BackfillCommit) -> Result<CommitSummary> {
        let mut tx = self.pool.begin().await?;
        let mut summary = CommitSummary::default();

        for domain in commit.domains {
            let result = sqlx::query(INSERT_DOMAIN)
                .bind(&domain.signature)
                .bind(&domain.name)
                .bind(&domain.owner)
                .bind(domain.timestamp)
                .bind(domain.block_time)
                .bind(domain.fee.map(to_i64))
                .execute(&mut *tx)
                .await?;
            if result.rows_affected() == 1 {
                summary.inserted_domains.push(domain);
            } else {
                summary.duplicate_domains += 1;
            }
        }

        for record in &commit.transactions {
            let result = sqlx::query(
                r"
                INSERT INTO domain_transactions (signature, slot, block_time, domain, owner, transaction)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (signature) DO NOTHING
                ",
            )
            .bind(&record.signature)
            .bind(to_i64(record.slot))
            .bind(record.block_time)
            .bind(&record.domain)
            .bind(&record.owner)
            .bind(sqlx::types::Json(&record.transaction))
            .execute(&mut *tx)
            .await?;
            summary.inserted_transactions += result.rows_affected() as usize;
        }

        sqlx::query(UPSERT_STATE)
            .bind(&commit.state.last_processed_signature)
            .bind(to_i64(commit.state.total_transactions))
            .bind(commit.state.last_run)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(summary)
    }

    async fn backfill_status(&self) -> Result<BackfillStatus> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS recorded, COUNT(DISTINCT NULLIF(domain, '')) AS detected FROM domain_transactions",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(BackfillStatus {
            state: self.load_backfill_state().await?,
            transactions_recorded: to_u64(row.try_get("recorded")?),
            domains_detected: to_u64(row.try_get("detected")?),
        })
    }
}
