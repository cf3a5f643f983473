//! Admin - the privileged owner handle
//!
//! Owns the database: opens the pool, runs migrations, hands out the
//! runtime principal, exports proof material, and flips the guard triggers
//! for controlled tamper testing. None of this is reachable from
//! [`LedgerStore`]; application code compromise cannot disable the guards.

use crate::error::StoreError;
use crate::schema;
use crate::store::LedgerStore;
use chainbank_proof::{HeadManifest, ProofRow};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;

/// Privileged handle over the ledger database.
pub struct Admin {
    pool: SqlitePool,
    runtime: LedgerStore,
}

impl Admin {
    /// Open (creating if missing) the ledger database at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);
        Self::open_with(options, 8).await
    }

    /// Open with explicit connection options.
    pub async fn open_with(
        options: SqliteConnectOptions,
        max_connections: u32,
    ) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        let runtime = LedgerStore::new(pool.clone());
        Ok(Self { pool, runtime })
    }

    /// Apply the schema and guard triggers. Idempotent.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        schema::migrate(&self.pool).await
    }

    /// The runtime principal's handle. All clones share one chain-head
    /// lock and one advisory lock table, which is what keeps `seq`
    /// gapless in-process.
    pub fn runtime(&self) -> LedgerStore {
        self.runtime.clone()
    }

    /// Drop the guard triggers. Tamper-test tooling only.
    pub async fn disable_guards(&self) -> Result<(), StoreError> {
        schema::drop_guards(&self.pool).await
    }

    /// Recreate the guard triggers after `disable_guards`.
    pub async fn enable_guards(&self) -> Result<(), StoreError> {
        schema::create_guards(&self.pool).await
    }

    /// Execute arbitrary SQL with owner privileges. Returns affected rows.
    pub async fn execute_raw(&self, sql: &str) -> Result<u64, StoreError> {
        let result = sqlx::query(sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Raw pool access for privileged inspection (tests, audit tooling).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Export the event log for offline verification: rows in seq order
    /// with full material fields, plus the head manifest.
    pub async fn export_proof(&self) -> Result<(Vec<ProofRow>, HeadManifest), StoreError> {
        let raw = sqlx::query_as::<_, (i64, Vec<u8>, String, String, String, String, String, String, Vec<u8>, Vec<u8>)>(
            r#"
            SELECT seq, prev_hash, event_id, created_at, event_type,
                   aggregate_type, aggregate_id, correlation_id, payload_hash, hash
              FROM event_log
             ORDER BY seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let rows: Vec<ProofRow> = raw
            .into_iter()
            .map(
                |(
                    seq,
                    prev_hash,
                    event_id,
                    created_at,
                    event_type,
                    aggregate_type,
                    aggregate_id,
                    correlation_id,
                    payload_hash,
                    hash,
                )| ProofRow {
                    seq,
                    prev_hash_hex: hex::encode(prev_hash),
                    event_id,
                    created_at,
                    event_type,
                    aggregate_type,
                    aggregate_id,
                    correlation_id,
                    payload_hash_hex: hex::encode(payload_hash),
                    hash_hex: hex::encode(hash),
                },
            )
            .collect();

        let (head_seq, head_hash): (i64, Vec<u8>) =
            sqlx::query_as("SELECT last_seq, last_hash FROM chain_head WHERE id = 0")
                .fetch_one(&self.pool)
                .await?;

        let manifest = HeadManifest {
            seq_start: rows.first().map(|r| r.seq).unwrap_or(0),
            seq_end: head_seq,
            count: rows.len() as i64,
            head_hash_hex: hex::encode(head_hash),
        };
        Ok((rows, manifest))
    }
}
