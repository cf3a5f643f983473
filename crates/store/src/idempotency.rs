//! Idempotency engine - request anchors
//!
//! One row per idempotency key. State machine: a row is born RESERVED
//! inside the posting transaction and moves to COMMITTED through
//! `idem_commit` in the same transaction; if the transaction aborts, the
//! row vanishes with it. A COMMITTED row is frozen by the guard triggers,
//! so the stored response bytes can never change after the first commit.

use crate::chain::storage_now;
use crate::error::StoreError;
use chainbank_canon::CanonicalBytes;
use chainbank_core::TxId;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

pub(crate) const STATUS_RESERVED: &str = "RESERVED";
pub(crate) const STATUS_COMMITTED: &str = "COMMITTED";

/// A persisted idempotency anchor, as the replay path needs it.
#[derive(Debug, Clone)]
pub(crate) struct AnchorRow {
    pub status: String,
    pub request_hash: String,
    pub tx_id: Option<TxId>,
}

fn anchor_from_row(row: SqliteRow) -> Result<AnchorRow, StoreError> {
    let tx_id: Option<String> = row.try_get("tx_id")?;
    let tx_id = match tx_id {
        Some(raw) => Some(
            raw.parse::<TxId>()
                .map_err(|_| StoreError::Internal(format!("malformed tx_id in anchor: {raw}")))?,
        ),
        None => None,
    };
    Ok(AnchorRow {
        status: row.try_get("status")?,
        request_hash: row.try_get("request_hash")?,
        tx_id,
    })
}

/// Load an anchor outside any write transaction (replay fast path).
pub(crate) async fn load_anchor(
    pool: &SqlitePool,
    key: &str,
) -> Result<Option<AnchorRow>, StoreError> {
    let row = sqlx::query("SELECT status, request_hash, tx_id FROM idempotency WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    row.map(anchor_from_row).transpose()
}

/// Insert the RESERVED anchor for a first write. The caller holds the
/// per-key advisory lock, so a unique violation here means the lock
/// discipline is broken, not a benign race.
pub(crate) async fn reserve(
    tx: &mut Transaction<'_, Sqlite>,
    key: &str,
    request_hash: &str,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        "INSERT INTO idempotency(key, request_hash, status, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(key)
    .bind(request_hash)
    .bind(STATUS_RESERVED)
    .bind(storage_now())
    .execute(&mut **tx)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(err) if crate::error::is_unique_violation(&err) => Err(StoreError::Internal(
            "idempotency anchor inserted concurrently despite advisory lock".into(),
        )),
        Err(err) => Err(err.into()),
    }
}

/// The guarded commit procedure: RESERVED -> COMMITTED, binding the
/// transaction id and the canonical response bytes. Returns the bound id
/// as persisted.
pub(crate) async fn idem_commit(
    tx: &mut Transaction<'_, Sqlite>,
    key: &str,
    tx_id: TxId,
    response: &CanonicalBytes,
) -> Result<TxId, StoreError> {
    let updated = sqlx::query(
        r#"
        UPDATE idempotency
           SET status = ?, tx_id = ?, response_json = ?
         WHERE key = ? AND status = ?
        "#,
    )
    .bind(STATUS_COMMITTED)
    .bind(tx_id.to_string())
    .bind(response.as_str())
    .bind(key)
    .bind(STATUS_RESERVED)
    .execute(&mut **tx)
    .await?;

    if updated.rows_affected() != 1 {
        return Err(StoreError::Internal(format!(
            "idem_commit affected {} rows for key",
            updated.rows_affected()
        )));
    }

    let bound: (String,) = sqlx::query_as("SELECT tx_id FROM idempotency WHERE key = ?")
        .bind(key)
        .fetch_one(&mut **tx)
        .await?;
    bound
        .0
        .parse::<TxId>()
        .map_err(|_| StoreError::Internal("idem_commit left a malformed tx_id".into()))
}
