//! Chain engine - serialized event appends
//!
//! The single entry point for event_log inserts. Inside the caller's
//! transaction (and under the store's chain-head lock) it reads the head,
//! assigns `seq`/`prev_hash`/`created_at`, hashes the canonical payload,
//! hashes the material, advances the head and inserts the row. Any failure
//! aborts the caller's transaction, rolling the head back with it.

use crate::error::StoreError;
use crate::guard;
use chainbank_canon::{self as canon, CanonicalBytes};
use chainbank_core::EventId;
use chainbank_proof::EventMaterial;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use sqlx::{Sqlite, Transaction};

/// Render an instant the way storage does: UTC, microsecond precision,
/// `Z` suffix. Fixed width, so lexicographic order equals chronological
/// order.
pub(crate) fn format_instant(t: chrono::DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Storage-assigned insert instant.
pub(crate) fn storage_now() -> String {
    format_instant(Utc::now())
}

/// One event append, fields as the caller supplies them.
pub(crate) struct EventInsert<'a> {
    pub event_id: EventId,
    pub event_type: &'a str,
    pub aggregate_type: &'a str,
    pub aggregate_id: &'a str,
    pub correlation_id: &'a str,
    pub payload_json: &'a Value,
    pub payload_canonical: &'a CanonicalBytes,
}

/// Append one event row and advance the chain head. Returns the assigned seq.
pub(crate) async fn append_event(
    tx: &mut Transaction<'_, Sqlite>,
    ev: EventInsert<'_>,
) -> Result<i64, StoreError> {
    let event_type = guard::non_empty("event_type", ev.event_type)?;
    let aggregate_type = guard::non_empty("aggregate_type", ev.aggregate_type)?;
    let aggregate_id = guard::non_empty("aggregate_id", ev.aggregate_id)?;
    let correlation_id = guard::non_empty("correlation_id", ev.correlation_id)?;

    if ev.payload_canonical.is_empty() {
        return Err(StoreError::validation("payload_canonical is empty"));
    }
    let reparsed = canon::parse(ev.payload_canonical)?;
    if &reparsed != ev.payload_json {
        return Err(StoreError::validation(
            "payload_canonical does not match payload_json",
        ));
    }

    let head = sqlx::query_as::<_, (i64, Vec<u8>)>(
        "SELECT last_seq, last_hash FROM chain_head WHERE id = 0",
    )
    .fetch_one(&mut **tx)
    .await?;
    let (last_seq, last_hash) = head;

    let seq = last_seq + 1;
    let created_at = storage_now();
    let payload_hash = canon::sha256(ev.payload_canonical);

    let event_id = ev.event_id.to_string();
    let prev_hash_hex = hex::encode(&last_hash);
    let payload_hash_hex = hex::encode(payload_hash);
    let hash = EventMaterial {
        seq,
        prev_hash_hex: &prev_hash_hex,
        event_id: &event_id,
        created_at: &created_at,
        event_type,
        aggregate_type,
        aggregate_id,
        correlation_id,
        payload_hash_hex: &payload_hash_hex,
    }
    .hash();

    let advanced = sqlx::query(
        "UPDATE chain_head SET last_seq = ?, last_hash = ? WHERE id = 0 AND last_seq = ?",
    )
    .bind(seq)
    .bind(&hash[..])
    .bind(last_seq)
    .execute(&mut **tx)
    .await?;
    if advanced.rows_affected() != 1 {
        return Err(StoreError::Internal(
            "chain head moved inside the critical section".into(),
        ));
    }

    sqlx::query(
        r#"
        INSERT INTO event_log(
            seq, event_id, event_type, aggregate_type, aggregate_id,
            correlation_id, payload_json, payload_canonical, payload_hash,
            prev_hash, hash, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(seq)
    .bind(&event_id)
    .bind(event_type)
    .bind(aggregate_type)
    .bind(aggregate_id)
    .bind(correlation_id)
    .bind(ev.payload_json.to_string())
    .bind(ev.payload_canonical.as_str())
    .bind(&payload_hash[..])
    .bind(&last_hash[..])
    .bind(&hash[..])
    .bind(&created_at)
    .execute(&mut **tx)
    .await?;

    tracing::debug!(seq, event_type, aggregate_type, "event appended");
    Ok(seq)
}

/// Canonicalize a typed payload and append it as an event.
pub(crate) async fn insert_event<T: Serialize>(
    tx: &mut Transaction<'_, Sqlite>,
    event_type: &str,
    aggregate_type: &str,
    aggregate_id: &str,
    correlation_id: &str,
    payload: &T,
) -> Result<i64, StoreError> {
    let payload_json = serde_json::to_value(payload)
        .map_err(|err| StoreError::validation(format!("unserializable payload: {err}")))?;
    let payload_canonical = canon::canonicalize(&payload_json)?;

    append_event(
        tx,
        EventInsert {
            event_id: EventId::generate(),
            event_type,
            aggregate_type,
            aggregate_id,
            correlation_id,
            payload_json: &payload_json,
            payload_canonical: &payload_canonical,
        },
    )
    .await
}
