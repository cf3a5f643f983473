//! Verifier - recompute the chain from persisted rows
//!
//! Read path only. Walks the event log in seq order, recomputing every
//! link, and reports either `ok` or the first break with its reason. The
//! checks run in a fixed order per row so a multiply-damaged row reports
//! its first failing property deterministically.

use crate::error::StoreError;
use chainbank_canon::{self as canon, CanonicalBytes};
use chainbank_proof::EventMaterial;
use serde::Serialize;
use serde_json::Value;
use sqlx::SqlitePool;

/// Outcome of a chain verification run.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    pub ok: bool,
    pub break_seq: Option<i64>,
    pub reason: Option<String>,
    pub head_seq: i64,
    pub head_hash_hex: String,
    pub count: i64,
}

#[derive(sqlx::FromRow)]
struct EventRow {
    seq: i64,
    event_id: String,
    event_type: String,
    aggregate_type: String,
    aggregate_id: String,
    correlation_id: String,
    payload_json: String,
    payload_canonical: String,
    payload_hash: Vec<u8>,
    prev_hash: Vec<u8>,
    hash: Vec<u8>,
    created_at: String,
}

pub(crate) async fn verify_chain(pool: &SqlitePool) -> Result<VerifyReport, StoreError> {
    let (head_seq, head_hash): (i64, Vec<u8>) =
        sqlx::query_as("SELECT last_seq, last_hash FROM chain_head WHERE id = 0")
            .fetch_one(pool)
            .await?;
    let head_hash_hex = hex::encode(&head_hash);

    let rows = sqlx::query_as::<_, EventRow>(
        r#"
        SELECT seq, event_id, event_type, aggregate_type, aggregate_id,
               correlation_id, payload_json, payload_canonical, payload_hash,
               prev_hash, hash, created_at
          FROM event_log
         ORDER BY seq ASC
        "#,
    )
    .fetch_all(pool)
    .await?;
    let count = rows.len() as i64;

    let fail = |seq: i64, reason: &str| VerifyReport {
        ok: false,
        break_seq: Some(seq),
        reason: Some(reason.to_string()),
        head_seq,
        head_hash_hex: head_hash_hex.clone(),
        count,
    };

    let mut prev: Vec<u8> = Vec::new();
    let mut last_seq: i64 = 0;

    for row in &rows {
        if row.seq != last_seq + 1 {
            return Ok(fail(row.seq, "bad seq"));
        }
        if row.prev_hash != prev {
            return Ok(fail(row.seq, "prev_hash mismatch"));
        }
        if row.payload_canonical.is_empty() {
            return Ok(fail(row.seq, "payload_canonical empty"));
        }

        let canonical = CanonicalBytes::from_stored(row.payload_canonical.clone());
        let canonical_value = match canon::parse(&canonical) {
            Ok(v) => v,
            Err(_) => return Ok(fail(row.seq, "payload_canonical != payload_json")),
        };
        let json_value: Value = match serde_json::from_str(&row.payload_json) {
            Ok(v) => v,
            Err(_) => return Ok(fail(row.seq, "payload_canonical != payload_json")),
        };
        if canonical_value != json_value {
            return Ok(fail(row.seq, "payload_canonical != payload_json"));
        }

        if canon::sha256(&canonical).as_slice() != row.payload_hash.as_slice() {
            return Ok(fail(row.seq, "payload_hash mismatch"));
        }

        let recomputed = EventMaterial {
            seq: row.seq,
            prev_hash_hex: &hex::encode(&row.prev_hash),
            event_id: &row.event_id,
            created_at: &row.created_at,
            event_type: &row.event_type,
            aggregate_type: &row.aggregate_type,
            aggregate_id: &row.aggregate_id,
            correlation_id: &row.correlation_id,
            payload_hash_hex: &hex::encode(&row.payload_hash),
        }
        .hash();
        if recomputed.as_slice() != row.hash.as_slice() {
            return Ok(fail(row.seq, "hash mismatch"));
        }

        prev = row.hash.clone();
        last_seq = row.seq;
    }

    if last_seq != head_seq {
        let report = fail(last_seq, "head last_seq mismatch");
        tracing::warn!(last_seq, head_seq, "chain verification failed");
        return Ok(report);
    }
    if !rows.is_empty() && prev != head_hash {
        let report = fail(last_seq, "head last_hash mismatch");
        tracing::warn!(last_seq, "chain verification failed");
        return Ok(report);
    }

    Ok(VerifyReport {
        ok: true,
        break_seq: None,
        reason: None,
        head_seq,
        head_hash_hex,
        count,
    })
}
