//! Risk snapshot layer - append-only valuation and liquidity rows
//!
//! Snapshots arrive with a caller-built canonical payload and payload
//! hash; the engine validates ranges and the canonical/semantic match,
//! inserts the row, and appends exactly one matching event to the chain
//! in the same transaction. The payload-hash conventions are exported so
//! ingesters and external verifiers reproduce the exact bytes.

use crate::chain::{self, format_instant};
use crate::ctx::OpCtx;
use crate::error::StoreError;
use crate::guard;
use crate::store::LedgerStore;
use chainbank_canon::{self as canon, CanonicalBytes};
use chainbank_core::{Currency, EventId, SnapshotId};
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// A valuation snapshot to insert.
#[derive(Debug, Clone)]
pub struct ValuationSnapshotInsert {
    pub ingestion_correlation_id: String,
    pub asset_type: String,
    pub asset_id: String,
    pub as_of: DateTime<Utc>,
    pub price: Decimal,
    pub currency: Currency,
    pub source: String,
    pub confidence: i64,
    pub payload_json: Value,
    pub payload_canonical: CanonicalBytes,
    pub payload_hash: [u8; 32],
}

/// A liquidity snapshot to insert.
#[derive(Debug, Clone)]
pub struct LiquiditySnapshotInsert {
    pub ingestion_correlation_id: String,
    pub asset_type: String,
    pub asset_id: String,
    pub as_of: DateTime<Utc>,
    pub haircut_bps: i64,
    pub time_to_cash_seconds: i64,
    pub source: String,
    pub payload_json: Value,
    pub payload_canonical: CanonicalBytes,
    pub payload_hash: [u8; 32],
}

/// `as_of` rendering used inside the payload-hash preimages: RFC 3339 UTC
/// with `Z` and trailing-zero-free subsecond precision.
fn rfc3339_nano(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Domain-separated payload hash for valuation snapshots.
pub fn valuation_payload_hash(
    asset_type: &str,
    asset_id: &str,
    as_of: DateTime<Utc>,
    price: &Decimal,
    currency: &Currency,
    source: &str,
    confidence: i64,
    payload: &CanonicalBytes,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(
        format!(
            "valuation_snapshot:v1|{}|{}|{}|{}|{}|{}|{}|",
            asset_type,
            asset_id,
            rfc3339_nano(as_of),
            price,
            currency.code(),
            source,
            confidence
        )
        .as_bytes(),
    );
    hasher.update(payload.as_bytes());
    hasher.finalize().into()
}

/// Domain-separated payload hash for liquidity snapshots.
pub fn liquidity_payload_hash(
    asset_type: &str,
    asset_id: &str,
    as_of: DateTime<Utc>,
    haircut_bps: i64,
    time_to_cash_seconds: i64,
    source: &str,
    payload: &CanonicalBytes,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(
        format!(
            "liquidity_snapshot:v1|{}|{}|{}|{}|{}|{}|",
            asset_type,
            asset_id,
            rfc3339_nano(as_of),
            haircut_bps,
            time_to_cash_seconds,
            source
        )
        .as_bytes(),
    );
    hasher.update(payload.as_bytes());
    hasher.finalize().into()
}

fn check_payload(payload_json: &Value, payload_canonical: &CanonicalBytes) -> Result<(), StoreError> {
    if payload_canonical.is_empty() {
        return Err(StoreError::validation("payload_canonical is empty"));
    }
    let reparsed = canon::parse(payload_canonical)?;
    if &reparsed != payload_json {
        return Err(StoreError::validation(
            "payload_canonical does not match payload_json",
        ));
    }
    Ok(())
}

impl LedgerStore {
    /// Insert one valuation snapshot and its `VALUATION_SNAPSHOT` event.
    pub async fn insert_valuation_snapshot(
        &self,
        ctx: &OpCtx,
        ins: &ValuationSnapshotInsert,
    ) -> Result<SnapshotId, StoreError> {
        let ingestion_correlation_id =
            guard::non_empty("ingestion_correlation_id", &ins.ingestion_correlation_id)?;
        let asset_type = guard::non_empty("asset_type", &ins.asset_type)?;
        let asset_id = guard::non_empty("asset_id", &ins.asset_id)?;
        let source = guard::non_empty("source", &ins.source)?;
        if !(0..=100).contains(&ins.confidence) {
            return Err(StoreError::validation(format!(
                "confidence must be in [0,100], got {}",
                ins.confidence
            )));
        }
        if ins.price < Decimal::ZERO {
            return Err(StoreError::validation(format!(
                "price must be >= 0, got {}",
                ins.price
            )));
        }
        check_payload(&ins.payload_json, &ins.payload_canonical)?;

        let snapshot_id = SnapshotId::generate();
        let (_held, mut tx) = self.begin_write(ctx).await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO valuation_snapshot(
                snapshot_id, ingestion_correlation_id, asset_type, asset_id,
                as_of, price, currency, source, confidence,
                payload_json, payload_canonical, payload_hash, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(snapshot_id.to_string())
        .bind(ingestion_correlation_id)
        .bind(asset_type)
        .bind(asset_id)
        .bind(format_instant(ins.as_of))
        .bind(ins.price.to_string())
        .bind(ins.currency.code())
        .bind(source)
        .bind(ins.confidence)
        .bind(ins.payload_json.to_string())
        .bind(ins.payload_canonical.as_str())
        .bind(&ins.payload_hash[..])
        .bind(chain::storage_now())
        .execute(&mut *tx)
        .await;
        map_snapshot_insert(inserted)?;

        chain::append_event(
            &mut tx,
            chain::EventInsert {
                event_id: EventId::generate(),
                event_type: "VALUATION_SNAPSHOT",
                aggregate_type: "RISK_SNAPSHOT",
                aggregate_id: &snapshot_id.to_string(),
                correlation_id: ingestion_correlation_id,
                payload_json: &ins.payload_json,
                payload_canonical: &ins.payload_canonical,
            },
        )
        .await?;

        ctx.ensure_live()?;
        tx.commit().await?;
        Ok(snapshot_id)
    }

    /// Insert one liquidity snapshot and its `LIQUIDITY_SNAPSHOT` event.
    pub async fn insert_liquidity_snapshot(
        &self,
        ctx: &OpCtx,
        ins: &LiquiditySnapshotInsert,
    ) -> Result<SnapshotId, StoreError> {
        let ingestion_correlation_id =
            guard::non_empty("ingestion_correlation_id", &ins.ingestion_correlation_id)?;
        let asset_type = guard::non_empty("asset_type", &ins.asset_type)?;
        let asset_id = guard::non_empty("asset_id", &ins.asset_id)?;
        let source = guard::non_empty("source", &ins.source)?;
        if !(0..=10_000).contains(&ins.haircut_bps) {
            return Err(StoreError::validation(format!(
                "haircut_bps must be in [0,10000], got {}",
                ins.haircut_bps
            )));
        }
        if ins.time_to_cash_seconds < 0 {
            return Err(StoreError::validation(format!(
                "time_to_cash_seconds must be >= 0, got {}",
                ins.time_to_cash_seconds
            )));
        }
        check_payload(&ins.payload_json, &ins.payload_canonical)?;

        let snapshot_id = SnapshotId::generate();
        let (_held, mut tx) = self.begin_write(ctx).await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO liquidity_snapshot(
                snapshot_id, ingestion_correlation_id, asset_type, asset_id,
                as_of, haircut_bps, time_to_cash_seconds, source,
                payload_json, payload_canonical, payload_hash, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(snapshot_id.to_string())
        .bind(ingestion_correlation_id)
        .bind(asset_type)
        .bind(asset_id)
        .bind(format_instant(ins.as_of))
        .bind(ins.haircut_bps)
        .bind(ins.time_to_cash_seconds)
        .bind(source)
        .bind(ins.payload_json.to_string())
        .bind(ins.payload_canonical.as_str())
        .bind(&ins.payload_hash[..])
        .bind(chain::storage_now())
        .execute(&mut *tx)
        .await;
        map_snapshot_insert(inserted)?;

        chain::append_event(
            &mut tx,
            chain::EventInsert {
                event_id: EventId::generate(),
                event_type: "LIQUIDITY_SNAPSHOT",
                aggregate_type: "RISK_SNAPSHOT",
                aggregate_id: &snapshot_id.to_string(),
                correlation_id: ingestion_correlation_id,
                payload_json: &ins.payload_json,
                payload_canonical: &ins.payload_canonical,
            },
        )
        .await?;

        ctx.ensure_live()?;
        tx.commit().await?;
        Ok(snapshot_id)
    }
}

fn map_snapshot_insert(
    result: Result<sqlx::sqlite::SqliteQueryResult, sqlx::Error>,
) -> Result<(), StoreError> {
    match result {
        Ok(_) => Ok(()),
        Err(err) if crate::error::is_unique_violation(&err) => Err(StoreError::validation(
            "duplicate snapshot for (asset_type, asset_id, as_of, source, payload_hash)",
        )),
        Err(err) => Err(err.into()),
    }
}
