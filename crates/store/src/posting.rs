//! Posting engine - balanced transfers with strict idempotency
//!
//! One public operation: `post_transfer`. Exactly two entries per
//! transaction, one DEBIT and one CREDIT, same amount, same currency,
//! distinct accounts, anchored by an idempotency key. Replays return the
//! original transaction id; conflicting replays are rejected without
//! touching anything.

use crate::chain::{self, storage_now};
use crate::ctx::OpCtx;
use crate::error::StoreError;
use crate::guard;
use crate::idempotency::{self, AnchorRow, STATUS_COMMITTED};
use crate::keylock::key_hash64;
use crate::store::{account_currency, LedgerStore};
use chainbank_canon::{self as canon, CanonicalBytes};
use chainbank_core::{AccountId, AmountCents, Currency, EntryId, TxId};
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use sqlx::{Sqlite, Transaction};
use std::str::FromStr;

/// Inputs to `post_transfer`, as received from the caller.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub from_account: AccountId,
    pub to_account: AccountId,
    pub amount_cents: i64,
    pub currency: String,
    pub external_ref: String,
    pub idempotency_key: String,
    pub correlation_id: String,
}

/// The canonical request shape hashed for idempotency. Field order is the
/// wire contract; serialization is the typed-builder canonical form (fixed
/// keys, no whitespace, integer amount).
#[derive(Serialize)]
struct TransferShape {
    from_account_id: String,
    to_account_id: String,
    amount_cents: i64,
    currency: String,
    external_ref: String,
    idempotency_key: String,
    correlation_id: String,
}

impl TransferShape {
    fn build(req: &TransferRequest) -> Result<Self, StoreError> {
        if req.from_account == req.to_account {
            return Err(StoreError::validation(
                "from_account and to_account must differ",
            ));
        }
        let amount = AmountCents::new(req.amount_cents)?;
        let currency = Currency::from_str(&req.currency)?;
        let external_ref = guard::non_empty("external_ref", &req.external_ref)?;
        let idempotency_key = guard::non_empty("idempotency_key", &req.idempotency_key)?;
        let correlation_id = guard::non_empty("correlation_id", &req.correlation_id)?;

        Ok(Self {
            from_account_id: req.from_account.to_string(),
            to_account_id: req.to_account.to_string(),
            amount_cents: amount.cents(),
            currency: currency.code().to_string(),
            external_ref: external_ref.to_string(),
            idempotency_key: idempotency_key.to_string(),
            correlation_id: correlation_id.to_string(),
        })
    }

    /// 64-hex SHA-256 over the canonical request bytes.
    fn request_hash(&self) -> Result<String, StoreError> {
        let bytes = serde_json::to_vec(self)
            .map_err(|err| StoreError::validation(format!("unserializable request: {err}")))?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(hex::encode(hasher.finalize()))
    }
}

#[derive(Serialize)]
struct TransferPostedPayload {
    tx_id: String,
    from: String,
    to: String,
    amount_cents: i64,
    currency: String,
    external_ref: String,
    idempotency_key: String,
}

impl LedgerStore {
    /// Post a balanced transfer. At most one economic effect per
    /// `(idempotency_key, request_hash)`; replays return the original
    /// `tx_id`.
    pub async fn post_transfer(
        &self,
        ctx: &OpCtx,
        req: &TransferRequest,
    ) -> Result<TxId, StoreError> {
        let shape = TransferShape::build(req)?;
        let request_hash = shape.request_hash()?;

        // Serialize first-writes per key. Held until the operation ends,
        // so a loser of the race observes either the committed anchor or
        // nothing, never a RESERVED row without a bound tx.
        let _key = self
            .key_locks
            .acquire(key_hash64(&shape.idempotency_key))
            .await;
        ctx.ensure_live()?;

        if let Some(anchor) = idempotency::load_anchor(&self.pool, &shape.idempotency_key).await? {
            return replay_outcome(&anchor, &request_hash);
        }

        let (_held, mut tx) = self.begin_write(ctx).await?;
        idempotency::reserve(&mut tx, &shape.idempotency_key, &request_hash).await?;

        ctx.ensure_live()?;
        let from_currency = account_currency(&mut tx, req.from_account).await?;
        let to_currency = account_currency(&mut tx, req.to_account).await?;
        if from_currency != shape.currency || to_currency != shape.currency {
            return Err(StoreError::CurrencyMismatch);
        }

        let tx_id = TxId::generate();
        post_balanced_tx(&mut tx, &shape, tx_id, req.from_account, req.to_account).await?;

        // Canonical minimal response: the bytes every future replay reads.
        let response = canonical_response(tx_id)?;
        let committed =
            idempotency::idem_commit(&mut tx, &shape.idempotency_key, tx_id, &response).await?;

        ctx.ensure_live()?;
        let payload = TransferPostedPayload {
            tx_id: tx_id.to_string(),
            from: shape.from_account_id.clone(),
            to: shape.to_account_id.clone(),
            amount_cents: shape.amount_cents,
            currency: shape.currency.clone(),
            external_ref: shape.external_ref.clone(),
            idempotency_key: shape.idempotency_key.clone(),
        };
        chain::insert_event(
            &mut tx,
            "TRANSFER_POSTED",
            "LEDGER_TX",
            &tx_id.to_string(),
            &shape.correlation_id,
            &payload,
        )
        .await?;

        guard::commit_checked(tx, &[tx_id]).await?;
        Ok(committed)
    }
}

fn replay_outcome(anchor: &AnchorRow, request_hash: &str) -> Result<TxId, StoreError> {
    if anchor.request_hash != request_hash {
        return Err(StoreError::IdempotencyConflict);
    }
    if anchor.status != STATUS_COMMITTED {
        // Unreachable under the advisory lock: RESERVED rows only exist
        // inside the posting transaction.
        return Err(StoreError::Internal(
            "idempotency anchor reserved without bound tx_id".into(),
        ));
    }
    anchor.tx_id.ok_or_else(|| {
        StoreError::Internal("committed idempotency anchor missing tx_id".into())
    })
}

fn canonical_response(tx_id: TxId) -> Result<CanonicalBytes, StoreError> {
    Ok(canon::canonicalize(&json!({ "tx_id": tx_id.to_string() }))?)
}

/// The balanced-posting procedure: one ledger_tx row and exactly two
/// entries, debit side first. The deferred balanced-pair check fires at
/// commit via `guard::commit_checked`.
async fn post_balanced_tx(
    tx: &mut Transaction<'_, Sqlite>,
    shape: &TransferShape,
    tx_id: TxId,
    from_account: AccountId,
    to_account: AccountId,
) -> Result<(), StoreError> {
    let created_at = storage_now();

    let inserted = sqlx::query(
        r#"
        INSERT INTO ledger_tx(tx_id, external_ref, correlation_id, idempotency_key, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(tx_id.to_string())
    .bind(&shape.external_ref)
    .bind(&shape.correlation_id)
    .bind(&shape.idempotency_key)
    .bind(&created_at)
    .execute(&mut **tx)
    .await;
    match inserted {
        Ok(_) => {}
        Err(err) if crate::error::is_unique_violation(&err) => {
            return Err(StoreError::Validation(format!(
                "external_ref already used: {}",
                shape.external_ref
            )));
        }
        Err(err) => return Err(err.into()),
    }

    insert_entry(tx, tx_id, from_account, "DEBIT", shape, &created_at).await?;
    insert_entry(tx, tx_id, to_account, "CREDIT", shape, &created_at).await?;
    Ok(())
}

async fn insert_entry(
    tx: &mut Transaction<'_, Sqlite>,
    tx_id: TxId,
    account_id: AccountId,
    direction: &str,
    shape: &TransferShape,
    created_at: &str,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO ledger_entry(
            entry_id, tx_id, account_id, direction, amount_cents, currency, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(EntryId::generate().to_string())
    .bind(tx_id.to_string())
    .bind(account_id.to_string())
    .bind(direction)
    .bind(shape.amount_cents)
    .bind(&shape.currency)
    .bind(created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
