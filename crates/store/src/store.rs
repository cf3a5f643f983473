//! LedgerStore - the runtime principal's handle
//!
//! Exposes exactly the defined operations: account creation, aliasing,
//! balanced transfer posting, balance reads, risk snapshot inserts and
//! chain verification. There is deliberately no raw-SQL or generic
//! event-log read surface here; everything else belongs to [`crate::Admin`].

use crate::chain::{self, storage_now};
use crate::ctx::OpCtx;
use crate::error::StoreError;
use crate::guard;
use crate::keylock::KeyLocks;
use crate::verify::{self, VerifyReport};
use chainbank_core::{AccountId, Currency};
use serde::Serialize;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Serialize)]
struct AccountCreatedPayload {
    account_id: String,
    label: String,
    currency: String,
}

#[derive(Serialize)]
struct AccountAliasedPayload {
    account_id: String,
    alias: String,
}

/// Runtime handle over the ledger. Cheap to clone; all clones share the
/// chain-head lock and the advisory lock table.
#[derive(Clone)]
pub struct LedgerStore {
    pub(crate) pool: SqlitePool,
    pub(crate) head_lock: Arc<Mutex<()>>,
    pub(crate) key_locks: Arc<KeyLocks>,
}

impl LedgerStore {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            head_lock: Arc::new(Mutex::new(())),
            key_locks: KeyLocks::new(),
        }
    }

    /// Begin a write transaction inside the chain-head critical section.
    ///
    /// The returned guard must live as long as the transaction: `seq`
    /// assignment stays gapless because no two write transactions overlap.
    pub(crate) async fn begin_write(
        &self,
        ctx: &OpCtx,
    ) -> Result<(tokio::sync::OwnedMutexGuard<()>, Transaction<'static, Sqlite>), StoreError> {
        ctx.ensure_live()?;
        let held = Arc::clone(&self.head_lock).lock_owned().await;
        ctx.ensure_live()?;
        let tx = self.pool.begin().await?;
        Ok((held, tx))
    }

    /// Create an account. Appends an `ACCOUNT_CREATED` event in the same
    /// transaction.
    pub async fn create_account(
        &self,
        ctx: &OpCtx,
        label: &str,
        currency: &str,
        correlation_id: &str,
    ) -> Result<AccountId, StoreError> {
        let label = guard::non_empty("label", label)?;
        let correlation_id = guard::non_empty("correlation_id", correlation_id)?;
        let currency = Currency::from_str(currency)?;

        let account_id = AccountId::generate();
        let (_held, mut tx) = self.begin_write(ctx).await?;

        sqlx::query(
            "INSERT INTO accounts(account_id, label, currency, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(account_id.to_string())
        .bind(label)
        .bind(currency.code())
        .bind(storage_now())
        .execute(&mut *tx)
        .await?;

        let payload = AccountCreatedPayload {
            account_id: account_id.to_string(),
            label: label.to_string(),
            currency: currency.code().to_string(),
        };
        chain::insert_event(
            &mut tx,
            "ACCOUNT_CREATED",
            "ACCOUNT",
            &account_id.to_string(),
            correlation_id,
            &payload,
        )
        .await?;

        ctx.ensure_live()?;
        tx.commit().await?;
        Ok(account_id)
    }

    /// Register an alias for an existing account. Appends an
    /// `ACCOUNT_ALIASED` event in the same transaction.
    pub async fn create_account_alias(
        &self,
        ctx: &OpCtx,
        alias: &str,
        account_id: AccountId,
        correlation_id: &str,
    ) -> Result<(), StoreError> {
        let alias = guard::non_empty("alias", alias)?;
        let correlation_id = guard::non_empty("correlation_id", correlation_id)?;

        let (_held, mut tx) = self.begin_write(ctx).await?;

        // The account must exist; the FK would catch it too, but NotFound
        // is the contract, not a storage failure.
        account_currency(&mut tx, account_id).await?;

        let inserted = sqlx::query(
            "INSERT INTO account_alias(alias, account_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(alias)
        .bind(account_id.to_string())
        .bind(storage_now())
        .execute(&mut *tx)
        .await;
        match inserted {
            Ok(_) => {}
            Err(err) if crate::error::is_unique_violation(&err) => {
                return Err(StoreError::Validation(format!(
                    "alias already exists: {alias}"
                )));
            }
            Err(err) => return Err(err.into()),
        }

        let payload = AccountAliasedPayload {
            account_id: account_id.to_string(),
            alias: alias.to_string(),
        };
        chain::insert_event(
            &mut tx,
            "ACCOUNT_ALIASED",
            "ACCOUNT",
            &account_id.to_string(),
            correlation_id,
            &payload,
        )
        .await?;

        ctx.ensure_live()?;
        tx.commit().await?;
        Ok(())
    }

    /// Resolve an alias to its account.
    pub async fn resolve_alias(
        &self,
        ctx: &OpCtx,
        alias: &str,
    ) -> Result<AccountId, StoreError> {
        let alias = guard::non_empty("alias", alias)?;
        ctx.ensure_live()?;

        let row: Option<(String,)> =
            sqlx::query_as("SELECT account_id FROM account_alias WHERE alias = ?")
                .bind(alias)
                .fetch_optional(&self.pool)
                .await?;
        let (raw,) = row.ok_or(StoreError::NotFound)?;
        raw.parse::<AccountId>()
            .map_err(|_| StoreError::Internal(format!("malformed account_id for alias {alias}")))
    }

    /// Account balance: `sum(CREDIT) - sum(DEBIT)` in the account currency.
    pub async fn balance(
        &self,
        ctx: &OpCtx,
        account_id: AccountId,
    ) -> Result<(Currency, i64), StoreError> {
        ctx.ensure_live()?;

        let currency: Option<(String,)> =
            sqlx::query_as("SELECT currency FROM accounts WHERE account_id = ?")
                .bind(account_id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        let (currency,) = currency.ok_or(StoreError::NotFound)?;
        let currency = Currency::from_str(&currency)?;

        ctx.ensure_live()?;
        let (credit,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM ledger_entry \
             WHERE account_id = ? AND direction = 'CREDIT'",
        )
        .bind(account_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        let (debit,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM ledger_entry \
             WHERE account_id = ? AND direction = 'DEBIT'",
        )
        .bind(account_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok((currency, credit - debit))
    }

    /// Recompute the hash chain over all persisted events.
    pub async fn verify_chain(&self, ctx: &OpCtx) -> Result<VerifyReport, StoreError> {
        ctx.ensure_live()?;
        verify::verify_chain(&self.pool).await
    }
}

/// Currency of an existing account inside a transaction, or NotFound.
pub(crate) async fn account_currency(
    tx: &mut Transaction<'_, Sqlite>,
    account_id: AccountId,
) -> Result<String, StoreError> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT currency FROM accounts WHERE account_id = ?")
            .bind(account_id.to_string())
            .fetch_optional(&mut **tx)
            .await?;
    row.map(|(currency,)| currency).ok_or(StoreError::NotFound)
}
