//! Guard layer - commit-time checks and input validation
//!
//! The storage engine has no deferred constraint triggers, so the deferred
//! half of the guard layer lives here: `commit_checked` validates the
//! balanced-pair invariant for every transaction the write touched, then
//! commits. An unbalanced write never becomes visible; the transaction
//! aborts as a whole. The immediate half (append-only, frozen idempotency
//! rows, CHECK constraints) lives in `schema.rs` as triggers.

use crate::error::StoreError;
use chainbank_core::TxId;
use sqlx::{Sqlite, Transaction};

/// Trimmed, non-empty string or a Validation error naming the field.
pub(crate) fn non_empty<'a>(field: &'static str, value: &'a str) -> Result<&'a str, StoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StoreError::Validation(format!("{field} must not be empty")));
    }
    Ok(trimmed)
}

/// Balanced-pair invariant for one transaction: exactly two entries, one
/// DEBIT and one CREDIT, equal amounts, equal currencies, distinct accounts.
pub(crate) async fn assert_balanced(
    tx: &mut Transaction<'_, Sqlite>,
    tx_id: TxId,
) -> Result<(), StoreError> {
    let row = sqlx::query_as::<_, (i64, i64, i64, i64, i64, i64)>(
        r#"
        SELECT
            COUNT(*),
            COALESCE(SUM(CASE WHEN direction = 'DEBIT' THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN direction = 'CREDIT' THEN 1 ELSE 0 END), 0),
            COUNT(DISTINCT amount_cents),
            COUNT(DISTINCT currency),
            COUNT(DISTINCT account_id)
        FROM ledger_entry
        WHERE tx_id = ?
        "#,
    )
    .bind(tx_id.to_string())
    .fetch_one(&mut **tx)
    .await?;

    let (entries, debits, credits, amounts, currencies, accounts) = row;
    if entries != 2
        || debits != 1
        || credits != 1
        || amounts != 1
        || currencies != 1
        || accounts != 2
    {
        return Err(StoreError::Validation(format!(
            "balanced-pair invariant violated for tx {tx_id}: \
             entries={entries} debits={debits} credits={credits} \
             amounts={amounts} currencies={currencies} accounts={accounts}"
        )));
    }
    Ok(())
}

/// Commit with deferred checks: validate every touched transaction, then
/// commit. On violation the transaction is dropped, which rolls back all
/// of its writes including the chain head.
pub(crate) async fn commit_checked(
    mut tx: Transaction<'static, Sqlite>,
    touched: &[TxId],
) -> Result<(), StoreError> {
    for &tx_id in touched {
        assert_balanced(&mut tx, tx_id).await?;
    }
    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::Admin;
    use crate::chain::storage_now;

    async fn open() -> (Admin, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let admin = Admin::open(dir.path().join("guard.db")).await.unwrap();
        admin.migrate().await.unwrap();
        (admin, dir)
    }

    /// Insert the scaffolding a ledger_entry needs: accounts, an anchor
    /// and the ledger_tx row, all inside the given transaction.
    async fn scaffold(tx: &mut Transaction<'_, Sqlite>, tx_id: TxId) -> (String, String) {
        let now = storage_now();
        let from = chainbank_core::AccountId::generate().to_string();
        let to = chainbank_core::AccountId::generate().to_string();
        for account in [&from, &to] {
            sqlx::query(
                "INSERT INTO accounts(account_id, label, currency, created_at) VALUES (?, 'acct', 'EUR', ?)",
            )
            .bind(account)
            .bind(&now)
            .execute(&mut **tx)
            .await
            .unwrap();
        }
        sqlx::query(
            "INSERT INTO idempotency(key, request_hash, status, created_at) \
             VALUES (?, lower(hex(zeroblob(32))), 'RESERVED', ?)",
        )
        .bind(format!("k-{tx_id}"))
        .bind(&now)
        .execute(&mut **tx)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO ledger_tx(tx_id, external_ref, correlation_id, idempotency_key, created_at) \
             VALUES (?, ?, 'c-guard', ?, ?)",
        )
        .bind(tx_id.to_string())
        .bind(format!("ext-{tx_id}"))
        .bind(format!("k-{tx_id}"))
        .bind(&now)
        .execute(&mut **tx)
        .await
        .unwrap();
        (from, to)
    }

    async fn insert_raw_entry(
        tx: &mut Transaction<'_, Sqlite>,
        tx_id: TxId,
        account: &str,
        direction: &str,
        amount_cents: i64,
    ) {
        sqlx::query(
            "INSERT INTO ledger_entry(entry_id, tx_id, account_id, direction, amount_cents, currency, created_at) \
             VALUES (?, ?, ?, ?, ?, 'EUR', ?)",
        )
        .bind(chainbank_core::EntryId::generate().to_string())
        .bind(tx_id.to_string())
        .bind(account)
        .bind(direction)
        .bind(amount_cents)
        .bind(storage_now())
        .execute(&mut **tx)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_single_entry_insert_fails_at_commit_and_rolls_back() {
        let (admin, _dir) = open().await;
        let tx_id = TxId::generate();

        let mut tx = admin.pool().begin().await.unwrap();
        let (from, _) = scaffold(&mut tx, tx_id).await;
        insert_raw_entry(&mut tx, tx_id, &from, "DEBIT", 100).await;

        let err = commit_checked(tx, &[tx_id]).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)), "got {err:?}");

        // The whole transaction rolled back, entries included.
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ledger_tx WHERE tx_id = ?")
            .bind(tx_id.to_string())
            .fetch_one(admin.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_unbalanced_pair_fails_at_commit() {
        let (admin, _dir) = open().await;
        let tx_id = TxId::generate();

        let mut tx = admin.pool().begin().await.unwrap();
        let (from, to) = scaffold(&mut tx, tx_id).await;
        insert_raw_entry(&mut tx, tx_id, &from, "DEBIT", 100).await;
        insert_raw_entry(&mut tx, tx_id, &to, "CREDIT", 99).await;

        let err = commit_checked(tx, &[tx_id]).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn test_balanced_pair_commits() {
        let (admin, _dir) = open().await;
        let tx_id = TxId::generate();

        let mut tx = admin.pool().begin().await.unwrap();
        let (from, to) = scaffold(&mut tx, tx_id).await;
        insert_raw_entry(&mut tx, tx_id, &from, "DEBIT", 100).await;
        insert_raw_entry(&mut tx, tx_id, &to, "CREDIT", 100).await;

        commit_checked(tx, &[tx_id]).await.unwrap();

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ledger_entry WHERE tx_id = ?")
            .bind(tx_id.to_string())
            .fetch_one(admin.pool())
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_same_account_both_sides_fails_at_commit() {
        let (admin, _dir) = open().await;
        let tx_id = TxId::generate();

        let mut tx = admin.pool().begin().await.unwrap();
        let (from, _) = scaffold(&mut tx, tx_id).await;
        insert_raw_entry(&mut tx, tx_id, &from, "DEBIT", 100).await;
        insert_raw_entry(&mut tx, tx_id, &from, "CREDIT", 100).await;

        let err = commit_checked(tx, &[tx_id]).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }
}
