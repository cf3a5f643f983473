//! Shared harness for store integration tests
#![allow(dead_code)]

use chainbank_core::AccountId;
use chainbank_store::{Admin, LedgerStore, OpCtx, TransferRequest};
use tempfile::TempDir;
use uuid::Uuid;

pub struct TestLedger {
    pub admin: Admin,
    pub store: LedgerStore,
    _dir: TempDir,
}

/// Fresh migrated database in a disposable directory.
pub async fn ledger() -> TestLedger {
    let dir = tempfile::tempdir().expect("tempdir");
    let admin = Admin::open(dir.path().join("ledger.db"))
        .await
        .expect("open database");
    admin.migrate().await.expect("migrate");
    let store = admin.runtime();
    TestLedger {
        admin,
        store,
        _dir: dir,
    }
}

pub fn transfer(
    from: AccountId,
    to: AccountId,
    amount_cents: i64,
    external_ref: &str,
    idempotency_key: &str,
    correlation_id: &str,
) -> TransferRequest {
    TransferRequest {
        from_account: from,
        to_account: to,
        amount_cents,
        currency: "EUR".to_string(),
        external_ref: external_ref.to_string(),
        idempotency_key: idempotency_key.to_string(),
        correlation_id: correlation_id.to_string(),
    }
}

/// Create the usual trio: payer, payee and a synthetic SYSTEM account,
/// with the SYSTEM account minting `mint_cents` to the payer.
pub async fn funded_accounts(
    store: &LedgerStore,
    mint_cents: i64,
    corr: &str,
) -> (AccountId, AccountId, AccountId) {
    let ctx = OpCtx::background();
    let suffix = Uuid::new_v4();
    let a = store
        .create_account(&ctx, &format!("A-{suffix}"), "EUR", corr)
        .await
        .expect("create A");
    let b = store
        .create_account(&ctx, &format!("B-{suffix}"), "EUR", corr)
        .await
        .expect("create B");
    let sys = store
        .create_account(&ctx, &format!("SYSTEM-{suffix}"), "EUR", corr)
        .await
        .expect("create SYSTEM");

    let mint_key = format!("k-mint-{suffix}");
    let mint_ext = format!("mint-{suffix}");
    store
        .post_transfer(&ctx, &transfer(sys, a, mint_cents, &mint_ext, &mint_key, corr))
        .await
        .expect("mint");
    (a, b, sys)
}

/// Event seq values must be 1..=count with no gaps.
pub async fn assert_seq_contiguous(admin: &Admin) {
    let (count, min_seq, max_seq): (i64, i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(MIN(seq), 0), COALESCE(MAX(seq), 0) FROM event_log",
    )
    .fetch_one(admin.pool())
    .await
    .expect("seq stats");
    if count == 0 {
        return;
    }
    assert_eq!(min_seq, 1, "seq must start at 1");
    assert_eq!(
        count,
        max_seq - min_seq + 1,
        "seq not contiguous: count={count} min={min_seq} max={max_seq}"
    );
}
