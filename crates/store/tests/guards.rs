//! Guard layer: append-only rejections and frozen idempotency anchors
//!
//! These run with owner privileges on purpose: the guards must hold even
//! against raw SQL, not just against the runtime handle (which has no raw
//! SQL surface at all).

mod common;

use chainbank_store::OpCtx;
use common::{funded_accounts, ledger, transfer};

#[tokio::test]
async fn test_append_only_tables_reject_update_and_delete() {
    let harness = ledger().await;
    let store = &harness.store;
    let ctx = OpCtx::background();

    let (a, b, _) = funded_accounts(store, 10_000, "c-guard").await;
    store
        .post_transfer(&ctx, &transfer(a, b, 5, "ext-guard", "k-guard", "c-guard"))
        .await
        .expect("post");

    let forbidden = [
        "UPDATE accounts SET label = 'renamed'",
        "DELETE FROM accounts",
        "UPDATE ledger_tx SET correlation_id = 'rewritten'",
        "DELETE FROM ledger_tx",
        "UPDATE ledger_entry SET amount_cents = amount_cents + 1",
        "DELETE FROM ledger_entry",
        "UPDATE event_log SET correlation_id = 'rewritten'",
        "DELETE FROM event_log",
        "DELETE FROM idempotency",
        "DELETE FROM chain_head",
    ];
    for sql in forbidden {
        let result = harness.admin.execute_raw(sql).await;
        assert!(result.is_err(), "expected rejection for: {sql}");
    }
}

#[tokio::test]
async fn test_committed_anchor_is_frozen() {
    let harness = ledger().await;
    let store = &harness.store;
    let ctx = OpCtx::background();

    let (a, b, _) = funded_accounts(store, 10_000, "c-frozen").await;
    store
        .post_transfer(&ctx, &transfer(a, b, 5, "ext-frozen", "k-frozen", "c-frozen"))
        .await
        .expect("post");

    // Any mutation of a COMMITTED row must be rejected, including a
    // "harmless" status rewrite or a response swap.
    let attempts = [
        "UPDATE idempotency SET response_json = '{}' WHERE key = 'k-frozen'",
        "UPDATE idempotency SET status = 'RESERVED' WHERE key = 'k-frozen'",
        "UPDATE idempotency SET request_hash = lower(request_hash) WHERE key = 'k-frozen'",
    ];
    for sql in attempts {
        let result = harness.admin.execute_raw(sql).await;
        assert!(result.is_err(), "expected frozen-row rejection for: {sql}");
    }
}

#[tokio::test]
async fn test_chain_head_cannot_skip_ahead() {
    let harness = ledger().await;
    let store = &harness.store;
    let ctx = OpCtx::background();

    funded_accounts(store, 1_000, "c-head").await;

    let result = harness
        .admin
        .execute_raw("UPDATE chain_head SET last_seq = last_seq + 2 WHERE id = 0")
        .await;
    assert!(result.is_err(), "chain head must only advance by one");
}

#[tokio::test]
async fn test_check_constraints_reject_bad_rows() {
    let harness = ledger().await;

    // Bad currency shape on accounts.
    let result = harness
        .admin
        .execute_raw(
            "INSERT INTO accounts(account_id, label, currency, created_at) \
             VALUES ('00000000-0000-4000-8000-000000000001', 'x', 'eur', '2026-01-01T00:00:00.000000Z')",
        )
        .await;
    assert!(result.is_err(), "lowercase currency must be rejected");

    // RESERVED/COMMITTED are the only anchor states.
    let result = harness
        .admin
        .execute_raw(
            "INSERT INTO idempotency(key, request_hash, status, created_at) \
             VALUES ('k-bad', lower(hex(zeroblob(32))), 'PENDING', '2026-01-01T00:00:00.000000Z')",
        )
        .await;
    assert!(result.is_err(), "unknown status must be rejected");
}
