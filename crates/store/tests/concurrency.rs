//! Concurrency: same-key storms and distinct-key storms
//!
//! The same-key storm must converge on a single ledger_tx; the
//! distinct-key storm must keep seq gapless and balances exact under the
//! serialized chain head.

mod common;

use chainbank_store::OpCtx;
use common::{assert_seq_contiguous, funded_accounts, ledger, transfer};
use std::collections::HashSet;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_same_key_replays_same_tx_id() {
    let harness = ledger().await;
    let store = harness.store.clone();

    let (a, b, _) = funded_accounts(&store, 10_000, "c2").await;

    const N: usize = 50;
    let mut handles = Vec::with_capacity(N);
    for _ in 0..N {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let ctx = OpCtx::background();
            store
                .post_transfer(&ctx, &transfer(a, b, 1, "pmt-2", "k-same", "c2"))
                .await
        }));
    }

    let mut tx_ids = HashSet::new();
    for handle in handles {
        let tx_id = handle.await.expect("join").expect("post succeeds");
        tx_ids.insert(tx_id);
    }
    assert_eq!(tx_ids.len(), 1, "all calls must return the same tx_id");

    // Exactly one ledger_tx for the key, and the anchor is COMMITTED.
    let (tx_count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM ledger_tx WHERE idempotency_key = 'k-same'")
            .fetch_one(harness.admin.pool())
            .await
            .expect("count ledger_tx");
    assert_eq!(tx_count, 1);

    let (status, has_tx): (String, bool) =
        sqlx::query_as("SELECT status, tx_id IS NOT NULL FROM idempotency WHERE key = 'k-same'")
            .fetch_one(harness.admin.pool())
            .await
            .expect("anchor");
    assert_eq!(status, "COMMITTED");
    assert!(has_tx);

    let ctx = OpCtx::background();
    let (_, bal_b) = store.balance(&ctx, b).await.expect("balance b");
    assert_eq!(bal_b, 1, "exactly one economic effect");

    let report = store.verify_chain(&ctx).await.expect("verify");
    assert!(report.ok, "chain must verify: {report:?}");
    assert_seq_contiguous(&harness.admin).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_distinct_transfers_stay_consistent() {
    let harness = ledger().await;
    let store = harness.store.clone();

    let (a, b, _) = funded_accounts(&store, 50_000, "c3").await;

    const N: usize = 40;
    const AMOUNT: i64 = 2;
    let mut handles = Vec::with_capacity(N);
    for i in 0..N {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let ctx = OpCtx::background();
            let key = format!("k-distinct-{i}");
            let ext = format!("pmt-distinct-{i}");
            store
                .post_transfer(&ctx, &transfer(a, b, AMOUNT, &ext, &key, "c3"))
                .await
        }));
    }

    for handle in handles {
        handle.await.expect("join").expect("post succeeds");
    }

    let ctx = OpCtx::background();
    let (_, bal_a) = store.balance(&ctx, a).await.expect("balance a");
    let (_, bal_b) = store.balance(&ctx, b).await.expect("balance b");
    assert_eq!(bal_a, 50_000 - (N as i64) * AMOUNT);
    assert_eq!(bal_b, (N as i64) * AMOUNT);

    let report = store.verify_chain(&ctx).await.expect("verify");
    assert!(report.ok, "chain must verify: {report:?}");
    assert_seq_contiguous(&harness.admin).await;
}
