//! Chainbank store - the storage and invariant engine
//!
//! This is the HEART of chainbank. All financial state changes go through
//! this crate: balanced double-entry postings, idempotency anchors, the
//! hash-chained append-only event log, risk snapshots, and the verifier
//! that recomputes the chain from persisted rows.
//!
//! # Principals
//! - [`Admin`] owns the database: migrations, proof export, and the guard
//!   switches used by tamper tests.
//! - [`LedgerStore`] is the runtime principal: it can only write through
//!   the defined operations; there is no raw-SQL surface on it.
//!
//! # Ordering
//! Event `seq` is the system's global ordering axis: gapless, strictly
//! monotonic, assigned under a single chain-head critical section. Write
//! throughput is deliberately capped by that section; integrity wins.

pub mod admin;
pub mod chain;
pub mod ctx;
pub mod error;
pub mod guard;
pub mod idempotency;
pub mod keylock;
pub mod posting;
pub mod risk;
pub mod schema;
pub mod store;
pub mod verify;

pub use admin::Admin;
pub use ctx::{CancelToken, OpCtx};
pub use error::{ErrorKind, StoreError};
pub use posting::TransferRequest;
pub use risk::{
    liquidity_payload_hash, valuation_payload_hash, LiquiditySnapshotInsert,
    ValuationSnapshotInsert,
};
pub use store::LedgerStore;
pub use verify::VerifyReport;
