//! Chainbank core - domain primitives
//!
//! Leaf crate of the workspace. Everything that handles money, currencies
//! or identities goes through the types defined here.
//!
//! # Key Types
//! - `AmountCents`: strictly positive 64-bit minor units (no floats, ever)
//! - `Currency`: validated three-letter uppercase code
//! - `AccountId` / `TxId` / `EntryId` / `EventId` / `SnapshotId`: UUID newtypes

pub mod amount;
pub mod currency;
pub mod ids;

pub use amount::{AmountCents, AmountError};
pub use currency::{Currency, CurrencyError};
pub use ids::{AccountId, EntryId, EventId, SnapshotId, TxId};
