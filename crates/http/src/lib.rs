//! Chainbank HTTP - the external collaborator
//!
//! Thin translation layer over the core: decode JSON (unknown fields are
//! a validation error), attach correlation ids, enforce per-operation
//! deadlines, map `StoreError` kinds to status codes, and shed load at
//! the edge instead of queueing into a saturated store.

pub mod api;
pub mod handlers;
pub mod router;

pub use api::{
    BalanceResponse, CreateAccountRequest, CreateAccountResponse, PostTransferRequest,
    PostTransferResponse,
};
pub use router::{build_router, AppState};
