//! Request and response bodies
//!
//! Requests reject unknown fields: a typo'd field name is a client bug
//! and must surface as a validation error, not be silently dropped.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateAccountRequest {
    pub label: String,
    pub currency: String,
}

#[derive(Debug, Serialize)]
pub struct CreateAccountResponse {
    pub account_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostTransferRequest {
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub external_ref: String,
    pub idempotency_key: String,
    /// Falls back to the `X-Correlation-Id` header, then to a generated id.
    #[serde(default)]
    pub correlation_id: String,
}

#[derive(Debug, Serialize)]
pub struct PostTransferResponse {
    pub tx_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub account_id: Uuid,
    pub currency: String,
    pub balance_cents: i64,
}
