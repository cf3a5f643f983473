//! Handlers and error mapping

use crate::api::*;
use crate::router::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chainbank_core::AccountId;
use chainbank_store::{ErrorKind, OpCtx, StoreError, TransferRequest, VerifyReport};
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

/// Caller budgets per operation.
const ACCOUNT_BUDGET: Duration = Duration::from_secs(3);
const TRANSFER_BUDGET: Duration = Duration::from_secs(5);
const BALANCE_BUDGET: Duration = Duration::from_secs(3);

/// Boundary error: a store error or an edge-level validation failure.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let status = match err.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::IdempotencyConflict => StatusCode::CONFLICT,
            ErrorKind::Cancelled => StatusCode::REQUEST_TIMEOUT,
            ErrorKind::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // Never leak internals on 5xx.
        let message = if status.is_server_error() {
            tracing::error!(error = ?err, "storage failure");
            "internal error".to_string()
        } else {
            err.to_string()
        };
        Self { status, message }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(format!("invalid json: {rejection}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

fn correlation_or_new(explicit: &str, headers: &HeaderMap) -> String {
    let explicit = explicit.trim();
    if !explicit.is_empty() {
        return explicit.to_string();
    }
    headers
        .get("x-correlation-id")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Run an operation under its caller budget. The elapsed-timer path and
/// the in-operation deadline check surface the same error kind.
async fn with_budget<T>(
    budget: Duration,
    op: impl std::future::Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    match tokio::time::timeout(budget, op).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::DeadlineExceeded),
    }
}

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn create_account(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateAccountResponse>), ApiError> {
    let Json(req) = body?;
    let corr = correlation_or_new("", &headers);
    let ctx = OpCtx::with_timeout(ACCOUNT_BUDGET);

    let account_id = with_budget(
        ACCOUNT_BUDGET,
        state
            .store
            .create_account(&ctx, &req.label, &req.currency, &corr),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateAccountResponse {
            account_id: account_id.as_uuid(),
        }),
    ))
}

pub async fn post_transfer(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<PostTransferRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PostTransferResponse>), ApiError> {
    let Json(req) = body?;
    let corr = correlation_or_new(&req.correlation_id, &headers);
    let ctx = OpCtx::with_timeout(TRANSFER_BUDGET);

    let transfer = TransferRequest {
        from_account: AccountId::from_uuid(req.from_account_id),
        to_account: AccountId::from_uuid(req.to_account_id),
        amount_cents: req.amount_cents,
        currency: req.currency,
        external_ref: req.external_ref,
        idempotency_key: req.idempotency_key,
        correlation_id: corr,
    };

    let tx_id = with_budget(TRANSFER_BUDGET, state.store.post_transfer(&ctx, &transfer)).await?;

    Ok((
        StatusCode::CREATED,
        Json(PostTransferResponse {
            tx_id: tx_id.as_uuid(),
        }),
    ))
}

pub async fn balance(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let account_id: Uuid = account_id
        .parse()
        .map_err(|_| ApiError::bad_request("invalid account id"))?;
    let ctx = OpCtx::with_timeout(BALANCE_BUDGET);

    let (currency, balance_cents) = with_budget(
        BALANCE_BUDGET,
        state.store.balance(&ctx, AccountId::from_uuid(account_id)),
    )
    .await?;

    Ok(Json(BalanceResponse {
        account_id,
        currency: currency.code().to_string(),
        balance_cents,
    }))
}

pub async fn verify_chain(State(state): State<AppState>) -> Result<Json<VerifyReport>, ApiError> {
    let ctx = OpCtx::background();
    let report = state.store.verify_chain(&ctx).await?;
    Ok(Json(report))
}
