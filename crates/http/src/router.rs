//! Router and edge backpressure
//!
//! The edge bounds in-flight requests: beyond the limit, requests are shed
//! with 503 instead of queueing forever against a saturated store. The
//! core itself never queues.

use crate::handlers;
use axum::error_handling::HandleErrorLayer;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{BoxError, Json, Router};
use chainbank_store::LedgerStore;
use serde_json::json;
use tower::ServiceBuilder;

pub const DEFAULT_MAX_INFLIGHT: usize = 64;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: LedgerStore,
}

/// Build the service with edge backpressure applied.
pub fn build_router(store: LedgerStore, max_inflight: usize) -> Router {
    let max_inflight = if max_inflight == 0 {
        DEFAULT_MAX_INFLIGHT
    } else {
        max_inflight
    };

    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/v1/accounts", post(handlers::create_account))
        .route("/v1/transfers", post(handlers::post_transfer))
        .route("/v1/accounts/:account_id/balance", get(handlers::balance))
        .route("/v1/chain/verify", get(handlers::verify_chain))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_edge_error))
                .load_shed()
                .concurrency_limit(max_inflight),
        )
        .with_state(AppState { store })
}

async fn handle_edge_error(err: BoxError) -> impl IntoResponse {
    if err.is::<tower::load_shed::error::Overloaded>() {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "server busy" })),
        )
    } else {
        tracing::error!(error = %err, "edge middleware failure");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "internal error" })),
        )
    }
}
