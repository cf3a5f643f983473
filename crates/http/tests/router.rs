//! End-to-end router behavior against a real (temporary) store

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chainbank_store::Admin;
use chainbank_http::build_router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::util::ServiceExt;

async fn test_router() -> (Router, TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let admin = Admin::open(dir.path().join("http.db"))
        .await
        .expect("open database");
    admin.migrate().await.expect("migrate");
    (build_router(admin.runtime(), 64), dir)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-correlation-id", "t-http")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

async fn create_account(router: &Router, label: &str, currency: &str) -> String {
    let response = router
        .clone()
        .oneshot(post_json(
            "/v1/accounts",
            json!({"label": label, "currency": currency}),
        ))
        .await
        .expect("oneshot");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    body["account_id"].as_str().expect("account_id").to_string()
}

#[tokio::test]
async fn test_healthz() {
    let (router, _dir) = test_router().await;
    let response = router.oneshot(get("/healthz")).await.expect("oneshot");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_validation_maps_to_400() {
    let (router, _dir) = test_router().await;

    // Bad currency.
    let response = router
        .clone()
        .oneshot(post_json(
            "/v1/accounts",
            json!({"label": "x", "currency": "EURO"}),
        ))
        .await
        .expect("oneshot");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Unknown JSON field.
    let response = router
        .clone()
        .oneshot(post_json(
            "/v1/accounts",
            json!({"label": "x", "currency": "EUR", "surprise": 1}),
        ))
        .await
        .expect("oneshot");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Malformed account id in the path.
    let response = router
        .oneshot(get("/v1/accounts/not-a-uuid/balance"))
        .await
        .expect("oneshot");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_transfer_flow_with_replay_and_conflict() {
    let (router, _dir) = test_router().await;

    let a = create_account(&router, "A", "EUR").await;
    let b = create_account(&router, "B", "EUR").await;
    let sys = create_account(&router, "SYSTEM", "EUR").await;

    let mint = json!({
        "from_account_id": sys,
        "to_account_id": a,
        "amount_cents": 10000,
        "currency": "EUR",
        "external_ref": "mint-1",
        "idempotency_key": "k-mint-1",
        "correlation_id": "c1"
    });
    let response = router
        .clone()
        .oneshot(post_json("/v1/transfers", mint))
        .await
        .expect("oneshot");
    assert_eq!(response.status(), StatusCode::CREATED);

    let payment = json!({
        "from_account_id": a,
        "to_account_id": b,
        "amount_cents": 2500,
        "currency": "EUR",
        "external_ref": "pmt-1",
        "idempotency_key": "k-pmt-1",
        "correlation_id": "c1"
    });
    let response = router
        .clone()
        .oneshot(post_json("/v1/transfers", payment.clone()))
        .await
        .expect("oneshot");
    assert_eq!(response.status(), StatusCode::CREATED);
    let tx1 = body_json(response).await["tx_id"].as_str().unwrap().to_string();

    // Byte-identical replay returns the same tx id.
    let response = router
        .clone()
        .oneshot(post_json("/v1/transfers", payment.clone()))
        .await
        .expect("oneshot");
    assert_eq!(response.status(), StatusCode::CREATED);
    let tx2 = body_json(response).await["tx_id"].as_str().unwrap().to_string();
    assert_eq!(tx1, tx2);

    // Same key, different amount: 409.
    let mut conflicting = payment.clone();
    conflicting["amount_cents"] = json!(2501);
    conflicting["external_ref"] = json!("pmt-1-retry");
    let response = router
        .clone()
        .oneshot(post_json("/v1/transfers", conflicting))
        .await
        .expect("oneshot");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Balances.
    let response = router
        .clone()
        .oneshot(get(&format!("/v1/accounts/{a}/balance")))
        .await
        .expect("oneshot");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["balance_cents"], 7500);
    assert_eq!(body["currency"], "EUR");

    // Unknown account: 404.
    let response = router
        .clone()
        .oneshot(get("/v1/accounts/00000000-0000-4000-8000-000000000099/balance"))
        .await
        .expect("oneshot");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Chain verifies over everything that happened.
    let response = router
        .oneshot(get("/v1/chain/verify"))
        .await
        .expect("oneshot");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn test_error_bodies_carry_generic_message_on_5xx_shape() {
    let (router, _dir) = test_router().await;

    // A 4xx body carries the specific message.
    let response = router
        .clone()
        .oneshot(post_json(
            "/v1/accounts",
            json!({"label": "", "currency": "EUR"}),
        ))
        .await
        .expect("oneshot");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("label"));
}
