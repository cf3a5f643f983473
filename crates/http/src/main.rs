//! chainbankd - server entry point

use anyhow::Context;
use chainbank_http::build_router;
use chainbank_store::Admin;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).ok().filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_string())
}

fn env_usize_or(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|&n| n > 0)
        .unwrap_or(default)
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "chainbank=info,tower_http=warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let start = Instant::now();
    init_tracing();

    let db_path = env_or("CHAINBANK_DB_PATH", "./data/chainbank.db");
    let addr = env_or("CHAINBANK_HTTP_ADDR", "127.0.0.1:8080");
    let migrate = env_or("CHAINBANK_DB_MIGRATE", "1") == "1";
    let max_inflight = env_usize_or("CHAINBANK_HTTP_MAX_INFLIGHT", 64);

    tracing::info!(%db_path, %addr, migrate, max_inflight, "starting");

    if let Some(parent) = std::path::Path::new(&db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create data directory {}", parent.display()))?;
        }
    }

    let admin = Admin::open(&db_path)
        .await
        .with_context(|| format!("open database at {db_path}"))?;

    if migrate {
        admin.migrate().await.context("run migrations")?;
    } else {
        tracing::info!("migrations disabled");
    }

    let router = build_router(admin.runtime(), max_inflight);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;

    tracing::info!(elapsed = ?start.elapsed(), %addr, "ready");
    axum::serve(listener, router).await.context("serve")?;
    Ok(())
}
