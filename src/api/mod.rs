pub mod error;
pub mod handlers;
pub mod state;
pub mod types;

use anyhow::{Context, Result};
use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::ServiceConfig;
use state::AppState;

pub fn cors_layer(allowed_origin: Option<&str>) -> Result<CorsLayer> {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    Ok(match allowed_origin {
        Some(origin) => layer.allow_origin(
            HeaderValue::from_str(origin).with_context(|| format!("invalid CORS origin '{origin}'"))?,
        ),
        None => layer.allow_origin(Any),
    })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route(
            "/process-option-chain",
            post(handlers::ingest::process_option_chain),
        )
        .route("/api/ledger/{symbol}", get(handlers::ledger::get_series))
        .route("/api/ledger/{symbol}/csv", get(handlers::ledger::get_csv))
        .with_state(state)
}

pub async fn serve(config: &ServiceConfig) -> Result<()> {
    let store = config.store.build()?;
    let description = store.describe();
    let state = AppState::new(store, config.schema, config.cache_ttl);

    let app = router(state).layer(cors_layer(config.allowed_origin.as_deref())?);

    let addr = format!("{}:{}", config.host, config.port);
    info!(%addr, store = %description, schema = ?config.schema, "starting iv-ledger API");
    println!("iv-ledger API server listening on {addr}");
    println!("  Health:  GET  http://{addr}/health");
    println!("  Ingest:  POST http://{addr}/process-option-chain");
    println!("  Series:  GET  http://{addr}/api/ledger/{{symbol}}");
    println!("  CSV:     GET  http://{addr}/api/ledger/{{symbol}}/csv");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;

    axum::serve(listener, app).await.context("running server")?;

    Ok(())
}
