//! Read-only HTTP API.
//!
//! The in-process stand-in for external UI consumers: everything served
//! here comes from [`StateStore::snapshot`] or [`StateStore::counters`];
//! nothing mutates pipeline state.

use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::config::ApiConfig;
use crate::error::{MonSrvError, Result};
use crate::runtime::Shutdown;
use crate::store::{Snapshot, StateStore};

/// Build the API router
pub fn router(store: Arc<StateStore>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/snapshot", get(get_snapshot))
        .route("/api/v1/counters", get(get_counters))
        .with_state(store)
}

/// Bind and serve the API until shutdown
pub async fn serve(cfg: ApiConfig, store: Arc<StateStore>, shutdown: Shutdown) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .map_err(|e| MonSrvError::config(format!("api address: {}", e)))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API listening on {}", addr);

    axum::serve(listener, router(store))
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await
        .map_err(|e| MonSrvError::network(format!("api server: {}", e)))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "monsrv",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn get_snapshot(State(store): State<Arc<StateStore>>) -> Json<Snapshot> {
    Json(store.snapshot())
}

async fn get_counters(State(store): State<Arc<StateStore>>) -> Json<Value> {
    Json(serde_json::to_value(store.counters()).unwrap_or_else(|_| json!({})))
}
