//! Liveness endpoint.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;

/// Health report with a glance at the cache and history.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"healthy"` when the process answers.
    pub status: &'static str,
    /// Crate version.
    pub version: &'static str,
    /// Server time of the report.
    pub timestamp: DateTime<Utc>,
    /// `cold` or `warm`.
    pub cache_state: &'static str,
    /// Snapshots listed in the index.
    pub indexed_snapshots: usize,
}

/// `GET /health` — Service health.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Reports version, cache state, and indexed snapshot count. Never scrapes the source.",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let cache = state.cache.status().await;
    let index = state.snapshots.load_index().await;
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
        cache_state: cache.state,
        indexed_snapshots: index.snapshots.len(),
    })
}

/// Root-level system routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}
