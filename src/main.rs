//! leaderboard-tracker server entry point.
//!
//! Wires storage, the scraper, and the cache, then starts the Axum HTTP
//! server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use leaderboard_tracker::api;
use leaderboard_tracker::app_state::AppState;
use leaderboard_tracker::config::{AppConfig, LogFormat, StorageBackend};
use leaderboard_tracker::domain::SystemClock;
use leaderboard_tracker::source::HttpLeaderboardSource;
use leaderboard_tracker::storage::{FsObjectStore, InMemoryObjectStore, ObjectStore};

/// Slack added to the fetch timeout for the whole-request timeout.
const REQUEST_TIMEOUT_SLACK: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::from_env().context("loading configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, source = %config.source_url, "starting leaderboard-tracker");

    // Build storage
    let store: Arc<dyn ObjectStore> = match &config.storage {
        StorageBackend::Filesystem(root) => {
            tracing::info!(root = %root.display(), "using filesystem storage");
            Arc::new(FsObjectStore::new(root.clone()))
        }
        StorageBackend::Memory => {
            tracing::warn!("using in-memory storage; history is lost on restart");
            Arc::new(InMemoryObjectStore::new())
        }
    };

    // Build the scraper
    let source = HttpLeaderboardSource::new(
        config.source_url.clone(),
        config.probe_timeout,
        config.fetch_timeout,
    )
    .context("building HTTP client")?
    .with_probe_bytes(config.probe_range_bytes);

    // Build application state
    let app_state = AppState::new(store, Arc::new(source), Arc::new(SystemClock), &config);

    // Build router
    let app = api::build_router(&app_state, config.admin_enabled)
        .layer(TimeoutLayer::new(config.fetch_timeout + REQUEST_TIMEOUT_SLACK))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
