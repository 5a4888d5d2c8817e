//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::domain::Clock;
use crate::repository::{CountryDirectoryStore, IndexRepair, SnapshotRepository};
use crate::service::{LeaderboardAssembler, LeaderboardCache, RateLimiter};
use crate::source::LeaderboardSource;
use crate::storage::ObjectStore;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Memoized current leaderboard.
    pub cache: Arc<LeaderboardCache>,
    /// Snapshot reads for history endpoints.
    pub snapshots: Arc<SnapshotRepository>,
    /// Index diagnosis and rebuild.
    pub repair: IndexRepair,
    /// Player country directory.
    pub countries: Arc<CountryDirectoryStore>,
    /// Per-client limiter for `/leaderboard`.
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Wires every component over one store, source, and clock.
    #[must_use]
    pub fn new(
        store: Arc<dyn ObjectStore>,
        source: Arc<dyn LeaderboardSource>,
        clock: Arc<dyn Clock>,
        config: &AppConfig,
    ) -> Self {
        let snapshots = Arc::new(SnapshotRepository::new(
            Arc::clone(&store),
            Arc::clone(&clock),
        ));
        let countries = Arc::new(CountryDirectoryStore::new(store));
        let assembler =
            LeaderboardAssembler::new(source, Arc::clone(&snapshots), Arc::clone(&countries));
        let cache = Arc::new(LeaderboardCache::new(
            assembler,
            Arc::clone(&clock),
            config.cache_ttl,
        ));
        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit_max_requests,
            config.rate_limit_window,
            clock,
        ));
        Self {
            cache,
            repair: IndexRepair::new(Arc::clone(&snapshots)),
            snapshots,
            countries,
            rate_limiter,
        }
    }
}
