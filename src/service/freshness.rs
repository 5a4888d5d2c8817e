//! Memoization of the current leaderboard with change-detection.
//!
//! One slot. A cold slot always recomputes. A warm slot asks the source
//! for its fingerprint first: a match serves the cached view, a change
//! recomputes, and a failed probe falls back to a TTL on the cached
//! value. A recomputed view that fails validation is never stored. When
//! a recompute fails and something is cached, the old view is served
//! marked stale.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use super::assembler::{AssembleError, Assembled, BackgroundTasks, LeaderboardAssembler};
use crate::domain::{Clock, LeaderboardView};

/// How a [`CachedView`] was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Recomputed for this request.
    Fresh,
    /// Cached; the source fingerprint is unchanged.
    FingerprintMatch,
    /// Cached; the probe failed but the TTL has not elapsed.
    WithinTtl,
    /// Cached; a recompute was needed and failed.
    Stale {
        /// Human-readable reason, surfaced to clients.
        warning: String,
    },
}

/// A view returned by [`LeaderboardCache::get`].
#[derive(Debug)]
pub struct CachedView {
    /// The leaderboard.
    pub view: Arc<LeaderboardView>,
    /// Where it came from.
    pub outcome: CacheOutcome,
    /// Persistence spawned by a recompute; empty otherwise.
    pub background: BackgroundTasks,
}

impl CachedView {
    fn cached(view: Arc<LeaderboardView>, outcome: CacheOutcome) -> Self {
        Self {
            view,
            outcome,
            background: BackgroundTasks::default(),
        }
    }

    /// Whether the view is served past a failed recompute.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        matches!(self.outcome, CacheOutcome::Stale { .. })
    }

    /// Warning text for stale responses.
    #[must_use]
    pub fn warning(&self) -> Option<&str> {
        match &self.outcome {
            CacheOutcome::Stale { warning } => Some(warning),
            _ => None,
        }
    }
}

/// Cache state for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    /// `"cold"` or `"warm"`.
    pub state: &'static str,
    /// When the cached view was computed.
    pub cached_at: Option<DateTime<Utc>>,
    /// Fingerprint of the cached view.
    pub webpage_timestamp: Option<String>,
    /// Seconds since the view was computed.
    pub age_secs: Option<i64>,
    /// Configured fallback TTL.
    pub ttl_secs: u64,
}

#[derive(Debug, Clone)]
struct Entry {
    view: Arc<LeaderboardView>,
    cached_at: DateTime<Utc>,
    generation: u64,
}

/// Rejects a view that breaks the record invariants so it never reaches
/// the slot.
fn validated(assembled: Assembled) -> Result<Assembled, AssembleError> {
    match assembled.view.validate() {
        Ok(()) => Ok(assembled),
        Err(errors) => {
            tracing::error!(?errors, "assembled leaderboard failed validation");
            Err(AssembleError::InvalidOutput(errors))
        }
    }
}

/// Single-slot leaderboard cache.
#[derive(Debug)]
pub struct LeaderboardCache {
    assembler: LeaderboardAssembler,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    slot: RwLock<Option<Entry>>,
    refresh: Mutex<()>,
    generations: AtomicU64,
}

impl LeaderboardCache {
    /// Creates a cold cache.
    #[must_use]
    pub fn new(assembler: LeaderboardAssembler, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            assembler,
            clock,
            ttl,
            slot: RwLock::new(None),
            refresh: Mutex::new(()),
            generations: AtomicU64::new(0),
        }
    }

    /// Returns the current leaderboard, recomputing when needed.
    ///
    /// # Errors
    ///
    /// Returns the [`AssembleError`] only when a recompute fails and
    /// nothing is cached.
    pub async fn get(&self) -> Result<CachedView, AssembleError> {
        let current = self.slot.read().await.clone();
        if let Some(entry) = &current {
            match self.assembler.probe_fingerprint().await {
                Ok(fingerprint) if fingerprint == entry.view.webpage_timestamp => {
                    tracing::debug!("leaderboard fingerprint unchanged, serving cache");
                    return Ok(CachedView::cached(
                        Arc::clone(&entry.view),
                        CacheOutcome::FingerprintMatch,
                    ));
                }
                Ok(fingerprint) => {
                    tracing::debug!(%fingerprint, "leaderboard fingerprint changed");
                }
                Err(err) if self.within_ttl(entry) => {
                    tracing::debug!(error = %err, "fingerprint probe failed, cache within ttl");
                    return Ok(CachedView::cached(
                        Arc::clone(&entry.view),
                        CacheOutcome::WithinTtl,
                    ));
                }
                Err(err) => {
                    tracing::debug!(error = %err, "fingerprint probe failed, cache expired");
                }
            }
        }
        self.recompute(current.map(|e| e.generation)).await
    }

    async fn recompute(&self, seen: Option<u64>) -> Result<CachedView, AssembleError> {
        let _guard = self.refresh.lock().await;

        // Another request refreshed the slot while this one waited.
        let current = self.slot.read().await.clone();
        if let Some(entry) = current.as_ref().filter(|e| Some(e.generation) != seen) {
            return Ok(CachedView::cached(
                Arc::clone(&entry.view),
                CacheOutcome::FingerprintMatch,
            ));
        }

        match self.assembler.assemble().await.and_then(validated) {
            Ok(Assembled { view, background }) => {
                let view = Arc::new(view);
                let entry = Entry {
                    view: Arc::clone(&view),
                    cached_at: self.clock.now(),
                    generation: self.generations.fetch_add(1, Ordering::Relaxed) + 1,
                };
                *self.slot.write().await = Some(entry);
                Ok(CachedView {
                    view,
                    outcome: CacheOutcome::Fresh,
                    background,
                })
            }
            Err(err) => match current {
                Some(entry) => {
                    tracing::warn!(
                        error = %err,
                        cached_at = %entry.cached_at,
                        "leaderboard refresh failed, serving stale data"
                    );
                    let warning = format!(
                        "Serving cached data from {}; refresh failed: {err}",
                        entry.cached_at.to_rfc3339()
                    );
                    Ok(CachedView::cached(entry.view, CacheOutcome::Stale { warning }))
                }
                None => {
                    tracing::warn!(error = %err, "leaderboard unavailable and nothing cached");
                    Err(err)
                }
            },
        }
    }

    fn within_ttl(&self, entry: &Entry) -> bool {
        let ttl = TimeDelta::from_std(self.ttl).unwrap_or(TimeDelta::MAX);
        self.clock.now() - entry.cached_at < ttl
    }

    /// Drops the cached view; the next [`get`](Self::get) recomputes.
    pub async fn reset(&self) {
        *self.slot.write().await = None;
        tracing::info!("leaderboard cache cleared");
    }

    /// Snapshot of the cache state.
    pub async fn status(&self) -> CacheStatus {
        let ttl_secs = self.ttl.as_secs();
        match self.slot.read().await.as_ref() {
            Some(entry) => CacheStatus {
                state: "warm",
                cached_at: Some(entry.cached_at),
                webpage_timestamp: Some(entry.view.webpage_timestamp.clone()),
                age_secs: Some((self.clock.now() - entry.cached_at).num_seconds()),
                ttl_secs,
            },
            None => CacheStatus {
                state: "cold",
                cached_at: None,
                webpage_timestamp: None,
                age_secs: None,
                ttl_secs,
            },
        }
    }
}
