//! Builds the current leaderboard view from a fresh scrape.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::domain::{CountryCode, LeaderboardView, PlayerRecord, compute_changes};
use crate::repository::{CountryDirectoryStore, EnsureOutcome, IndexRepair, SnapshotRepository};
use crate::source::{LeaderboardSource, SourceError};

/// Why a view could not be assembled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssembleError {
    /// The source returned zero usable rows.
    #[error("leaderboard source returned no players")]
    NoData,

    /// Fetching or parsing the source failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The assembled rows broke a record invariant.
    #[error("assembled leaderboard failed validation: {}", .0.join("; "))]
    InvalidOutput(Vec<String>),
}

/// Best-effort side effects spawned by one assembly.
///
/// Dropping this detaches the tasks; they still run to completion.
#[derive(Debug, Default)]
pub struct BackgroundTasks {
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    fn push(&mut self, handle: JoinHandle<()>) {
        self.handles.push(handle);
    }

    /// Number of spawned tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns `true` if nothing was spawned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Waits for every task to finish.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "background task did not complete");
            }
        }
    }
}

/// A freshly assembled view plus its pending side effects.
#[derive(Debug)]
pub struct Assembled {
    /// The view to serve.
    pub view: LeaderboardView,
    /// Persistence spawned while assembling.
    pub background: BackgroundTasks,
}

/// Combines source rows, country codes, and the previous snapshot.
#[derive(Debug, Clone)]
pub struct LeaderboardAssembler {
    source: Arc<dyn LeaderboardSource>,
    snapshots: Arc<SnapshotRepository>,
    countries: Arc<CountryDirectoryStore>,
    repair: IndexRepair,
}

impl LeaderboardAssembler {
    /// Creates an assembler.
    #[must_use]
    pub fn new(
        source: Arc<dyn LeaderboardSource>,
        snapshots: Arc<SnapshotRepository>,
        countries: Arc<CountryDirectoryStore>,
    ) -> Self {
        let repair = IndexRepair::new(Arc::clone(&snapshots));
        Self {
            source,
            snapshots,
            countries,
            repair,
        }
    }

    /// Cheap fingerprint probe, passed through to the source.
    ///
    /// # Errors
    ///
    /// Returns the source error on timeout, HTTP failure, or when the
    /// fingerprint is missing.
    pub async fn probe_fingerprint(&self) -> Result<String, SourceError> {
        self.source.probe_fingerprint().await
    }

    /// Scrapes the source and assembles the current view.
    ///
    /// Spawns, without awaiting: registration of new names in the country
    /// directory, today's snapshot write, and an index rebuild if the
    /// previous-snapshot lookup saw drift. Their failures are logged.
    ///
    /// # Errors
    ///
    /// Returns [`AssembleError::NoData`] for an empty scrape and
    /// [`AssembleError::Source`] when the fetch fails.
    pub async fn assemble(&self) -> Result<Assembled, AssembleError> {
        let scraped = self.source.fetch_leaderboard().await?;
        if scraped.players.is_empty() {
            tracing::warn!("leaderboard source returned an empty table");
            return Err(AssembleError::NoData);
        }
        let mut background = BackgroundTasks::default();

        let directory = self.countries.load().await;
        let mut unknown = Vec::new();
        let enriched: Vec<PlayerRecord> = scraped
            .players
            .iter()
            .map(|player| {
                let code = directory.get(&player.name).unwrap_or_else(|| {
                    unknown.push(player.name.clone());
                    CountryCode::Unknown
                });
                PlayerRecord {
                    country_code: Some(code),
                    ..player.clone()
                }
            })
            .collect();
        if !unknown.is_empty() {
            background.push(self.spawn_register_unknown(unknown));
        }

        let today = self.snapshots.today();
        let previous = self.snapshots.previous_snapshot_before(today).await;
        if previous.index_drift {
            background.push(self.spawn_index_rebuild());
        }
        let previous_day_date = previous.snapshot.as_ref().map(|s| s.date);
        let players = compute_changes(&enriched, previous.snapshot.as_ref());

        let view = LeaderboardView {
            players,
            last_updated: self.snapshots.clock().now(),
            webpage_timestamp: scraped.webpage_timestamp.clone(),
            previous_day_date,
        };
        background.push(self.spawn_daily_snapshot(scraped.players, scraped.webpage_timestamp));

        tracing::info!(
            players = view.players.len(),
            fingerprint = %view.webpage_timestamp,
            previous = ?previous_day_date,
            "leaderboard assembled"
        );
        Ok(Assembled { view, background })
    }

    fn spawn_register_unknown(&self, names: Vec<String>) -> JoinHandle<()> {
        let countries = Arc::clone(&self.countries);
        tokio::spawn(async move {
            if let Err(err) = countries.register_unknown(&names).await {
                tracing::warn!(error = %err, count = names.len(), "failed to register new players");
            }
        })
    }

    fn spawn_index_rebuild(&self) -> JoinHandle<()> {
        let repair = self.repair.clone();
        tokio::spawn(async move {
            tracing::info!("index drift detected, rebuilding snapshot index");
            if let Err(err) = repair.rebuild().await {
                tracing::warn!(error = %err, "background index rebuild failed");
            }
        })
    }

    fn spawn_daily_snapshot(&self, players: Vec<PlayerRecord>, fingerprint: String) -> JoinHandle<()> {
        let snapshots = Arc::clone(&self.snapshots);
        tokio::spawn(async move {
            match snapshots.ensure_daily_snapshot(&players, &fingerprint).await {
                Ok(EnsureOutcome::Created(date)) => {
                    tracing::info!(%date, players = players.len(), "daily snapshot created");
                }
                Ok(EnsureOutcome::AlreadyExists(_)) => {}
                Err(err) => tracing::error!(error = %err, "failed to persist daily snapshot"),
            }
        })
    }
}
