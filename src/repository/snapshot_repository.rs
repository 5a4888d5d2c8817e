//! Durable storage of daily snapshots and upkeep of the index.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use super::snapshot_source::{IndexBacked, ListingBacked, SnapshotSource, SourceKind};
use super::{INDEX_KEY, RepositoryError, SNAPSHOT_PREFIX, date_from_key, log_excerpt, snapshot_key};
use crate::domain::{
    Clock, PlayerRecord, Snapshot, SnapshotDate, SnapshotIndex, SnapshotIndexEntry,
};
use crate::storage::{ObjectStore, StoreError};

/// Result of [`SnapshotRepository::ensure_daily_snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// This call wrote today's snapshot.
    Created(SnapshotDate),
    /// A snapshot for today was already stored.
    AlreadyExists(SnapshotDate),
}

/// Result of looking up the most recent snapshot before a date.
#[derive(Debug, Clone, Default)]
pub struct PreviousSnapshot {
    /// The snapshot found, if any.
    pub snapshot: Option<Snapshot>,
    /// The index disagreed with storage during the lookup.
    pub index_drift: bool,
}

/// Outcome of reading one stored snapshot.
#[derive(Debug)]
pub(crate) enum SnapshotLookup {
    Found(Snapshot),
    Missing,
    Invalid,
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Overwrite,
    CreateOnly,
}

/// Snapshot storage over an [`ObjectStore`].
///
/// Reads never fail: missing, unreadable, and structurally invalid
/// snapshots all come back as `None`, with distinct log lines. Writes
/// return errors for the caller to log.
#[derive(Debug)]
pub struct SnapshotRepository {
    store: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
    index_lock: Mutex<()>,
}

impl SnapshotRepository {
    /// Creates a repository over `store`, using `clock` for "today".
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            index_lock: Mutex::new(()),
        }
    }

    /// Current UTC date according to the repository clock.
    #[must_use]
    pub fn today(&self) -> SnapshotDate {
        self.clock.today()
    }

    /// The repository clock.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Loads the snapshot for `date`, or `None` if there is no usable one.
    pub async fn load_snapshot(&self, date: SnapshotDate) -> Option<Snapshot> {
        match self.lookup_snapshot(date).await {
            SnapshotLookup::Found(snapshot) => Some(snapshot),
            SnapshotLookup::Missing | SnapshotLookup::Invalid | SnapshotLookup::Unavailable => {
                None
            }
        }
    }

    pub(crate) async fn lookup_snapshot(&self, date: SnapshotDate) -> SnapshotLookup {
        let key = snapshot_key(date);
        let body = match self.store.get(&key).await {
            Ok(body) => body,
            Err(StoreError::NotFound(_)) => {
                tracing::debug!(%date, "no snapshot stored");
                return SnapshotLookup::Missing;
            }
            Err(err) => {
                tracing::warn!(%date, error = %err, "snapshot read failed, treating as absent");
                return SnapshotLookup::Unavailable;
            }
        };

        let snapshot: Snapshot = match serde_json::from_slice(&body) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(%date, error = %err, "stored snapshot is not decodable, ignoring it");
                return SnapshotLookup::Invalid;
            }
        };
        if snapshot.date != date {
            tracing::warn!(
                %date,
                stored_date = %snapshot.date,
                "stored snapshot date does not match its key, ignoring it"
            );
            return SnapshotLookup::Invalid;
        }
        if let Err(errors) = snapshot.validate() {
            tracing::warn!(%date, ?errors, "stored snapshot failed validation, ignoring it");
            return SnapshotLookup::Invalid;
        }
        SnapshotLookup::Found(snapshot)
    }

    /// Validates and writes `snapshot`, then updates the index.
    ///
    /// Overwrites any snapshot already stored for the same date. The index
    /// update is best-effort: its failure is logged and the save still
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::InvalidSnapshot`] without writing if the
    /// snapshot is invalid, or a store/serialization error if the write
    /// itself fails.
    pub async fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), RepositoryError> {
        self.write_snapshot(snapshot, WriteMode::Overwrite).await
    }

    async fn write_snapshot(
        &self,
        snapshot: &Snapshot,
        mode: WriteMode,
    ) -> Result<(), RepositoryError> {
        if let Err(errors) = snapshot.validate() {
            tracing::warn!(
                date = %snapshot.date,
                ?errors,
                payload = %log_excerpt(snapshot),
                "refusing to save invalid snapshot"
            );
            return Err(RepositoryError::InvalidSnapshot(errors));
        }

        let key = snapshot_key(snapshot.date);
        let body = serde_json::to_vec_pretty(snapshot)?;
        match mode {
            WriteMode::Overwrite => self.store.put(&key, body).await?,
            WriteMode::CreateOnly => self.store.put_if_absent(&key, body).await?,
        }
        tracing::info!(
            date = %snapshot.date,
            players = snapshot.players.len(),
            "snapshot saved"
        );

        // The snapshot object is the durable fact; the index can be rebuilt.
        if let Err(err) = self.record_in_index(snapshot.index_entry()).await {
            tracing::warn!(
                date = %snapshot.date,
                error = %err,
                "snapshot saved but index update failed, rebuild the index to resync"
            );
        }
        Ok(())
    }

    async fn record_in_index(&self, entry: SnapshotIndexEntry) -> Result<(), RepositoryError> {
        let _guard = self.lock_index().await;
        // A failed read must not be mistaken for an empty index and clobber it.
        let mut index = self.read_index().await?;
        index.upsert(entry, self.clock.now());
        self.write_index(&index).await
    }

    /// Writes today's snapshot unless one already exists.
    ///
    /// This is the only path that creates snapshots. Country codes are
    /// stripped from `players` before storing. Concurrent callers race;
    /// stores with create-only writes let exactly one win and the others
    /// report [`EnsureOutcome::AlreadyExists`].
    ///
    /// # Errors
    ///
    /// Returns the underlying [`RepositoryError`] if validation or the
    /// write fails.
    pub async fn ensure_daily_snapshot(
        &self,
        players: &[PlayerRecord],
        webpage_timestamp: &str,
    ) -> Result<EnsureOutcome, RepositoryError> {
        let today = self.today();
        let mode = match self.lookup_snapshot(today).await {
            SnapshotLookup::Found(_) => return Ok(EnsureOutcome::AlreadyExists(today)),
            SnapshotLookup::Missing | SnapshotLookup::Unavailable => WriteMode::CreateOnly,
            SnapshotLookup::Invalid => {
                tracing::warn!(%today, "replacing unusable snapshot for today");
                WriteMode::Overwrite
            }
        };

        let snapshot = Snapshot::capture(today, webpage_timestamp, self.clock.now(), players);
        match self.write_snapshot(&snapshot, mode).await {
            Ok(()) => Ok(EnsureOutcome::Created(today)),
            Err(RepositoryError::Store(StoreError::AlreadyExists(_))) => {
                tracing::debug!(%today, "another writer created today's snapshot first");
                Ok(EnsureOutcome::AlreadyExists(today))
            }
            Err(err) => Err(err),
        }
    }

    /// Lists every stored snapshot date, newest first.
    ///
    /// Authoritative and expensive: pages through the whole
    /// `snapshots/` prefix.
    ///
    /// # Errors
    ///
    /// Returns a store error if any listing page fails.
    pub async fn list_available_dates(&self) -> Result<Vec<SnapshotDate>, RepositoryError> {
        let mut dates = Vec::new();
        let mut cursor = None;
        loop {
            let page = self.store.list(SNAPSHOT_PREFIX, cursor).await?;
            dates.extend(page.keys.iter().filter_map(|key| date_from_key(key)));
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        dates.sort_unstable_by(|a, b| b.cmp(a));
        dates.dedup();
        Ok(dates)
    }

    /// Loads the index; a missing or unreadable index is empty.
    pub async fn load_index(&self) -> SnapshotIndex {
        match self.read_index().await {
            Ok(index) => index,
            Err(err) => {
                tracing::warn!(error = %err, "snapshot index unreadable, using empty index");
                SnapshotIndex::default()
            }
        }
    }

    async fn read_index(&self) -> Result<SnapshotIndex, RepositoryError> {
        match self.store.get(INDEX_KEY).await {
            Ok(body) => Ok(serde_json::from_slice(&body)?),
            Err(StoreError::NotFound(_)) => Ok(SnapshotIndex::default()),
            Err(err) => Err(err.into()),
        }
    }

    /// Overwrites the index object wholesale.
    pub(crate) async fn write_index(&self, index: &SnapshotIndex) -> Result<(), RepositoryError> {
        let body = serde_json::to_vec_pretty(index)?;
        self.store.put(INDEX_KEY, body).await?;
        Ok(())
    }

    /// Serializes index read-modify-write cycles within this process.
    pub(crate) async fn lock_index(&self) -> MutexGuard<'_, ()> {
        self.index_lock.lock().await
    }

    /// Picks the cheapest date source available.
    pub async fn snapshot_source(&self) -> Box<dyn SnapshotSource + '_> {
        let index = self.load_index().await;
        if index.is_empty() {
            tracing::debug!("snapshot index empty, falling back to store listing");
            Box::new(ListingBacked::new(self))
        } else {
            Box::new(IndexBacked::new(index))
        }
    }

    /// Most recent usable snapshot strictly before `date`.
    ///
    /// Dates come from the index when it has entries. The day before
    /// `date` is also read directly when the index does not list it, so a
    /// lost index update cannot hide yesterday behind an older baseline.
    /// If the index names snapshots that are not in storage, the lookup is
    /// retried against a full listing. Either kind of drift sets
    /// `index_drift` so the caller can schedule a rebuild.
    pub async fn previous_snapshot_before(&self, date: SnapshotDate) -> PreviousSnapshot {
        let source = self.snapshot_source().await;

        let unindexed_day_before = match source.kind() {
            SourceKind::IndexBacked => self.unindexed_day_before(source.as_ref(), date).await,
            SourceKind::ListingBacked => None,
        };
        if let Some(snapshot) = unindexed_day_before {
            return PreviousSnapshot {
                snapshot: Some(snapshot),
                index_drift: true,
            };
        }

        let scan = self.scan_before(source.as_ref(), date).await;

        // Snapshots exist in storage but the index is empty.
        let unindexed = source.kind() == SourceKind::ListingBacked && scan.candidates > 0;

        if scan.found.is_some() {
            return PreviousSnapshot {
                snapshot: scan.found,
                index_drift: scan.missing > 0 || unindexed,
            };
        }

        match source.kind() {
            SourceKind::IndexBacked if scan.missing > 0 => {
                tracing::warn!(
                    missing = scan.missing,
                    "index lists snapshots absent from storage, retrying with listing"
                );
                let listing = ListingBacked::new(self);
                let retry = self.scan_before(&listing, date).await;
                PreviousSnapshot {
                    snapshot: retry.found,
                    index_drift: true,
                }
            }
            SourceKind::IndexBacked => PreviousSnapshot::default(),
            SourceKind::ListingBacked => PreviousSnapshot {
                snapshot: None,
                index_drift: unindexed,
            },
        }
    }

    /// The snapshot of the day before `date` when storage has it but
    /// `source` does not list it.
    async fn unindexed_day_before(
        &self,
        source: &dyn SnapshotSource,
        date: SnapshotDate,
    ) -> Option<Snapshot> {
        let day_before = SnapshotDate::from_naive(date.as_naive().pred_opt()?);
        let listed = source.dates().await.ok()?;
        if listed.contains(&day_before) {
            return None;
        }
        match self.lookup_snapshot(day_before).await {
            SnapshotLookup::Found(snapshot) => {
                tracing::warn!(date = %day_before, "stored snapshot missing from index");
                Some(snapshot)
            }
            SnapshotLookup::Missing | SnapshotLookup::Invalid | SnapshotLookup::Unavailable => {
                None
            }
        }
    }

    async fn scan_before(&self, source: &dyn SnapshotSource, date: SnapshotDate) -> Scan {
        let dates = match source.dates().await {
            Ok(dates) => dates,
            Err(err) => {
                tracing::warn!(error = %err, "could not list snapshot dates");
                return Scan::default();
            }
        };

        let mut scan = Scan::default();
        for candidate in dates.into_iter().filter(|d| *d < date) {
            scan.candidates += 1;
            match self.lookup_snapshot(candidate).await {
                SnapshotLookup::Found(snapshot) => {
                    scan.found = Some(snapshot);
                    break;
                }
                SnapshotLookup::Missing => scan.missing += 1,
                SnapshotLookup::Invalid | SnapshotLookup::Unavailable => {}
            }
        }
        scan
    }
}

#[derive(Debug, Default)]
struct Scan {
    found: Option<Snapshot>,
    candidates: usize,
    missing: usize,
}

#[cfg(test)]
#[allow(clippy::panic, clippy::indexing_slicing)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::{CountryCode, ManualClock};
    use crate::storage::InMemoryObjectStore;
    use chrono::{TimeZone, Utc};

    pub(crate) fn clock_at(date: &str) -> Arc<ManualClock> {
        let Ok(day) = date.parse::<SnapshotDate>() else {
            panic!("bad test date {date}");
        };
        let Some(noon) = day.as_naive().and_hms_opt(12, 0, 0) else {
            panic!("bad time");
        };
        Arc::new(ManualClock::new(Utc.from_utc_datetime(&noon)))
    }

    pub(crate) fn date(s: &str) -> SnapshotDate {
        let Ok(d) = s.parse() else {
            panic!("bad test date {s}");
        };
        d
    }

    pub(crate) fn player(rank: u32, name: &str) -> PlayerRecord {
        PlayerRecord {
            rank,
            name: name.to_string(),
            ev_won: f64::from(rank) * 10.0,
            ev_bb100: 1.5,
            won: 12.0,
            hands: 1000,
            country_code: None,
        }
    }

    pub(crate) fn snapshot_on(day: &str, players: &[PlayerRecord]) -> Snapshot {
        Snapshot::capture(date(day), "T0", Utc::now(), players)
    }

    fn repo(store: &Arc<InMemoryObjectStore>, today: &str) -> SnapshotRepository {
        let store: Arc<dyn ObjectStore> = Arc::clone(store) as Arc<dyn ObjectStore>;
        SnapshotRepository::new(store, clock_at(today))
    }

    #[tokio::test]
    async fn save_then_load_round_trips_and_indexes() {
        let store = Arc::new(InMemoryObjectStore::new());
        let repo = repo(&store, "2025-03-10");
        let snap = snapshot_on("2025-03-09", &[player(1, "A"), player(2, "B")]);

        assert!(repo.save_snapshot(&snap).await.is_ok());
        assert_eq!(repo.load_snapshot(date("2025-03-09")).await, Some(snap));

        let index = repo.load_index().await;
        assert_eq!(index.dates(), vec![date("2025-03-09")]);
        assert_eq!(index.snapshots[0].player_count, 2);
    }

    #[tokio::test]
    async fn invalid_snapshot_is_not_written() {
        let store = Arc::new(InMemoryObjectStore::new());
        let repo = repo(&store, "2025-03-10");
        let empty = snapshot_on("2025-03-09", &[]);

        let result = repo.save_snapshot(&empty).await;
        assert!(matches!(result, Err(RepositoryError::InvalidSnapshot(_))));
        assert!(!store.contains("snapshots/2025-03-09.json").await);
        assert_eq!(store.put_call_count(), 0);
    }

    #[tokio::test]
    async fn index_failure_does_not_fail_save() {
        let store = Arc::new(InMemoryObjectStore::new());
        store.fail_writes_to(INDEX_KEY).await;
        let repo = repo(&store, "2025-03-10");

        let snap = snapshot_on("2025-03-09", &[player(1, "A")]);
        assert!(repo.save_snapshot(&snap).await.is_ok());
        assert!(repo.load_snapshot(date("2025-03-09")).await.is_some());
        assert!(repo.load_index().await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_snapshot_reads_as_absent() {
        let store = Arc::new(InMemoryObjectStore::new());
        let _ = store
            .put("snapshots/2025-03-09.json", b"{\"date\": 12".to_vec())
            .await;
        let repo = repo(&store, "2025-03-10");
        assert!(repo.load_snapshot(date("2025-03-09")).await.is_none());
    }

    #[tokio::test]
    async fn structurally_invalid_snapshot_reads_as_absent() {
        let store = Arc::new(InMemoryObjectStore::new());
        let body = serde_json::json!({
            "date": "2025-03-09",
            "webpageTimestamp": "T0",
            "capturedAt": "2025-03-09T10:00:00Z",
            "players": []
        });
        let _ = store
            .put("snapshots/2025-03-09.json", body.to_string().into_bytes())
            .await;
        let repo = repo(&store, "2025-03-10");
        assert!(repo.load_snapshot(date("2025-03-09")).await.is_none());
    }

    #[tokio::test]
    async fn missing_index_is_empty() {
        let store = Arc::new(InMemoryObjectStore::new());
        let repo = repo(&store, "2025-03-10");
        assert!(repo.load_index().await.is_empty());
    }

    #[tokio::test]
    async fn ensure_daily_snapshot_is_idempotent() {
        let store = Arc::new(InMemoryObjectStore::new());
        let repo = repo(&store, "2025-03-10");
        let mut rows = vec![player(1, "A")];
        rows[0].country_code = Some(CountryCode::Code("no".to_string()));

        let first = repo.ensure_daily_snapshot(&rows, "T1").await;
        let second = repo.ensure_daily_snapshot(&rows, "T2").await;

        assert!(matches!(first, Ok(EnsureOutcome::Created(_))));
        assert!(matches!(second, Ok(EnsureOutcome::AlreadyExists(_))));

        let Some(stored) = repo.load_snapshot(date("2025-03-10")).await else {
            panic!("today's snapshot missing");
        };
        assert_eq!(stored.webpage_timestamp, "T1");
        assert!(stored.players.iter().all(|p| p.country_code.is_none()));
        assert_eq!(repo.load_index().await.snapshots.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_ensure_creates_one_snapshot() {
        let store = Arc::new(InMemoryObjectStore::new());
        let repo = Arc::new(repo(&store, "2025-03-10"));
        let rows = vec![player(1, "A")];

        let (a, b) = tokio::join!(
            repo.ensure_daily_snapshot(&rows, "T1"),
            repo.ensure_daily_snapshot(&rows, "T1"),
        );
        let created = [a, b]
            .into_iter()
            .filter(|r| matches!(r, Ok(EnsureOutcome::Created(_))))
            .count();
        assert_eq!(created, 1);
        assert_eq!(repo.list_available_dates().await.ok(), Some(vec![date("2025-03-10")]));
    }

    #[tokio::test]
    async fn ensure_replaces_poisoned_snapshot_for_today() {
        let store = Arc::new(InMemoryObjectStore::new());
        let _ = store
            .put("snapshots/2025-03-10.json", b"not json".to_vec())
            .await;
        let repo = repo(&store, "2025-03-10");

        let outcome = repo.ensure_daily_snapshot(&[player(1, "A")], "T1").await;
        assert!(matches!(outcome, Ok(EnsureOutcome::Created(_))));
        assert!(repo.load_snapshot(date("2025-03-10")).await.is_some());
    }

    #[tokio::test]
    async fn list_available_dates_pages_and_skips_index() {
        let store = Arc::new(InMemoryObjectStore::with_page_size(2));
        let repo = repo(&store, "2025-03-10");
        for day in ["2025-03-01", "2025-03-03", "2025-03-02"] {
            assert!(repo.save_snapshot(&snapshot_on(day, &[player(1, "A")])).await.is_ok());
        }
        let Ok(dates) = repo.list_available_dates().await else {
            panic!("listing failed");
        };
        assert_eq!(
            dates,
            vec![date("2025-03-03"), date("2025-03-02"), date("2025-03-01")]
        );
        assert!(store.list_call_count() >= 2);
    }

    #[tokio::test]
    async fn previous_snapshot_skips_today_and_uses_index() {
        let store = Arc::new(InMemoryObjectStore::new());
        let repo = repo(&store, "2025-03-10");
        for day in ["2025-03-07", "2025-03-09", "2025-03-10"] {
            assert!(repo.save_snapshot(&snapshot_on(day, &[player(1, "A")])).await.is_ok());
        }
        let lists_before = store.list_call_count();

        let previous = repo.previous_snapshot_before(date("2025-03-10")).await;
        assert_eq!(previous.snapshot.map(|s| s.date), Some(date("2025-03-09")));
        assert!(!previous.index_drift);
        assert_eq!(store.list_call_count(), lists_before);
    }

    #[tokio::test]
    async fn previous_snapshot_recovers_from_stale_index() {
        let store = Arc::new(InMemoryObjectStore::new());
        let repo = repo(&store, "2025-03-10");
        for day in ["2025-03-07", "2025-03-09"] {
            assert!(repo.save_snapshot(&snapshot_on(day, &[player(1, "A")])).await.is_ok());
        }
        // Operator deleted a snapshot without touching the index.
        let _ = store.remove("snapshots/2025-03-09.json").await;

        let previous = repo.previous_snapshot_before(date("2025-03-10")).await;
        assert_eq!(previous.snapshot.map(|s| s.date), Some(date("2025-03-07")));
        assert!(previous.index_drift);
    }

    #[tokio::test]
    async fn previous_snapshot_finds_day_before_missing_from_index() {
        let store = Arc::new(InMemoryObjectStore::new());
        let repo = repo(&store, "2025-03-10");
        assert!(repo.save_snapshot(&snapshot_on("2025-03-07", &[player(1, "A")])).await.is_ok());
        store.fail_writes_to(INDEX_KEY).await;
        assert!(repo.save_snapshot(&snapshot_on("2025-03-09", &[player(1, "B")])).await.is_ok());
        store.clear_failures().await;
        assert_eq!(repo.load_index().await.dates(), vec![date("2025-03-07")]);

        let previous = repo.previous_snapshot_before(date("2025-03-10")).await;
        assert_eq!(previous.snapshot.map(|s| s.date), Some(date("2025-03-09")));
        assert!(previous.index_drift);
    }

    #[tokio::test]
    async fn previous_snapshot_falls_back_to_listing_without_index() {
        let store = Arc::new(InMemoryObjectStore::new());
        let snap = snapshot_on("2025-03-08", &[player(1, "A")]);
        let Ok(body) = serde_json::to_vec(&snap) else {
            panic!("encode failed");
        };
        let _ = store.put("snapshots/2025-03-08.json", body).await;
        let repo = repo(&store, "2025-03-10");

        let previous = repo.previous_snapshot_before(date("2025-03-10")).await;
        assert_eq!(previous.snapshot.map(|s| s.date), Some(date("2025-03-08")));
        assert!(previous.index_drift);
        assert!(store.list_call_count() > 0);
    }

    #[tokio::test]
    async fn no_history_means_no_previous() {
        let store = Arc::new(InMemoryObjectStore::new());
        let repo = repo(&store, "2025-03-10");
        let previous = repo.previous_snapshot_before(date("2025-03-10")).await;
        assert!(previous.snapshot.is_none());
        assert!(!previous.index_drift);
    }
}
