//! DTOs for the current and historical leaderboard endpoints.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{PlayerRecord, PlayerView, Snapshot, SnapshotDate, SnapshotIndexEntry};
use crate::service::CachedView;

/// Response for `GET /leaderboard`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardResponse {
    /// Ranked players with country codes and, when a previous snapshot
    /// exists, day-over-day change fields.
    #[schema(value_type = Vec<PlayerRecord>)]
    pub players: Vec<PlayerView>,
    /// When this view was assembled.
    pub last_updated: DateTime<Utc>,
    /// Source change fingerprint.
    pub webpage_timestamp: String,
    /// Whether change fields were computed.
    pub has_previous_day_data: bool,
    /// Date of the snapshot used as the baseline.
    #[schema(value_type = Option<String>, example = "2025-03-09")]
    pub previous_day_date: Option<SnapshotDate>,
    /// Always `false` here.
    pub is_historical: bool,
    /// Present and `true` when a refresh failed and cached data is served.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale: Option<bool>,
    /// Reason the data is stale.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl From<&CachedView> for LeaderboardResponse {
    fn from(cached: &CachedView) -> Self {
        let view = &cached.view;
        Self {
            players: view.players.clone(),
            last_updated: view.last_updated,
            webpage_timestamp: view.webpage_timestamp.clone(),
            has_previous_day_data: view.has_previous_day_data(),
            previous_day_date: view.previous_day_date,
            is_historical: false,
            stale: cached.is_stale().then_some(true),
            warning: cached.warning().map(str::to_string),
        }
    }
}

/// Response for `GET /history/{date}`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalLeaderboardResponse {
    /// Players exactly as stored that day.
    pub players: Vec<PlayerRecord>,
    /// When the snapshot was taken.
    pub captured_at: DateTime<Utc>,
    /// Source fingerprint at capture time.
    pub webpage_timestamp: String,
    /// Always `true` here.
    pub is_historical: bool,
    /// Always `false`; historical views carry no deltas.
    pub has_previous_day_data: bool,
    /// Always `null`.
    #[schema(value_type = Option<String>)]
    pub previous_day_date: Option<SnapshotDate>,
}

impl From<Snapshot> for HistoricalLeaderboardResponse {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            players: snapshot.players,
            captured_at: snapshot.captured_at,
            webpage_timestamp: snapshot.webpage_timestamp,
            is_historical: true,
            has_previous_day_data: false,
            previous_day_date: None,
        }
    }
}

/// One entry of `GET /history`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntryDto {
    /// Snapshot date.
    #[schema(value_type = String, example = "2025-03-09")]
    pub date: SnapshotDate,
    /// Source fingerprint at capture time.
    pub webpage_timestamp: String,
    /// When the snapshot was taken.
    pub captured_at: DateTime<Utc>,
}

impl From<SnapshotIndexEntry> for HistoryEntryDto {
    fn from(entry: SnapshotIndexEntry) -> Self {
        Self {
            date: entry.date,
            webpage_timestamp: entry.webpage_timestamp,
            captured_at: entry.captured_at,
        }
    }
}

/// Response for `GET /history`.
#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryResponse {
    /// Indexed snapshots, newest first.
    pub snapshots: Vec<HistoryEntryDto>,
    /// Number of entries.
    pub count: usize,
}
