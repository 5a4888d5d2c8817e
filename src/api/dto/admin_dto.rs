//! DTOs for maintenance endpoints.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{CountryDirectory, SnapshotDate};
use crate::repository::{IndexDiagnosis, RebuildSummary};
use crate::service::CacheStatus;

/// Response for `POST /admin/rebuild-index`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RebuildIndexResponse {
    /// Snapshots now in the index.
    pub total_snapshots: usize,
    /// Stored snapshots skipped as unreadable or invalid.
    pub errors: usize,
    /// Oldest indexed date.
    #[schema(value_type = Option<String>)]
    pub oldest_date: Option<SnapshotDate>,
    /// Newest indexed date.
    #[schema(value_type = Option<String>)]
    pub newest_date: Option<SnapshotDate>,
    /// When the index was written.
    pub rebuilt_at: DateTime<Utc>,
}

impl From<RebuildSummary> for RebuildIndexResponse {
    fn from(summary: RebuildSummary) -> Self {
        Self {
            total_snapshots: summary.total_snapshots,
            errors: summary.errors,
            oldest_date: summary.oldest_date,
            newest_date: summary.newest_date,
            rebuilt_at: summary.rebuilt_at,
        }
    }
}

/// Cache section of the debug report.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatusDto {
    /// `"cold"` or `"warm"`.
    pub state: String,
    /// When the cached view was computed.
    pub cached_at: Option<DateTime<Utc>>,
    /// Fingerprint of the cached view.
    pub webpage_timestamp: Option<String>,
    /// Age of the cached view in seconds.
    pub age_secs: Option<i64>,
    /// Fallback TTL in seconds.
    pub ttl_secs: u64,
}

impl From<CacheStatus> for CacheStatusDto {
    fn from(status: CacheStatus) -> Self {
        Self {
            state: status.state.to_string(),
            cached_at: status.cached_at,
            webpage_timestamp: status.webpage_timestamp,
            age_secs: status.age_secs,
            ttl_secs: status.ttl_secs,
        }
    }
}

/// Response for `GET /admin/debug-snapshots`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DebugSnapshotsResponse {
    /// Whether index and storage agree.
    pub in_sync: bool,
    /// Dates found by listing storage.
    #[schema(value_type = Vec<String>)]
    pub storage_dates: Vec<SnapshotDate>,
    /// Dates named by the index.
    #[schema(value_type = Vec<String>)]
    pub index_dates: Vec<SnapshotDate>,
    /// Stored but not indexed.
    #[schema(value_type = Vec<String>)]
    pub missing_in_index: Vec<SnapshotDate>,
    /// Indexed but not stored.
    #[schema(value_type = Vec<String>)]
    pub missing_in_storage: Vec<SnapshotDate>,
    /// Leaderboard cache state.
    pub cache: CacheStatusDto,
}

impl DebugSnapshotsResponse {
    /// Combines a diagnosis with the cache status.
    #[must_use]
    pub fn new(diagnosis: IndexDiagnosis, cache: CacheStatus) -> Self {
        Self {
            in_sync: diagnosis.in_sync(),
            storage_dates: diagnosis.storage_dates,
            index_dates: diagnosis.index_dates,
            missing_in_index: diagnosis.missing_in_index,
            missing_in_storage: diagnosis.missing_in_storage,
            cache: cache.into(),
        }
    }
}

/// Response for `POST /admin/revalidate`.
#[derive(Debug, Serialize, ToSchema)]
pub struct RevalidateResponse {
    /// Always `true`.
    pub revalidated: bool,
    /// What happened.
    pub message: String,
}

/// Response for `GET /admin/countries`.
#[derive(Debug, Serialize, ToSchema)]
pub struct CountriesResponse {
    /// Player name to lowercase country code, `null` when unknown.
    pub countries: BTreeMap<String, Option<String>>,
    /// Number of players in the directory.
    pub count: usize,
}

impl From<&CountryDirectory> for CountriesResponse {
    fn from(directory: &CountryDirectory) -> Self {
        let countries: BTreeMap<String, Option<String>> = directory
            .iter()
            .map(|(name, code)| (name.to_string(), code.map(str::to_string)))
            .collect();
        Self {
            count: countries.len(),
            countries,
        }
    }
}

/// Request body for `PUT /admin/countries/{name}`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetCountryRequest {
    /// Two-letter code, or `null` / `"unknown"` to clear.
    pub country_code: Option<String>,
}

/// Response for `PUT /admin/countries/{name}`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetCountryResponse {
    /// Player name.
    pub name: String,
    /// Stored code, `null` when unknown.
    pub country_code: Option<String>,
}
