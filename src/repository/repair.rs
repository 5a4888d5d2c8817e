//! Index drift detection and rebuild.
//!
//! The index is a cache of facts derivable from the snapshot objects.
//! [`IndexRepair::rebuild`] re-derives it from a full listing; it only
//! ever rewrites the index object, never a snapshot.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;

use super::snapshot_repository::SnapshotLookup;
use super::{RepositoryError, SnapshotRepository};
use crate::domain::{SnapshotDate, SnapshotIndex};

/// Snapshots fetched concurrently during a rebuild.
const REBUILD_CONCURRENCY: usize = 8;

/// Comparison of index dates against stored snapshot dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDiagnosis {
    /// Dates found by listing storage, newest first.
    pub storage_dates: Vec<SnapshotDate>,
    /// Dates named by the index, newest first.
    pub index_dates: Vec<SnapshotDate>,
    /// Stored snapshots the index does not mention.
    pub missing_in_index: Vec<SnapshotDate>,
    /// Index entries with no stored snapshot.
    pub missing_in_storage: Vec<SnapshotDate>,
}

impl IndexDiagnosis {
    /// Returns `true` when index and storage agree.
    #[must_use]
    pub fn in_sync(&self) -> bool {
        self.missing_in_index.is_empty() && self.missing_in_storage.is_empty()
    }
}

/// Summary of a completed rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildSummary {
    /// Snapshots now listed in the index.
    pub total_snapshots: usize,
    /// Stored objects skipped because they were unreadable or invalid.
    pub errors: usize,
    /// Oldest indexed date.
    pub oldest_date: Option<SnapshotDate>,
    /// Newest indexed date.
    pub newest_date: Option<SnapshotDate>,
    /// When the new index was written.
    pub rebuilt_at: DateTime<Utc>,
}

/// Reconciles the snapshot index with stored snapshots.
#[derive(Debug, Clone)]
pub struct IndexRepair {
    repository: Arc<SnapshotRepository>,
}

impl IndexRepair {
    /// Creates a repair handle over `repository`.
    #[must_use]
    pub fn new(repository: Arc<SnapshotRepository>) -> Self {
        Self { repository }
    }

    /// Compares the index with an authoritative listing. Writes nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage listing fails.
    pub async fn diagnose(&self) -> Result<IndexDiagnosis, RepositoryError> {
        let storage_dates = self.repository.list_available_dates().await?;
        let index_dates = self.repository.load_index().await.dates();

        let stored: BTreeSet<SnapshotDate> = storage_dates.iter().copied().collect();
        let indexed: BTreeSet<SnapshotDate> = index_dates.iter().copied().collect();

        Ok(IndexDiagnosis {
            missing_in_index: storage_dates
                .iter()
                .filter(|d| !indexed.contains(d))
                .copied()
                .collect(),
            missing_in_storage: index_dates
                .iter()
                .filter(|d| !stored.contains(d))
                .copied()
                .collect(),
            storage_dates,
            index_dates,
        })
    }

    /// Rebuilds the index from every readable stored snapshot.
    ///
    /// Idempotent. Unreadable or invalid snapshots are counted in
    /// [`RebuildSummary::errors`] and left out of the index.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing fails or the new index cannot be
    /// written.
    pub async fn rebuild(&self) -> Result<RebuildSummary, RepositoryError> {
        let _guard = self.repository.lock_index().await;
        let dates = self.repository.list_available_dates().await?;
        let listed = dates.len();

        let repository = &self.repository;
        let lookups: Vec<(SnapshotDate, SnapshotLookup)> = stream::iter(dates)
            .map(|date| async move { (date, repository.lookup_snapshot(date).await) })
            .buffer_unordered(REBUILD_CONCURRENCY)
            .collect()
            .await;

        let mut entries = Vec::with_capacity(listed);
        let mut errors = 0;
        for (date, lookup) in lookups {
            match lookup {
                SnapshotLookup::Found(snapshot) => entries.push(snapshot.index_entry()),
                SnapshotLookup::Missing | SnapshotLookup::Invalid | SnapshotLookup::Unavailable => {
                    tracing::warn!(%date, "skipping unreadable snapshot during index rebuild");
                    errors += 1;
                }
            }
        }

        let rebuilt_at = self.repository.clock().now();
        let index = SnapshotIndex::from_entries(entries, rebuilt_at);
        self.repository.write_index(&index).await?;

        let summary = RebuildSummary {
            total_snapshots: index.snapshots.len(),
            errors,
            oldest_date: index.snapshots.last().map(|e| e.date),
            newest_date: index.snapshots.first().map(|e| e.date),
            rebuilt_at,
        };
        tracing::info!(
            total = summary.total_snapshots,
            errors = summary.errors,
            "snapshot index rebuilt"
        );
        Ok(summary)
    }
}
