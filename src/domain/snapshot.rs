//! Daily snapshots and the advisory snapshot index.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{PlayerRecord, SnapshotDate};

/// Upper bound on rows in one snapshot.
pub const MAX_PLAYERS: usize = 1000;

/// Immutable capture of all player stats for one UTC day.
///
/// Stored players carry raw stats only: no country code, no deltas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Calendar day this snapshot belongs to.
    pub date: SnapshotDate,
    /// Opaque change fingerprint copied from the source page.
    pub webpage_timestamp: String,
    /// Instant the snapshot was written.
    pub captured_at: DateTime<Utc>,
    /// Player rows, 1 to [`MAX_PLAYERS`] entries.
    pub players: Vec<PlayerRecord>,
}

impl Snapshot {
    /// Builds a snapshot from scraped rows, stripping enrichment.
    #[must_use]
    pub fn capture(
        date: SnapshotDate,
        webpage_timestamp: impl Into<String>,
        captured_at: DateTime<Utc>,
        players: &[PlayerRecord],
    ) -> Self {
        Self {
            date,
            webpage_timestamp: webpage_timestamp.into(),
            captured_at,
            players: players.iter().map(PlayerRecord::raw_stats).collect(),
        }
    }

    /// Validates the structural invariants of a snapshot.
    ///
    /// # Errors
    ///
    /// Returns every field error found, not just the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.players.is_empty() {
            errors.push("players: must contain at least one entry".to_string());
        }
        if self.players.len() > MAX_PLAYERS {
            errors.push(format!(
                "players: {} entries exceeds {MAX_PLAYERS}",
                self.players.len()
            ));
        }
        let mut seen = HashSet::with_capacity(self.players.len());
        for (position, player) in self.players.iter().enumerate() {
            player.collect_errors(position, &mut errors);
            if !seen.insert(player.name.as_str()) {
                errors.push(format!(
                    "players[{position}].name: duplicate name {:?}",
                    player.name
                ));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Index entry summarizing this snapshot.
    #[must_use]
    pub fn index_entry(&self) -> SnapshotIndexEntry {
        SnapshotIndexEntry {
            date: self.date,
            webpage_timestamp: self.webpage_timestamp.clone(),
            captured_at: self.captured_at,
            player_count: self.players.len(),
        }
    }
}

/// Denormalized metadata about one stored snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotIndexEntry {
    /// Snapshot date.
    pub date: SnapshotDate,
    /// Fingerprint copied from the snapshot.
    pub webpage_timestamp: String,
    /// Instant the snapshot was written.
    pub captured_at: DateTime<Utc>,
    /// Number of player rows.
    pub player_count: usize,
}

/// Advisory summary of every stored snapshot, newest first.
///
/// Always re-derivable from the snapshot objects themselves; see
/// [`crate::repository::IndexRepair`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotIndex {
    /// Entries sorted by date descending.
    #[serde(default)]
    pub snapshots: Vec<SnapshotIndexEntry>,
    /// Last time the index object was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl SnapshotIndex {
    /// Builds an index from arbitrary entries, sorting newest first.
    #[must_use]
    pub fn from_entries(
        mut entries: Vec<SnapshotIndexEntry>,
        last_updated: DateTime<Utc>,
    ) -> Self {
        entries.sort_by(|a, b| b.date.cmp(&a.date));
        entries.dedup_by(|a, b| a.date == b.date);
        Self {
            snapshots: entries,
            last_updated: Some(last_updated),
        }
    }

    /// Replaces the entry for `entry.date` or inserts it, keeping order.
    pub fn upsert(&mut self, entry: SnapshotIndexEntry, now: DateTime<Utc>) {
        match self.snapshots.iter_mut().find(|e| e.date == entry.date) {
            Some(existing) => *existing = entry,
            None => self.snapshots.push(entry),
        }
        self.snapshots.sort_by(|a, b| b.date.cmp(&a.date));
        self.last_updated = Some(now);
    }

    /// Dates in the index, newest first.
    #[must_use]
    pub fn dates(&self) -> Vec<SnapshotDate> {
        self.snapshots.iter().map(|e| e.date).collect()
    }

    /// Returns `true` if the index lists no snapshots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
