//! The assembled current-leaderboard value.

use chrono::{DateTime, Utc};

use super::{PlayerView, SnapshotDate};

/// Request-scoped view of the current leaderboard. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardView {
    /// Enriched rows with optional deltas.
    pub players: Vec<PlayerView>,
    /// Instant this view was assembled.
    pub last_updated: DateTime<Utc>,
    /// Source fingerprint the rows were scraped under.
    pub webpage_timestamp: String,
    /// Date of the snapshot deltas were computed against, if any.
    pub previous_day_date: Option<SnapshotDate>,
}

impl LeaderboardView {
    /// Whether deltas were computed against an earlier snapshot.
    #[must_use]
    pub const fn has_previous_day_data(&self) -> bool {
        self.previous_day_date.is_some()
    }

    /// Checks the outgoing rows against the record invariants.
    ///
    /// # Errors
    ///
    /// Returns the list of field errors; a failure here is an internal
    /// contract violation, not bad upstream data.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        for (position, view) in self.players.iter().enumerate() {
            view.record.collect_errors(position, &mut errors);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
