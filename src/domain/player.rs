//! Player rows: raw scraped stats and the annotated read view.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Largest hand count accepted from the source.
pub const MAX_HANDS: u64 = 1_000_000_000;

/// Marker stored for players whose country has been looked up but is not known.
pub const UNKNOWN_COUNTRY: &str = "unknown";

/// Country annotation for a player.
///
/// Serialized as a plain string: either a two-letter code or the
/// `"unknown"` marker. A player that has not been looked up at all
/// carries no country field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CountryCode {
    /// Lowercase ISO 3166-1 alpha-2 code.
    Code(String),
    /// Looked up, no country on record.
    Unknown,
}

impl CountryCode {
    /// Builds a known code, rejecting anything that is not two ASCII letters.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.len() == 2 && trimmed.bytes().all(|b| b.is_ascii_alphabetic()) {
            Some(Self::Code(trimmed.to_ascii_lowercase()))
        } else {
            None
        }
    }

    /// Directory form: `Some(code)` for a known country, `None` for unknown.
    #[must_use]
    pub fn as_directory_value(&self) -> Option<&str> {
        match self {
            Self::Code(code) => Some(code),
            Self::Unknown => None,
        }
    }
}

impl From<String> for CountryCode {
    fn from(raw: String) -> Self {
        if raw.eq_ignore_ascii_case(UNKNOWN_COUNTRY) {
            return Self::Unknown;
        }
        Self::parse(&raw).unwrap_or(Self::Unknown)
    }
}

impl From<CountryCode> for String {
    fn from(code: CountryCode) -> Self {
        match code {
            CountryCode::Code(code) => code,
            CountryCode::Unknown => UNKNOWN_COUNTRY.to_string(),
        }
    }
}

/// One player's stats at one point in time.
///
/// `name` is the identity across days; `rank` is not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    /// 1-based position assigned by source ordering.
    pub rank: u32,
    /// Display name as scraped.
    pub name: String,
    /// Expected-value winnings.
    pub ev_won: f64,
    /// Expected-value big blinds per 100 hands.
    #[serde(rename = "evBB100")]
    pub ev_bb100: f64,
    /// Actual winnings.
    pub won: f64,
    /// Hands played.
    pub hands: u64,
    /// Country annotation, absent until looked up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub country_code: Option<CountryCode>,
}

impl PlayerRecord {
    /// Copy of this record with enrichment removed, as stored in snapshots.
    #[must_use]
    pub fn raw_stats(&self) -> Self {
        Self {
            country_code: None,
            ..self.clone()
        }
    }

    /// Checks the per-row invariants, appending messages to `errors`.
    pub fn collect_errors(&self, position: usize, errors: &mut Vec<String>) {
        if self.rank == 0 {
            errors.push(format!("players[{position}].rank: must be >= 1"));
        }
        if self.name.trim().is_empty() {
            errors.push(format!("players[{position}].name: must not be empty"));
        }
        for (field, value) in [
            ("evWon", self.ev_won),
            ("evBB100", self.ev_bb100),
            ("won", self.won),
        ] {
            if !value.is_finite() {
                errors.push(format!("players[{position}].{field}: must be finite"));
            }
        }
        if self.hands > MAX_HANDS {
            errors.push(format!(
                "players[{position}].hands: {} exceeds {MAX_HANDS}",
                self.hands
            ));
        }
    }
}

/// Day-over-day differences for one player.
///
/// `rank_change` is `previous - current`, so a positive value means the
/// player moved up the table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerChanges {
    /// Places gained (positive) or lost (negative).
    pub rank_change: i64,
    /// Change in expected-value winnings.
    pub ev_won_change: f64,
    /// Change in expected-value bb/100.
    #[serde(rename = "evBB100Change")]
    pub ev_bb100_change: f64,
    /// Change in actual winnings.
    pub won_change: f64,
    /// Hands played since the previous snapshot.
    pub hands_change: i64,
}

/// A player row as served on the current leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerView {
    /// Current stats.
    #[serde(flatten)]
    pub record: PlayerRecord,
    /// Deltas against the previous snapshot; absent for new players.
    #[serde(flatten)]
    pub changes: Option<PlayerChanges>,
}

impl PlayerView {
    /// Wraps a record with no delta information.
    #[must_use]
    pub fn unchanged(record: PlayerRecord) -> Self {
        Self {
            record,
            changes: None,
        }
    }
}
