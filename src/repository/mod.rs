//! Repository layer: snapshots, the snapshot index, and the country
//! directory, all persisted as JSON objects in an [`ObjectStore`].
//!
//! Object layout:
//!
//! ```text
//! snapshots/{YYYY-MM-DD}.json   one Snapshot per UTC day
//! snapshots/index.json          SnapshotIndex (advisory)
//! countries.json                CountryDirectory
//! ```
//!
//! [`ObjectStore`]: crate::storage::ObjectStore

pub mod country_directory;
pub mod repair;
pub mod snapshot_repository;
pub mod snapshot_source;

use serde::Serialize;

use crate::domain::SnapshotDate;
use crate::storage::StoreError;

pub use country_directory::CountryDirectoryStore;
pub use repair::{IndexDiagnosis, IndexRepair, RebuildSummary};
pub use snapshot_repository::{EnsureOutcome, PreviousSnapshot, SnapshotRepository};
pub use snapshot_source::{IndexBacked, ListingBacked, SnapshotSource, SourceKind};

/// Prefix under which snapshot objects live.
pub const SNAPSHOT_PREFIX: &str = "snapshots/";

/// Key of the snapshot index object.
pub const INDEX_KEY: &str = "snapshots/index.json";

/// Key of the country directory object.
pub const COUNTRIES_KEY: &str = "countries.json";

/// Longest payload excerpt written to logs when rejecting a write.
const LOG_PAYLOAD_LIMIT: usize = 512;

/// Errors raised by repository writes and authoritative listings.
///
/// Read paths do not return these; they degrade to empty values.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Snapshot failed validation; nothing was written.
    #[error("invalid snapshot: {}", .0.join("; "))]
    InvalidSnapshot(Vec<String>),

    /// Country directory failed validation; nothing was written.
    #[error("invalid country directory: {}", .0.join("; "))]
    InvalidDirectory(Vec<String>),

    /// Object store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// JSON encoding or decoding failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Object key for the snapshot of `date`.
#[must_use]
pub fn snapshot_key(date: SnapshotDate) -> String {
    format!("{SNAPSHOT_PREFIX}{date}.json")
}

/// Extracts the date from a snapshot object key.
///
/// Returns `None` for the index object and anything else that is not
/// `snapshots/YYYY-MM-DD.json`.
#[must_use]
pub fn date_from_key(key: &str) -> Option<SnapshotDate> {
    key.strip_prefix(SNAPSHOT_PREFIX)?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

/// Serializes `value` for a log line, cut to a bounded length.
pub(crate) fn log_excerpt<T: Serialize>(value: &T) -> String {
    let mut text = serde_json::to_string(value).unwrap_or_default();
    if text.len() > LOG_PAYLOAD_LIMIT {
        let mut cut = LOG_PAYLOAD_LIMIT;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        text.push_str("...");
    }
    text
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn key_and_date_round_trip() {
        let Some(date) = date_from_key("snapshots/2025-06-30.json") else {
            panic!("date not extracted");
        };
        assert_eq!(snapshot_key(date), "snapshots/2025-06-30.json");
    }

    #[test]
    fn index_and_foreign_keys_are_not_dates() {
        assert!(date_from_key(INDEX_KEY).is_none());
        assert!(date_from_key("snapshots/2025-06-30.json.bak").is_none());
        assert!(date_from_key("snapshots/notes.txt").is_none());
        assert!(date_from_key(COUNTRIES_KEY).is_none());
    }

    #[test]
    fn log_excerpt_is_bounded() {
        let long = "x".repeat(LOG_PAYLOAD_LIMIT * 2);
        let excerpt = log_excerpt(&long);
        assert!(excerpt.len() <= LOG_PAYLOAD_LIMIT + 3);
        assert!(excerpt.ends_with("..."));
    }
}
