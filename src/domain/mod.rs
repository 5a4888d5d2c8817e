//! Domain layer: players, snapshots, the index, countries, and deltas.
//!
//! Everything here is plain data plus pure functions. I/O lives in
//! [`crate::storage`] and [`crate::repository`].

pub mod clock;
pub mod country_directory;
pub mod delta;
pub mod leaderboard;
pub mod player;
pub mod snapshot;
pub mod snapshot_date;

pub use clock::{Clock, ManualClock, SystemClock};
pub use country_directory::CountryDirectory;
pub use delta::compute_changes;
pub use leaderboard::LeaderboardView;
pub use player::{CountryCode, PlayerChanges, PlayerRecord, PlayerView, UNKNOWN_COUNTRY};
pub use snapshot::{Snapshot, SnapshotIndex, SnapshotIndexEntry};
pub use snapshot_date::{InvalidDate, SnapshotDate};
