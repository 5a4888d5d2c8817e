//! Day-over-day delta computation.
//!
//! Pure function of the current rows and the previous snapshot. Players
//! are matched by exact display name; a renamed player shows up as a new
//! player with no baseline.

use std::collections::HashMap;

use super::{PlayerChanges, PlayerRecord, PlayerView, Snapshot};

/// Annotates `current` with changes relative to `previous`.
///
/// With no previous snapshot every record passes through without change
/// fields. Records whose name is absent from `previous` also carry none.
#[must_use]
pub fn compute_changes(current: &[PlayerRecord], previous: Option<&Snapshot>) -> Vec<PlayerView> {
    let Some(previous) = previous else {
        return current.iter().cloned().map(PlayerView::unchanged).collect();
    };

    let baseline: HashMap<&str, &PlayerRecord> = previous
        .players
        .iter()
        .map(|p| (p.name.as_str(), p))
        .collect();

    current
        .iter()
        .map(|record| PlayerView {
            changes: baseline
                .get(record.name.as_str())
                .map(|before| changes_between(before, record)),
            record: record.clone(),
        })
        .collect()
}

fn changes_between(before: &PlayerRecord, after: &PlayerRecord) -> PlayerChanges {
    PlayerChanges {
        rank_change: i64::from(before.rank) - i64::from(after.rank),
        ev_won_change: after.ev_won - before.ev_won,
        ev_bb100_change: after.ev_bb100 - before.ev_bb100,
        won_change: after.won - before.won,
        hands_change: signed(after.hands) - signed(before.hands),
    }
}

fn signed(hands: u64) -> i64 {
    i64::try_from(hands).unwrap_or(i64::MAX)
}
