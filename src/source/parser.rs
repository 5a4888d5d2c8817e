//! HTML extraction for the leaderboard page.
//!
//! Deliberately naive string slicing, tailored to one page: a single
//! `<table>` with a header row naming the columns, followed by one `<tr>`
//! per player, and a "Last updated" line carrying the fingerprint.
//! Tag and attribute matching is ASCII case-insensitive.

use std::collections::HashSet;

use super::{ScrapedLeaderboard, SourceError};
use crate::domain::PlayerRecord;
use crate::domain::player::MAX_HANDS;
use crate::domain::snapshot::MAX_PLAYERS;

const FINGERPRINT_LABELS: [&str; 2] = ["last updated", "updated:"];

/// Column positions resolved from the header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Columns {
    name: usize,
    hands: usize,
    won: usize,
    ev_won: usize,
    ev_bb100: usize,
}

impl Columns {
    fn from_headers(headers: &[String]) -> Option<Self> {
        let mut name = None;
        let mut hands = None;
        let mut won = None;
        let mut ev_won = None;
        let mut ev_bb100 = None;
        for (i, header) in headers.iter().enumerate() {
            let h = header.to_ascii_lowercase();
            if h.contains("player") || h.contains("name") {
                name.get_or_insert(i);
            } else if h.contains("hands") {
                hands.get_or_insert(i);
            } else if h.contains("bb") {
                ev_bb100.get_or_insert(i);
            } else if h.contains("ev") {
                ev_won.get_or_insert(i);
            } else if h.contains("won") || h.contains("winnings") || h.contains("profit") {
                won.get_or_insert(i);
            }
        }
        Some(Self {
            name: name?,
            hands: hands?,
            won: won?,
            ev_won: ev_won?,
            ev_bb100: ev_bb100?,
        })
    }
}

/// Extracts the change fingerprint (the text after "Last updated").
///
/// The text must be closed by a tag. A head cut off inside the label's
/// text yields `None` rather than a prefix of the real fingerprint.
#[must_use]
pub fn parse_fingerprint(html: &str) -> Option<String> {
    let lc = html.to_ascii_lowercase();
    FINGERPRINT_LABELS.iter().find_map(|label| {
        let start = lc.find(label)? + label.len();
        let rest = html.get(start..)?;
        let end = rest.find('<')?;
        let text = decode_entities(rest.get(..end)?);
        let text = text.trim().trim_start_matches(':').trim();
        (!text.is_empty()).then(|| text.to_string())
    })
}

/// Parses the full page into ranked rows plus fingerprint.
///
/// Rows with a missing name, unparsable numbers, or a name already seen
/// are skipped. Ranks are reassigned densely from page order.
///
/// # Errors
///
/// Returns [`SourceError::MissingFingerprint`] when the fingerprint is not
/// on the page, and [`SourceError::Parse`] when the table or its header
/// cannot be found.
pub fn parse_leaderboard(html: &str) -> Result<ScrapedLeaderboard, SourceError> {
    let webpage_timestamp = parse_fingerprint(html).ok_or(SourceError::MissingFingerprint)?;
    let table = slice_between_ci(html, "<table", "</table>")
        .ok_or_else(|| SourceError::Parse("no <table> on page".to_string()))?;

    let mut columns = None;
    let mut players = Vec::new();
    let mut seen = HashSet::new();
    let mut skipped = 0usize;
    let mut from = 0;

    while let Some((start, end)) = next_tag_block_ci(table, "<tr", "</tr>", from) {
        from = end;
        let Some(row) = table.get(start..end) else {
            break;
        };
        if row.to_ascii_lowercase().contains("<th") {
            columns = Columns::from_headers(&cells(row, "<th", "</th>"));
            continue;
        }
        let Some(cols) = columns else {
            continue;
        };
        if players.len() >= MAX_PLAYERS {
            break;
        }
        match parse_row(&cells(row, "<td", "</td>"), cols) {
            Some(mut record) if seen.insert(record.name.clone()) => {
                record.rank = u32::try_from(players.len() + 1).unwrap_or(u32::MAX);
                players.push(record);
            }
            _ => skipped += 1,
        }
    }

    if columns.is_none() {
        return Err(SourceError::Parse(
            "leaderboard header row not recognised".to_string(),
        ));
    }
    if skipped > 0 {
        tracing::debug!(skipped, kept = players.len(), "skipped unusable leaderboard rows");
    }
    Ok(ScrapedLeaderboard {
        players,
        webpage_timestamp,
    })
}

fn parse_row(cells: &[String], cols: Columns) -> Option<PlayerRecord> {
    let name = cells.get(cols.name)?.trim().to_string();
    if name.is_empty() {
        return None;
    }
    let hands: u64 = clean_number(cells.get(cols.hands)?).parse().ok()?;
    if hands > MAX_HANDS {
        return None;
    }

    Some(PlayerRecord {
        rank: 0,
        name,
        ev_won: parse_number(cells.get(cols.ev_won)?)?,
        ev_bb100: parse_number(cells.get(cols.ev_bb100)?)?,
        won: parse_number(cells.get(cols.won)?)?,
        hands,
        country_code: None,
    })
}

/// Parses a display number like `$1,234.50`, `-12.3`, or `−5`.
#[must_use]
pub fn parse_number(raw: &str) -> Option<f64> {
    let value: f64 = clean_number(raw).parse().ok()?;
    value.is_finite().then_some(value)
}

/// Drops currency symbols, grouping and spaces; normalises the minus sign.
fn clean_number(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| if c == '\u{2212}' { '-' } else { c })
        .filter(|c| !matches!(c, '$' | '€' | '£' | ',' | ' ' | '\u{a0}'))
        .collect()
}

/// Text content of every `open`…`close` cell in `row`.
fn cells(row: &str, open: &str, close: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut from = 0;
    while let Some((start, end)) = next_tag_block_ci(row, open, close, from) {
        from = end;
        if let Some(block) = row.get(start..end) {
            out.push(text_of(inner_after_open_tag(block)));
        }
    }
    out
}

/// Section between an opening tag (with attributes) and its closing tag.
fn slice_between_ci<'a>(s: &'a str, open_pat: &str, close_pat: &str) -> Option<&'a str> {
    let lc = s.to_ascii_lowercase();
    let open_idx = lc.find(&open_pat.to_ascii_lowercase())?;
    let after_open = s.get(open_idx..)?.find('>')? + open_idx + 1;
    let close_rel = lc.get(after_open..)?.find(&close_pat.to_ascii_lowercase())?;
    s.get(after_open..after_open + close_rel)
}

/// Byte range of the next complete `open`…`close` block at or after `from`.
fn next_tag_block_ci(s: &str, open_tag: &str, close_tag: &str, from: usize) -> Option<(usize, usize)> {
    let lc = s.to_ascii_lowercase();
    let start = lc.get(from..)?.find(&open_tag.to_ascii_lowercase())? + from;
    let open_end = s.get(start..)?.find('>')? + start + 1;
    let end_rel = lc.get(open_end..)?.find(&close_tag.to_ascii_lowercase())?;
    Some((start, open_end + end_rel + close_tag.len()))
}

/// Inner HTML of a `<tag ...>INNER</tag>` block.
fn inner_after_open_tag(block: &str) -> &str {
    match (block.find('>'), block.rfind('<')) {
        (Some(open_end), Some(close_start)) if close_start > open_end => {
            block.get(open_end + 1..close_start).unwrap_or_default()
        }
        _ => "",
    }
}

/// Strips nested tags and decodes the common entities.
fn text_of(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    decode_entities(&out).trim().to_string()
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
