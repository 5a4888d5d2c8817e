//! Leaderboard source: the scraper boundary.
//!
//! The rest of the crate only relies on the [`LeaderboardSource`]
//! contract: rows come back 1-based ranked, deduplicated and validated,
//! together with the page's change fingerprint. An empty row set is
//! reported as such and turned into a hard failure by the assembler.

pub mod http;
pub mod parser;
#[cfg(test)]
pub(crate) mod scripted;

use std::fmt;

use async_trait::async_trait;

use crate::domain::PlayerRecord;

pub use http::HttpLeaderboardSource;

/// Rows and fingerprint from one full fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedLeaderboard {
    /// Validated rows, ranked by source order.
    pub players: Vec<PlayerRecord>,
    /// Opaque change fingerprint shown on the page.
    pub webpage_timestamp: String,
}

/// Failures talking to or reading the source page.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The request exceeded its timeout.
    #[error("request to leaderboard source timed out")]
    Timeout,

    /// Connection or protocol failure.
    #[error("http error: {0}")]
    Http(String),

    /// Non-success HTTP status.
    #[error("leaderboard source returned status {0}")]
    Status(u16),

    /// The page did not have the expected structure.
    #[error("could not parse leaderboard page: {0}")]
    Parse(String),

    /// The change fingerprint was not found on the page.
    #[error("change fingerprint not found on page")]
    MissingFingerprint,
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err.to_string())
        }
    }
}

/// The external page being scraped.
#[async_trait]
pub trait LeaderboardSource: Send + Sync + fmt::Debug {
    /// Fetches and parses the whole leaderboard.
    async fn fetch_leaderboard(&self) -> Result<ScrapedLeaderboard, SourceError>;

    /// Cheaply fetches only the change fingerprint.
    async fn probe_fingerprint(&self) -> Result<String, SourceError>;
}
