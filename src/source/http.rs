//! HTTP implementation of [`LeaderboardSource`] built on `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RANGE;

use super::parser::{parse_fingerprint, parse_leaderboard};
use super::{LeaderboardSource, ScrapedLeaderboard, SourceError};

/// Bytes requested by a fingerprint probe.
pub const DEFAULT_PROBE_BYTES: u64 = 16 * 1024;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Scrapes the leaderboard page over HTTP.
///
/// A probe asks for only the head of the page with a `Range` header and a
/// short timeout; a full fetch downloads and parses the whole page with a
/// longer one. Servers that ignore `Range` simply return the full body.
#[derive(Debug, Clone)]
pub struct HttpLeaderboardSource {
    client: reqwest::Client,
    url: String,
    probe_timeout: Duration,
    fetch_timeout: Duration,
    probe_bytes: u64,
}

impl HttpLeaderboardSource {
    /// Creates a source for `url`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn new(
        url: impl Into<String>,
        probe_timeout: Duration,
        fetch_timeout: Duration,
    ) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            probe_timeout,
            fetch_timeout,
            probe_bytes: DEFAULT_PROBE_BYTES,
        })
    }

    /// Overrides how much of the page a probe requests.
    #[must_use]
    pub fn with_probe_bytes(mut self, probe_bytes: u64) -> Self {
        self.probe_bytes = probe_bytes.max(1);
        self
    }

    async fn get_text(&self, timeout: Duration, range: Option<u64>) -> Result<String, SourceError> {
        let mut request = self.client.get(&self.url).timeout(timeout);
        if let Some(bytes) = range {
            request = request.header(RANGE, format!("bytes=0-{}", bytes - 1));
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl LeaderboardSource for HttpLeaderboardSource {
    async fn fetch_leaderboard(&self) -> Result<ScrapedLeaderboard, SourceError> {
        let html = self.get_text(self.fetch_timeout, None).await?;
        let board = parse_leaderboard(&html)?;
        tracing::debug!(
            players = board.players.len(),
            fingerprint = %board.webpage_timestamp,
            "fetched leaderboard page"
        );
        Ok(board)
    }

    async fn probe_fingerprint(&self) -> Result<String, SourceError> {
        let html = self
            .get_text(self.probe_timeout, Some(self.probe_bytes))
            .await?;
        parse_fingerprint(&html).ok_or(SourceError::MissingFingerprint)
    }
}
