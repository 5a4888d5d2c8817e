//! Scripted in-process source for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{LeaderboardSource, ScrapedLeaderboard, SourceError};
use crate::domain::PlayerRecord;

#[derive(Debug, Default)]
struct Script {
    players: Vec<PlayerRecord>,
    fingerprint: String,
    fetch_error: Option<SourceError>,
    probe_error: Option<SourceError>,
}

/// Returns whatever rows and fingerprint it was last given, counting calls.
#[derive(Debug, Default)]
pub(crate) struct ScriptedSource {
    script: Mutex<Script>,
    fetch_calls: AtomicUsize,
    probe_calls: AtomicUsize,
}

impl ScriptedSource {
    pub(crate) fn new(players: Vec<PlayerRecord>, fingerprint: &str) -> Self {
        Self {
            script: Mutex::new(Script {
                players,
                fingerprint: fingerprint.to_string(),
                ..Script::default()
            }),
            ..Self::default()
        }
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn set_page(&self, players: Vec<PlayerRecord>, fingerprint: &str) {
        let mut script = self.script();
        script.players = players;
        script.fingerprint = fingerprint.to_string();
    }

    pub(crate) fn fail_fetch(&self, error: Option<SourceError>) {
        self.script().fetch_error = error;
    }

    pub(crate) fn fail_probe(&self, error: Option<SourceError>) {
        self.script().probe_error = error;
    }

    pub(crate) fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LeaderboardSource for ScriptedSource {
    async fn fetch_leaderboard(&self) -> Result<ScrapedLeaderboard, SourceError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.script();
        if let Some(err) = &script.fetch_error {
            return Err(err.clone());
        }
        Ok(ScrapedLeaderboard {
            players: script.players.clone(),
            webpage_timestamp: script.fingerprint.clone(),
        })
    }

    async fn probe_fingerprint(&self) -> Result<String, SourceError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.script();
        match &script.probe_error {
            Some(err) => Err(err.clone()),
            None => Ok(script.fingerprint.clone()),
        }
    }
}
