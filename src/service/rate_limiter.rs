//! Fixed-window per-client request limiter.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::domain::Clock;

/// Tracked clients above which expired windows are swept.
const PRUNE_THRESHOLD: usize = 1024;

/// Request was refused; retry after the given delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttled {
    /// Seconds the client should wait, sent as `Retry-After`.
    pub retry_after_secs: u64,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: DateTime<Utc>,
    count: u32,
}

/// Allows `max_requests` per client within each `window`.
///
/// Windows are fixed, starting at a client's first request. State is
/// in-process only.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    /// Creates a limiter.
    #[must_use]
    pub fn new(max_requests: u32, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            max_requests,
            window,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Counts one request from `client`.
    ///
    /// # Errors
    ///
    /// Returns [`Throttled`] when the client has used its allowance for the
    /// current window.
    pub fn check(&self, client: &str) -> Result<(), Throttled> {
        let now = self.clock.now();
        let window = TimeDelta::from_std(self.window).unwrap_or(TimeDelta::MAX);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        if entries.len() > PRUNE_THRESHOLD {
            entries.retain(|_, w| now - w.started < window);
        }

        let entry = entries.entry(client.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now - entry.started >= window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }
        if entry.count >= self.max_requests {
            tracing::debug!(client, "rate limit exceeded");
            return Err(Throttled {
                retry_after_secs: self.window.as_secs(),
            });
        }
        entry.count += 1;
        Ok(())
    }

    /// Forgets every client.
    pub fn reset(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Number of clients currently tracked.
    #[must_use]
    pub fn tracked_clients(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ManualClock;
    use crate::repository::snapshot_repository::tests::clock_at;

    fn limiter(max: u32) -> (Arc<ManualClock>, RateLimiter) {
        let clock = clock_at("2025-03-10");
        let limiter = RateLimiter::new(
            max,
            Duration::from_secs(60),
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        (clock, limiter)
    }

    #[test]
    fn eleventh_request_in_window_is_throttled() {
        let (_, limiter) = limiter(10);
        for _ in 0..10 {
            assert!(limiter.check("1.2.3.4").is_ok());
        }
        assert_eq!(
            limiter.check("1.2.3.4"),
            Err(Throttled {
                retry_after_secs: 60
            })
        );
    }

    #[test]
    fn clients_are_counted_separately() {
        let (_, limiter) = limiter(1);
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("b").is_ok());
        assert!(limiter.check("a").is_err());
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn window_expiry_restores_allowance() {
        let (clock, limiter) = limiter(1);
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("a").is_err());
        clock.advance(TimeDelta::seconds(60));
        assert!(limiter.check("a").is_ok());
    }

    #[test]
    fn reset_clears_state() {
        let (_, limiter) = limiter(1);
        assert!(limiter.check("a").is_ok());
        limiter.reset();
        assert_eq!(limiter.tracked_clients(), 0);
        assert!(limiter.check("a").is_ok());
    }
}
