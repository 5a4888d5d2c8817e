//! Service layer: assembling, caching, and throttling the leaderboard.
//!
//! [`LeaderboardAssembler`] turns one scrape into a view and schedules
//! persistence. [`LeaderboardCache`] decides when to call it.
//! [`RateLimiter`] guards the public read endpoint.

pub mod assembler;
pub mod freshness;
pub mod rate_limiter;

pub use assembler::{AssembleError, Assembled, BackgroundTasks, LeaderboardAssembler};
pub use freshness::{CacheOutcome, CacheStatus, CachedView, LeaderboardCache};
pub use rate_limiter::{RateLimiter, Throttled};
