//! # leaderboard-tracker
//!
//! Scrapes one external leaderboard page, keeps an append-only history of
//! daily snapshots in an object store, and serves the current rankings
//! annotated with day-over-day changes as JSON.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── LeaderboardCache ── probe / TTL / stale (service/)
//!     ├── LeaderboardAssembler (service/)
//!     │       ├── LeaderboardSource (source/) ── scraped page
//!     │       ├── CountryDirectoryStore (repository/)
//!     │       └── SnapshotRepository + IndexRepair (repository/)
//!     │
//!     └── ObjectStore (storage/) ── filesystem or memory
//! ```
//!
//! Snapshots are the source of truth; the index is an advisory cache
//! that can always be rebuilt from them.

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod repository;
pub mod service;
pub mod source;
pub mod storage;
