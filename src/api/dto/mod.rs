//! Data Transfer Objects for JSON responses and request bodies.
//!
//! Field names are camelCase on the wire. Dates serialize as
//! `YYYY-MM-DD` strings, instants as RFC 3339.

pub mod admin_dto;
pub mod leaderboard_dto;

pub use admin_dto::*;
pub use leaderboard_dto::*;
