//! REST endpoint handlers organized by resource.

pub mod admin;
pub mod leaderboard;
pub mod system;
