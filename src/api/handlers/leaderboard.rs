//! Current and historical leaderboard handlers.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{
    HistoricalLeaderboardResponse, HistoryEntryDto, HistoryResponse, LeaderboardResponse,
};
use crate::app_state::AppState;
use crate::domain::SnapshotDate;
use crate::error::{AppError, ErrorResponse};

/// `GET /leaderboard` — Current leaderboard with day-over-day changes.
///
/// # Errors
///
/// Returns [`AppError::NoData`] or [`AppError::Upstream`] when nothing is
/// cached and the source cannot be scraped, and [`AppError::Internal`]
/// if the assembled rows fail validation with nothing cached.
#[utoipa::path(
    get,
    path = "/leaderboard",
    tag = "Leaderboard",
    summary = "Current leaderboard",
    description = "Scraped rows enriched with country codes and changes since the most recent earlier snapshot. Served from cache while the source fingerprint is unchanged. Rate-limited per client.",
    responses(
        (status = 200, description = "Current leaderboard", body = LeaderboardResponse),
        (status = 429, description = "Rate limit exceeded", body = ErrorResponse),
        (status = 500, description = "Assembled rows failed validation and nothing cached", body = ErrorResponse),
        (status = 502, description = "Source unreachable and nothing cached", body = ErrorResponse),
        (status = 503, description = "Source returned no rows and nothing cached", body = ErrorResponse),
    )
)]
pub async fn get_leaderboard(
    State(state): State<AppState>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    let cached = state.cache.get().await?;
    Ok(Json(LeaderboardResponse::from(&cached)))
}

/// `GET /history` — Dates with stored snapshots.
#[utoipa::path(
    get,
    path = "/history",
    tag = "History",
    summary = "List snapshots",
    description = "Snapshot dates from the index, newest first.",
    responses(
        (status = 200, description = "Indexed snapshots", body = HistoryResponse),
    )
)]
pub async fn list_history(State(state): State<AppState>) -> Json<HistoryResponse> {
    let index = state.snapshots.load_index().await;
    let snapshots: Vec<HistoryEntryDto> =
        index.snapshots.into_iter().map(HistoryEntryDto::from).collect();
    Json(HistoryResponse {
        count: snapshots.len(),
        snapshots,
    })
}

/// `GET /history/{date}` — The leaderboard as stored on one day.
///
/// # Errors
///
/// Returns [`AppError::InvalidDate`] for a malformed date and
/// [`AppError::SnapshotNotFound`] when no usable snapshot exists.
#[utoipa::path(
    get,
    path = "/history/{date}",
    tag = "History",
    summary = "Snapshot for a date",
    params(("date" = String, Path, description = "UTC date, YYYY-MM-DD", example = "2025-03-09")),
    responses(
        (status = 200, description = "Stored snapshot", body = HistoricalLeaderboardResponse),
        (status = 400, description = "Malformed date", body = ErrorResponse),
        (status = 404, description = "No snapshot for that date", body = ErrorResponse),
    )
)]
pub async fn get_history(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<HistoricalLeaderboardResponse>, AppError> {
    let date: SnapshotDate = date.parse()?;
    let snapshot = state
        .snapshots
        .load_snapshot(date)
        .await
        .ok_or(AppError::SnapshotNotFound(date))?;
    Ok(Json(snapshot.into()))
}

/// Leaderboard routes, rate-limited by the caller.
pub fn current_routes() -> Router<AppState> {
    Router::new().route("/leaderboard", get(get_leaderboard))
}

/// History routes.
pub fn history_routes() -> Router<AppState> {
    Router::new()
        .route("/history", get(list_history))
        .route("/history/{date}", get(get_history))
}
