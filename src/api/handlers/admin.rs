//! Maintenance handlers: index repair, cache revalidation, countries.

use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};

use crate::api::dto::{
    CountriesResponse, DebugSnapshotsResponse, RebuildIndexResponse, RevalidateResponse,
    SetCountryRequest, SetCountryResponse,
};
use crate::app_state::AppState;
use crate::domain::{CountryCode, UNKNOWN_COUNTRY};
use crate::error::{AppError, ErrorResponse};

/// `POST /admin/rebuild-index` — Rebuild the snapshot index from storage.
///
/// # Errors
///
/// Returns [`AppError::Repository`] if listing storage or writing the
/// index fails.
#[utoipa::path(
    post,
    path = "/admin/rebuild-index",
    tag = "Admin",
    summary = "Rebuild snapshot index",
    description = "Lists every stored snapshot, validates it, and rewrites the index. Never modifies snapshots.",
    responses(
        (status = 200, description = "Rebuild summary", body = RebuildIndexResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse),
    )
)]
pub async fn rebuild_index(
    State(state): State<AppState>,
) -> Result<Json<RebuildIndexResponse>, AppError> {
    let summary = state.repair.rebuild().await?;
    Ok(Json(summary.into()))
}

/// `GET /admin/debug-snapshots` — Compare index and storage.
///
/// # Errors
///
/// Returns [`AppError::Repository`] if the storage listing fails.
#[utoipa::path(
    get,
    path = "/admin/debug-snapshots",
    tag = "Admin",
    summary = "Diagnose index drift",
    description = "Reports dates present in storage but not the index and vice versa, plus leaderboard cache state. Writes nothing.",
    responses(
        (status = 200, description = "Diagnosis", body = DebugSnapshotsResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse),
    )
)]
pub async fn debug_snapshots(
    State(state): State<AppState>,
) -> Result<Json<DebugSnapshotsResponse>, AppError> {
    let diagnosis = state.repair.diagnose().await?;
    let cache = state.cache.status().await;
    Ok(Json(DebugSnapshotsResponse::new(diagnosis, cache)))
}

/// `POST /admin/revalidate` — Drop the cached leaderboard.
#[utoipa::path(
    post,
    path = "/admin/revalidate",
    tag = "Admin",
    summary = "Revalidate cache",
    responses(
        (status = 200, description = "Cache cleared", body = RevalidateResponse),
    )
)]
pub async fn revalidate(State(state): State<AppState>) -> Json<RevalidateResponse> {
    state.cache.reset().await;
    Json(RevalidateResponse {
        revalidated: true,
        message: "leaderboard cache cleared; next request rescrapes".to_string(),
    })
}

/// `GET /admin/countries` — The player country directory.
#[utoipa::path(
    get,
    path = "/admin/countries",
    tag = "Admin",
    summary = "List player countries",
    responses(
        (status = 200, description = "Country directory", body = CountriesResponse),
    )
)]
pub async fn list_countries(State(state): State<AppState>) -> Json<CountriesResponse> {
    let directory = state.countries.load().await;
    Json(CountriesResponse::from(&directory))
}

/// `PUT /admin/countries/{name}` — Set or clear one player's country.
///
/// # Errors
///
/// Returns [`AppError::InvalidRequest`] for a code that is not two ASCII
/// letters, and [`AppError::Repository`] if the directory cannot be
/// read or written.
#[utoipa::path(
    put,
    path = "/admin/countries/{name}",
    tag = "Admin",
    summary = "Set player country",
    params(("name" = String, Path, description = "Player display name")),
    request_body = SetCountryRequest,
    responses(
        (status = 200, description = "Updated entry", body = SetCountryResponse),
        (status = 400, description = "Invalid country code", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse),
    )
)]
pub async fn set_country(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<SetCountryRequest>,
) -> Result<Json<SetCountryResponse>, AppError> {
    if name.trim().is_empty() {
        return Err(AppError::InvalidRequest("player name is empty".to_string()));
    }
    let code = match req.country_code.as_deref().map(str::trim) {
        None | Some("") => CountryCode::Unknown,
        Some(raw) if raw.eq_ignore_ascii_case(UNKNOWN_COUNTRY) => CountryCode::Unknown,
        Some(raw) => CountryCode::parse(raw).ok_or_else(|| {
            AppError::InvalidRequest(format!("country code {raw:?} is not two letters"))
        })?,
    };
    state.countries.set_country(&name, &code).await?;
    Ok(Json(SetCountryResponse {
        country_code: code.as_directory_value().map(str::to_string),
        name,
    }))
}

/// Maintenance routes under `/admin`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/rebuild-index", post(rebuild_index))
        .route("/admin/debug-snapshots", get(debug_snapshots))
        .route("/admin/revalidate", post(revalidate))
        .route("/admin/countries", get(list_countries))
        .route("/admin/countries/{name}", put(set_country))
}
