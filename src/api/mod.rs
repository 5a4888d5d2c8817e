//! REST API layer: route handlers, DTOs, middleware, and router
//! composition.
//!
//! Public reads live at `/leaderboard` and `/history`; operator tools
//! under `/admin`. Only `/leaderboard` is rate-limited.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod openapi;

use axum::Router;

use crate::app_state::AppState;

/// Builds the complete API router with all REST endpoints.
///
/// `state` is needed up front for the rate-limit layer; the caller still
/// supplies it with `with_state`.
pub fn build_router(state: &AppState, admin_enabled: bool) -> Router<AppState> {
    let limited = handlers::leaderboard::current_routes().route_layer(
        axum::middleware::from_fn_with_state(state.clone(), middleware::rate_limit),
    );

    let mut router = Router::new()
        .merge(limited)
        .merge(handlers::leaderboard::history_routes())
        .merge(handlers::system::routes());
    if admin_enabled {
        router = router.merge(handlers::admin::routes());
    }

    #[cfg(feature = "swagger-ui")]
    {
        use utoipa::OpenApi;
        router = router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", openapi::ApiDoc::openapi()),
        );
    }

    router
}

#[cfg(test)]
#[allow(clippy::panic, clippy::indexing_slicing)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::header::RETRY_AFTER;
    use axum::http::{HeaderMap, Method, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::config::AppConfig;
    use crate::domain::{Clock, PlayerRecord};
    use crate::repository::snapshot_repository::tests::{clock_at, player, snapshot_on};
    use crate::source::LeaderboardSource;
    use crate::source::scripted::ScriptedSource;
    use crate::storage::{InMemoryObjectStore, ObjectStore};

    struct Harness {
        store: Arc<InMemoryObjectStore>,
        source: Arc<ScriptedSource>,
        state: AppState,
        app: Router,
    }

    fn harness(players: Vec<PlayerRecord>) -> Harness {
        let Ok(config) = AppConfig::from_lookup(|_| None) else {
            panic!("default config rejected");
        };
        let store = Arc::new(InMemoryObjectStore::new());
        let source = Arc::new(ScriptedSource::new(players, "T1"));
        let state = AppState::new(
            Arc::clone(&store) as Arc<dyn ObjectStore>,
            Arc::clone(&source) as Arc<dyn LeaderboardSource>,
            clock_at("2025-03-10") as Arc<dyn Clock>,
            &config,
        );
        let app = build_router(&state, true).with_state(state.clone());
        Harness {
            store,
            source,
            state,
            app,
        }
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<&str>,
    ) -> (StatusCode, HeaderMap, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", "198.51.100.1");
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let Ok(request) = builder.body(body) else {
            panic!("bad request");
        };
        let Ok(response) = app.clone().oneshot(request).await else {
            panic!("router failed");
        };
        let status = response.status();
        let headers = response.headers().clone();
        let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
            panic!("body read failed");
        };
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, json)
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
        let (status, _, json) = send(app, Method::GET, uri, None).await;
        (status, json)
    }

    fn alice() -> PlayerRecord {
        PlayerRecord {
            rank: 1,
            name: "Alice".to_string(),
            ev_won: 100.0,
            ev_bb100: 5.0,
            won: 120.0,
            hands: 5000,
            country_code: None,
        }
    }

    #[tokio::test]
    async fn first_leaderboard_has_unknown_country_and_no_deltas() {
        let h = harness(vec![alice()]);
        let (status, body) = get(&h.app, "/leaderboard").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["players"][0]["name"], "Alice");
        assert_eq!(body["players"][0]["countryCode"], "unknown");
        assert_eq!(body["players"][0]["evBB100"], 5.0);
        assert!(body["players"][0].get("rankChange").is_none());
        assert_eq!(body["hasPreviousDayData"], false);
        assert_eq!(body["previousDayDate"], Value::Null);
        assert_eq!(body["isHistorical"], false);
        assert!(body.get("stale").is_none());
    }

    #[tokio::test]
    async fn leaderboard_reports_changes_against_previous_day() {
        let h = harness(vec![player(1, "A"), player(2, "B")]);
        let previous = snapshot_on("2025-03-09", &[player(1, "B"), player(2, "A")]);
        assert!(h.state.snapshots.save_snapshot(&previous).await.is_ok());

        let (status, body) = get(&h.app, "/leaderboard").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["hasPreviousDayData"], true);
        assert_eq!(body["previousDayDate"], "2025-03-09");
        assert_eq!(body["players"][0]["rankChange"], 1);
        assert_eq!(body["players"][1]["rankChange"], -1);
    }

    #[tokio::test]
    async fn cold_empty_source_is_503() {
        let h = harness(Vec::new());
        let (status, body) = get(&h.app, "/leaderboard").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], 3002);
    }

    #[tokio::test]
    async fn cold_unreachable_source_is_502() {
        let h = harness(vec![alice()]);
        h.source.fail_fetch(Some(crate::source::SourceError::Timeout));
        let (status, _) = get(&h.app, "/leaderboard").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn invalid_rows_are_500_and_not_remembered() {
        let oversized = PlayerRecord {
            hands: crate::domain::player::MAX_HANDS + 1,
            ..alice()
        };
        let h = harness(vec![oversized]);
        let (status, body) = get(&h.app, "/leaderboard").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], 3000);

        h.source.set_page(vec![alice()], "T1");
        let (status, body) = get(&h.app, "/leaderboard").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["players"][0]["hands"], 5000);
        assert_eq!(h.source.fetch_calls(), 2);
    }

    #[tokio::test]
    async fn failed_refresh_serves_stale_with_warning() {
        let h = harness(vec![alice()]);
        assert_eq!(get(&h.app, "/leaderboard").await.0, StatusCode::OK);
        h.source.set_page(Vec::new(), "T2");

        let (status, body) = get(&h.app, "/leaderboard").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stale"], true);
        assert!(body["warning"].is_string());
        assert_eq!(body["webpageTimestamp"], "T1");
    }

    #[tokio::test]
    async fn eleventh_request_is_rate_limited() {
        let h = harness(vec![alice()]);
        for _ in 0..10 {
            assert_eq!(get(&h.app, "/leaderboard").await.0, StatusCode::OK);
        }
        let (status, headers, body) = send(&h.app, Method::GET, "/leaderboard", None).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            headers.get(RETRY_AFTER).and_then(|v| v.to_str().ok()),
            Some("60")
        );
        assert_eq!(body["error"]["code"], 429);

        // History is not limited.
        assert_eq!(get(&h.app, "/history").await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn malformed_history_date_is_400() {
        let h = harness(vec![alice()]);
        let (status, body) = get(&h.app, "/history/2025-13-40").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], 1001);
    }

    #[tokio::test]
    async fn missing_history_date_is_404() {
        let h = harness(vec![alice()]);
        let (status, _) = get(&h.app, "/history/2025-01-01").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn stored_snapshot_is_served_as_historical() {
        let h = harness(vec![alice()]);
        let snap = snapshot_on("2025-03-09", &[player(1, "A"), player(2, "B")]);
        assert!(h.state.snapshots.save_snapshot(&snap).await.is_ok());

        let (status, body) = get(&h.app, "/history/2025-03-09").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isHistorical"], true);
        assert_eq!(body["hasPreviousDayData"], false);
        assert_eq!(body["previousDayDate"], Value::Null);
        assert_eq!(body["players"].as_array().map(Vec::len), Some(2));

        let (status, body) = get(&h.app, "/history").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["snapshots"][0]["date"], "2025-03-09");
        assert!(body["snapshots"][0].get("playerCount").is_none());
    }

    #[tokio::test]
    async fn admin_rebuild_and_debug_report_sync() {
        let h = harness(vec![alice()]);
        let snap = snapshot_on("2025-03-08", &[player(1, "A")]);
        let Ok(bytes) = serde_json::to_vec(&snap) else {
            panic!("encode failed");
        };
        let _ = h.store.put("snapshots/2025-03-08.json", bytes).await;

        let (_, _, before) = send(&h.app, Method::GET, "/admin/debug-snapshots", None).await;
        assert_eq!(before["inSync"], false);
        assert_eq!(before["missingInIndex"][0], "2025-03-08");
        assert_eq!(before["cache"]["state"], "cold");

        let (status, _, summary) = send(&h.app, Method::POST, "/admin/rebuild-index", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["totalSnapshots"], 1);
        assert_eq!(summary["newestDate"], "2025-03-08");

        let (_, _, after) = send(&h.app, Method::GET, "/admin/debug-snapshots", None).await;
        assert_eq!(after["inSync"], true);
    }

    #[tokio::test]
    async fn revalidate_forces_rescrape() {
        let h = harness(vec![alice()]);
        assert_eq!(get(&h.app, "/leaderboard").await.0, StatusCode::OK);
        let (status, _, _) = send(&h.app, Method::POST, "/admin/revalidate", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(get(&h.app, "/leaderboard").await.0, StatusCode::OK);
        assert_eq!(h.source.fetch_calls(), 2);
    }

    #[tokio::test]
    async fn countries_can_be_set_and_listed() {
        let h = harness(vec![alice()]);
        let (status, _, body) = send(
            &h.app,
            Method::PUT,
            "/admin/countries/Alice",
            Some(r#"{"countryCode":"DE"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["countryCode"], "de");

        let (_, body) = get(&h.app, "/admin/countries").await;
        assert_eq!(body["countries"]["Alice"], "de");
        assert_eq!(body["count"], 1);

        let (status, body) = get(&h.app, "/leaderboard").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["players"][0]["countryCode"], "de");
    }

    #[tokio::test]
    async fn invalid_country_code_is_400() {
        let h = harness(vec![alice()]);
        let (status, _, _) = send(
            &h.app,
            Method::PUT,
            "/admin/countries/Alice",
            Some(r#"{"countryCode":"Germany"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn admin_routes_can_be_disabled() {
        let h = harness(vec![alice()]);
        let app = build_router(&h.state, false).with_state(h.state.clone());
        let (status, _) = get(&app, "/admin/countries").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_is_ok() {
        let h = harness(Vec::new());
        let (status, body) = get(&h.app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["cacheState"], "cold");
        assert_eq!(body["indexedSnapshots"], 0);
    }
}
