//! OpenAPI document for every REST endpoint.

use utoipa::OpenApi;

use super::handlers::{admin, leaderboard, system};

/// Generated OpenAPI 3 description of the service.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "leaderboard-tracker",
        description = "Current leaderboard with day-over-day changes, daily snapshot history, and maintenance endpoints."
    ),
    paths(
        leaderboard::get_leaderboard,
        leaderboard::list_history,
        leaderboard::get_history,
        admin::rebuild_index,
        admin::debug_snapshots,
        admin::revalidate,
        admin::list_countries,
        admin::set_country,
        system::health_handler,
    ),
    tags(
        (name = "Leaderboard", description = "Current rankings"),
        (name = "History", description = "Daily snapshots"),
        (name = "Admin", description = "Operator maintenance"),
        (name = "System", description = "Service health"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_all_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/leaderboard",
            "/history",
            "/history/{date}",
            "/admin/rebuild-index",
            "/admin/debug-snapshots",
            "/admin/revalidate",
            "/admin/countries",
            "/admin/countries/{name}",
            "/health",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
