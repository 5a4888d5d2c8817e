//! Request middleware: per-client rate limiting.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use crate::app_state::AppState;
use crate::error::AppError;

/// Client key when neither a forwarded address nor a peer is known.
const UNKNOWN_CLIENT: &str = "unknown";

/// Rejects requests beyond the client's allowance with 429.
///
/// # Errors
///
/// Returns [`AppError::RateLimited`] when the client is over its limit.
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client = client_address(
        request.headers(),
        request.extensions().get::<ConnectInfo<SocketAddr>>(),
    );
    state.rate_limiter.check(&client)?;
    Ok(next.run(request).await)
}

/// First `X-Forwarded-For` hop, else the socket peer address.
#[must_use]
pub fn client_address(headers: &HeaderMap, peer: Option<&ConnectInfo<SocketAddr>>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|info| info.0.ip().to_string()))
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn forwarded_for_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        let peer = ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000)));
        assert_eq!(client_address(&headers, Some(&peer)), "203.0.113.7");
    }

    #[test]
    fn falls_back_to_peer_then_unknown() {
        let headers = HeaderMap::new();
        let peer = ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4000)));
        assert_eq!(client_address(&headers, Some(&peer)), "192.0.2.1");
        assert_eq!(client_address(&headers, None), UNKNOWN_CLIENT);
    }
}
