//! Rate-limit middleware.
//!
//! Requests are attributed to an identifier taken from `X-Forwarded-For`
//! (first hop) when present, falling back to the peer address. Denied
//! requests answer 429 with a fixed retry-after hint in both the header and
//! the body.

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use questdeck_guard::{AbuseGuard, Decision};
use serde_json::json;
use std::net::SocketAddr;
use std::time::Duration;

/// State captured by the rate-limit layer
#[derive(Clone)]
pub struct RateLimitLayer {
    pub guard: AbuseGuard,
    pub max_requests: u32,
    pub window: Duration,
}

pub async fn rate_limit(
    State(layer): State<RateLimitLayer>,
    request: Request,
    next: Next,
) -> Response {
    let identifier = client_identifier(&request);
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok());

    // Every request feeds the volume counter behind the heuristics
    layer.guard.detect_suspicious(&identifier, user_agent);

    match layer.guard.check(&identifier, layer.max_requests, layer.window) {
        Decision::Allowed => next.run(request).await,
        Decision::Denied {
            reason,
            retry_after_secs,
        } => {
            let body = json!({
                "error": "too many requests",
                "reason": reason,
                "retryAfterSeconds": retry_after_secs,
            });
            let mut response =
                (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
            response
        }
    }
}

/// Attribution: first X-Forwarded-For hop, then the peer address.
fn client_identifier(request: &Request) -> String {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with_header(name: &str, value: &str) -> Request {
        axum::http::Request::builder()
            .uri("/api/errors")
            .header(name, value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn forwarded_header_wins() {
        let request = request_with_header("x-forwarded-for", "198.51.100.7, 10.0.0.1");
        assert_eq!(client_identifier(&request), "198.51.100.7");
    }

    #[test]
    fn missing_attribution_falls_back_to_unknown() {
        let request = axum::http::Request::builder()
            .uri("/api/errors")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_identifier(&request), "unknown");
    }

    #[test]
    fn peer_address_is_used_when_no_forwarded_header() {
        let mut request = axum::http::Request::builder()
            .uri("/api/errors")
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 4], 4433))));
        assert_eq!(client_identifier(&request), "192.0.2.4");
    }
}
