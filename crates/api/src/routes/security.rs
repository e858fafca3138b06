//! Security status and block operations.

use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use questdeck_guard::BlockInfo;
use serde::Deserialize;
use std::time::Duration;

/// Operator request to block an identifier
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRequest {
    pub identifier: String,
    pub reason: String,
    pub duration_ms: u64,
}

/// Current list of blocked identifiers.
pub async fn blocked_identifiers(State(state): State<AppState>) -> Json<Vec<BlockInfo>> {
    Json(state.guard.blocked())
}

/// Insert or overwrite a block; the guard emits the audit event.
pub async fn block_identifier(
    State(state): State<AppState>,
    Json(request): Json<BlockRequest>,
) -> impl IntoResponse {
    if request.identifier.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "identifier must not be empty").into_response();
    }

    state.guard.block(
        &request.identifier,
        &request.reason,
        Duration::from_millis(request.duration_ms),
    );
    StatusCode::CREATED.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use questdeck_core::{ErrorClassifier, EventBus, SecurityEvent, SystemEvent};
    use questdeck_guard::{AbuseGuard, GuardConfig};
    use questdeck_health::HealthMonitor;
    use std::sync::Arc;

    fn state() -> AppState {
        let events = EventBus::new(64);
        AppState::new(
            HealthMonitor::new(events.clone()),
            AbuseGuard::new(GuardConfig::default(), events.clone()),
            Arc::new(ErrorClassifier::new()),
            events,
        )
    }

    #[tokio::test]
    async fn blocking_shows_up_in_the_listing_and_audit_log() {
        let state = state();
        let mut rx = state.events.subscribe();

        let response = block_identifier(
            State(state.clone()),
            Json(BlockRequest {
                identifier: "203.0.113.9".to_string(),
                reason: "scraping leaderboards".to_string(),
                duration_ms: 120_000,
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);

        let listing = blocked_identifiers(State(state)).await;
        assert_eq!(listing.0.len(), 1);
        assert_eq!(listing.0[0].identifier, "203.0.113.9");

        let stamped = rx.recv().await.unwrap();
        assert!(matches!(
            stamped.event,
            SystemEvent::Security(SecurityEvent::ManualBlock { .. })
        ));
    }

    #[tokio::test]
    async fn empty_identifier_is_rejected() {
        let state = state();
        let response = block_identifier(
            State(state),
            Json(BlockRequest {
                identifier: "  ".to_string(),
                reason: "oops".to_string(),
                duration_ms: 60_000,
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
