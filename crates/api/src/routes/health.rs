//! Health reporting endpoints.

use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use questdeck_health::HealthStatus;

/// Full system health report. Answers 503 when the aggregate is unhealthy
/// so load balancers can act on the status code alone.
pub async fn health_report(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.health.check_all().await;
    let status = match report.overall {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    (status, Json(report))
}

/// Lightweight liveness probe: status code only, no body.
pub async fn liveness(State(state): State<AppState>) -> StatusCode {
    let report = state.health.check_all().await;
    match report.overall {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use questdeck_core::{ErrorClassifier, EventBus};
    use questdeck_guard::{AbuseGuard, GuardConfig};
    use questdeck_health::{HealthMonitor, ProbeReport};
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
    async fn liveness_reflects_aggregate_status() {
        let state = state();
        state
            .health
            .register_fn("points", || async { Ok(ProbeReport::healthy()) });
        assert_eq!(liveness(State(state.clone())).await, StatusCode::OK);

        state.health.register_fn("badges", || async {
            Ok(ProbeReport::unhealthy("backend 503"))
        });
        assert_eq!(
            liveness(State(state)).await,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn report_carries_per_service_entries() {
        let state = state();
        state
            .health
            .register_fn("points", || async { Ok(ProbeReport::healthy()) });

        let response = health_report(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
