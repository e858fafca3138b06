//! Error reporting endpoints.

use crate::state::AppState;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use questdeck_core::constants::DEFAULT_ERROR_METRICS_WINDOW;
use questdeck_core::serialization::epoch_millis;
use questdeck_core::Error;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Client-submitted error report
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub kind: String,
    pub message: String,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

/// Acknowledgement of a recorded report
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReceipt {
    pub error_id: String,
    pub timestamp: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsQuery {
    #[serde(default)]
    pub window_ms: Option<u64>,
}

/// Record a client-side failure in the classifier history.
pub async fn report_error(
    State(state): State<AppState>,
    Json(report): Json<ErrorReport>,
) -> impl IntoResponse {
    let error = error_from_report(&report);
    let context = report.context.or(report.details);
    state
        .classifier
        .classify_and_record(&error, context.as_deref());

    let receipt = ErrorReceipt {
        error_id: Uuid::new_v4().to_string(),
        timestamp: epoch_millis(SystemTime::now()),
    };
    (StatusCode::CREATED, Json(receipt))
}

/// Aggregate error metrics over the requested window (default one hour).
pub async fn error_metrics(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> impl IntoResponse {
    let window = query
        .window_ms
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_ERROR_METRICS_WINDOW);
    Json(state.classifier.metrics(window))
}

/// Map a reported kind string onto the error taxonomy; anything we do not
/// recognize lands in Unknown.
fn error_from_report(report: &ErrorReport) -> Error {
    match report.kind.as_str() {
        "authentication" => Error::authentication(report.message.clone()),
        "remote_service" => Error::remote_service("reported", report.message.clone()),
        "network" => Error::network("reported", report.message.clone()),
        "validation" => Error::validation(report.message.clone()),
        "configuration" => Error::configuration(report.message.clone()),
        _ => Error::unknown(report.message.clone()),
    }
}
