//! Core types for health monitoring.

use questdeck_core::constants::{DEFAULT_PROBE_RETRIES, DEFAULT_PROBE_TIMEOUT};
use questdeck_core::serialization::time::system_time_as_millis;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// Health of a single service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

/// What a probe reports back when it completes
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub status: HealthStatus,
    pub detail: Option<String>,
}

impl ProbeReport {
    pub fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            detail: None,
        }
    }

    pub fn degraded(detail: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Degraded,
            detail: Some(detail.into()),
        }
    }

    pub fn unhealthy(detail: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            detail: Some(detail.into()),
        }
    }
}

/// One recorded check outcome, appended to the service's rolling history
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckResult {
    #[serde(rename = "service")]
    pub service_name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "timestamp", with = "system_time_as_millis")]
    pub observed_at: SystemTime,
}

/// Derived metrics over a caller-supplied window; never stored
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMetrics {
    pub uptime_pct: f64,
    pub avg_response_time_ms: f64,
    pub error_rate_pct: f64,
    pub sample_count: usize,
}

impl ServiceMetrics {
    pub fn zero() -> Self {
        Self {
            uptime_pct: 0.0,
            avg_response_time_ms: 0.0,
            error_rate_pct: 0.0,
            sample_count: 0,
        }
    }
}

/// Per-probe overrides for timeout and retry behavior
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    /// How long a single probe invocation may run
    pub timeout: Duration,
    /// Additional attempts after a failed invocation
    pub retries: u32,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_PROBE_TIMEOUT,
            retries: DEFAULT_PROBE_RETRIES,
        }
    }
}
