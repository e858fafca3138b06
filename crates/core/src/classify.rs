//! Error classification at failure boundaries.
//!
//! Every raw failure is normalized into a [`ClassifiedError`] before it is
//! logged or returned: a severity-tagged, user-facing description plus a
//! retryability verdict that the retry executor consults. The classifier
//! also keeps a bounded in-memory history used for pattern analysis and the
//! error reporting endpoint.

use crate::constants::ERROR_HISTORY_CAP;
use crate::errors::Error;
use crate::serialization::time::system_time_as_millis;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, SystemTime};

/// Failure taxonomy for the proxied backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    Authentication,
    RemoteService,
    Network,
    Validation,
    Configuration,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Authentication => "authentication",
            ErrorKind::RemoteService => "remote_service",
            ErrorKind::Network => "network",
            ErrorKind::Validation => "validation",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Unknown => "unknown",
        }
    }
}

/// How badly a failure affects the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// A normalized failure description. Created at a failure boundary and never
/// mutated afterwards.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
    pub user_message: String,
    pub severity: Severity,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_details: Option<String>,
    #[serde(with = "system_time_as_millis")]
    pub timestamp: SystemTime,
}

/// Windowed aggregate over the classifier history, consumed by the error
/// reporting endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMetrics {
    pub total_errors: usize,
    pub errors_by_kind: HashMap<String, usize>,
    pub errors_by_severity: HashMap<String, usize>,
    pub recent_errors: Vec<ClassifiedError>,
    /// Errors per minute over the requested window
    pub error_rate: f64,
}

/// Maps raw failures into classified descriptions and keeps a bounded
/// history of everything it has seen.
pub struct ErrorClassifier {
    history: Mutex<VecDeque<ClassifiedError>>,
    cap: usize,
}

impl ErrorClassifier {
    pub fn new() -> Self {
        Self::with_capacity(ERROR_HISTORY_CAP)
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            history: Mutex::new(VecDeque::with_capacity(cap)),
            cap,
        }
    }

    /// Classify a raw failure. Pure lookup; nothing is recorded.
    pub fn classify(&self, error: &Error, context: Option<&str>) -> ClassifiedError {
        let (kind, severity, retryable, user_message) = lookup(error);
        ClassifiedError {
            kind,
            message: error.to_string(),
            user_message: user_message.to_string(),
            severity,
            retryable,
            raw_details: context.map(str::to_string),
            timestamp: SystemTime::now(),
        }
    }

    /// Classify and append to the bounded history.
    pub fn classify_and_record(&self, error: &Error, context: Option<&str>) -> ClassifiedError {
        let classified = self.classify(error, context);
        self.record(classified.clone());
        classified
    }

    /// Append an already-classified failure to the history, dropping the
    /// oldest entry when the cap is reached.
    pub fn record(&self, classified: ClassifiedError) {
        let mut history = self.history.lock();
        if history.len() >= self.cap {
            history.pop_front();
        }
        history.push_back(classified);
    }

    /// Counts by kind over the recent window, for pattern analysis.
    pub fn counts_by_kind(&self, window: Duration) -> HashMap<ErrorKind, usize> {
        let cutoff = window_cutoff(window);
        let history = self.history.lock();
        let mut counts = HashMap::new();
        for entry in history.iter().filter(|e| e.timestamp >= cutoff) {
            *counts.entry(entry.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Aggregate metrics over the requested window.
    pub fn metrics(&self, window: Duration) -> ErrorMetrics {
        let cutoff = window_cutoff(window);
        let history = self.history.lock();
        let in_window: Vec<&ClassifiedError> = history
            .iter()
            .filter(|e| e.timestamp >= cutoff)
            .collect();

        let mut errors_by_kind: HashMap<String, usize> = HashMap::new();
        let mut errors_by_severity: HashMap<String, usize> = HashMap::new();
        for entry in &in_window {
            *errors_by_kind
                .entry(entry.kind.as_str().to_string())
                .or_insert(0) += 1;
            *errors_by_severity
                .entry(entry.severity.as_str().to_string())
                .or_insert(0) += 1;
        }

        let recent_errors: Vec<ClassifiedError> = in_window
            .iter()
            .rev()
            .take(10)
            .map(|e| (*e).clone())
            .collect();

        let minutes = window.as_secs_f64() / 60.0;
        let error_rate = if minutes > 0.0 {
            in_window.len() as f64 / minutes
        } else {
            0.0
        };

        ErrorMetrics {
            total_errors: in_window.len(),
            errors_by_kind,
            errors_by_severity,
            recent_errors,
            error_rate,
        }
    }

    /// Number of entries currently held in the history.
    pub fn history_len(&self) -> usize {
        self.history.lock().len()
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Caller-supplied windows can be arbitrarily large; clamp instead of
/// underflowing past the epoch.
fn window_cutoff(window: Duration) -> SystemTime {
    SystemTime::now()
        .checked_sub(window)
        .unwrap_or(std::time::UNIX_EPOCH)
}

/// The fixed classification table. Returns (kind, severity, retryable,
/// user-facing message).
fn lookup(error: &Error) -> (ErrorKind, Severity, bool, &'static str) {
    match error {
        Error::Authentication { .. } => (
            ErrorKind::Authentication,
            Severity::High,
            false,
            "Your session has expired. Please sign in again.",
        ),
        Error::RemoteService { status, .. } => {
            // Upstream 4xx responses will not heal on their own; everything
            // else from the remote is treated as transient.
            let retryable = match status {
                Some(code) if *code < 500 && *code != 429 => false,
                _ => true,
            };
            (
                ErrorKind::RemoteService,
                Severity::Medium,
                retryable,
                "The gamification service is temporarily unavailable. Please try again shortly.",
            )
        }
        Error::Network { .. } => (
            ErrorKind::Network,
            Severity::Medium,
            true,
            "We are having trouble reaching the service. Please check your connection.",
        ),
        Error::Timeout { .. } => (
            ErrorKind::Network,
            Severity::Medium,
            true,
            "The request took too long to complete. Please try again.",
        ),
        Error::Validation { .. } => (
            ErrorKind::Validation,
            Severity::Low,
            false,
            "The request could not be processed. Please check your input.",
        ),
        Error::Json { .. } => (
            ErrorKind::Validation,
            Severity::Low,
            false,
            "The service returned data we could not understand.",
        ),
        Error::Configuration { .. } => (
            ErrorKind::Configuration,
            Severity::Medium,
            false,
            "The service is misconfigured. Please contact support.",
        ),
        Error::CircuitOpen { .. } => (
            ErrorKind::RemoteService,
            Severity::High,
            false,
            "The gamification service is temporarily unavailable. Please try again shortly.",
        ),
        Error::Unknown { .. } => (
            ErrorKind::Unknown,
            Severity::Medium,
            false,
            "Something went wrong. Please try again later.",
        ),
    }
}
