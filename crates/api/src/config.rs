//! API configuration.

use serde::Deserialize;

/// Where to listen and how aggressively to rate-limit
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Bind address, e.g. "127.0.0.1:8080"
    pub bind_addr: String,
    /// Requests allowed per identifier per window
    pub max_requests: u32,
    /// Rate-limit window in milliseconds
    pub window_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            max_requests: 100,
            window_ms: 60_000,
        }
    }
}
