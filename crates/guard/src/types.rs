//! Records and decisions for rate limiting and abuse detection.

use questdeck_core::constants::{CLEANUP_INTERVAL, LONG_BLOCK, RETRY_AFTER_SECS, SHORT_BLOCK};
use questdeck_core::serialization::time::system_time_as_millis;
use serde::Serialize;
use std::time::{Duration, SystemTime};

/// Tunables for the guard. Block durations are configurable so operators
/// (and tests) can shorten the escalation ladder.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// How often the cleanup sweep runs
    pub cleanup_interval: Duration,
    /// Block applied at the lower escalation threshold
    pub short_block: Duration,
    /// Block applied at the upper escalation threshold
    pub long_block: Duration,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            cleanup_interval: CLEANUP_INTERVAL,
            short_block: SHORT_BLOCK,
            long_block: LONG_BLOCK,
        }
    }
}

/// Per-identifier counting window. The window boundary only ever moves
/// forward; violations survive window resets.
#[derive(Debug, Clone)]
pub struct RateRecord {
    pub window_count: u32,
    pub window_reset_at: SystemTime,
    pub violation_count: u32,
}

/// An active temporary block. Removed lazily on the next access after it
/// expires, never re-checked actively.
#[derive(Debug, Clone)]
pub struct BlockEntry {
    pub blocked_until: SystemTime,
    pub reason: String,
}

/// Rolling activity counter for the suspicion heuristics
#[derive(Debug, Clone)]
pub struct SuspicionRecord {
    pub count: u64,
    pub first_seen_at: SystemTime,
}

/// Outcome of a rate-limit check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied {
        reason: String,
        retry_after_secs: u64,
    },
}

impl Decision {
    pub fn denied(reason: impl Into<String>) -> Self {
        Decision::Denied {
            reason: reason.into(),
            retry_after_secs: RETRY_AFTER_SECS,
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// Wire representation of an active block for the security status query
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockInfo {
    pub identifier: String,
    #[serde(with = "system_time_as_millis")]
    pub blocked_until: SystemTime,
    pub reason: String,
}
