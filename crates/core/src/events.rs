//! Event system for inter-crate communication
//!
//! This module provides a broadcast-based event bus that allows crates to
//! publish events without directly depending on each other. Security,
//! health, and cache events all flow through the same channel; audit
//! subscribers attach via [`EventBus::subscribe`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::error;

/// Rate limiting, abuse detection, and block list events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SecurityEvent {
    /// An identifier exceeded its request window
    RateLimitExceeded {
        identifier: String,
        violation_count: u32,
    },
    /// A request from an actively blocked identifier was rejected
    BlockedRequestRejected { identifier: String, reason: String },
    /// An identifier was blocked by escalation or abuse detection
    IdentifierBlocked {
        identifier: String,
        reason: String,
        duration_ms: u64,
    },
    /// The heuristic detector flagged an identifier
    SuspiciousActivity {
        identifier: String,
        user_agent: Option<String>,
    },
    /// An operator blocked an identifier through the API
    ManualBlock {
        identifier: String,
        reason: String,
        duration_ms: u64,
    },
}

/// Health monitoring events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HealthEvent {
    /// A probe did not answer within its timeout
    ProbeTimedOut { service: String, timeout_ms: u64 },
    /// The aggregate status changed between sweeps
    OverallStatusChanged { from: String, to: String },
}

/// Fallback cache events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CacheEvent {
    /// Fresh entry served
    Hit { key: String },
    /// No usable entry
    Miss { key: String },
    /// New value written
    Write { key: String },
    /// Entry removed to stay under capacity
    Evicted { key: String },
    /// Stale or fallback value served in place of a live result
    StaleServed { key: String },
    /// A background revalidation failed (swallowed, logged)
    RefreshFailed { key: String, error: String },
}

/// All possible events in the system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SystemEvent {
    Security(SecurityEvent),
    Health(HealthEvent),
    Cache(CacheEvent),
}

/// An event with its publication timestamp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StampedEvent {
    pub event: SystemEvent,
    #[serde(with = "crate::serialization::time::system_time_as_millis")]
    pub timestamp: SystemTime,
}

/// Publication statistics for monitoring
#[derive(Debug, Default, Clone)]
pub struct EventStats {
    pub events_published: u64,
    pub last_event_time: Option<SystemTime>,
}

/// Broadcast-based event bus. Cloning is cheap; all clones share the same
/// channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StampedEvent>,
    stats: Arc<parking_lot::Mutex<EventStats>>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            stats: Arc::new(parking_lot::Mutex::new(EventStats::default())),
        }
    }

    /// Publish an event to all current subscribers
    pub fn publish(&self, event: SystemEvent) {
        let stamped = StampedEvent {
            event,
            timestamp: SystemTime::now(),
        };

        {
            let mut stats = self.stats.lock();
            stats.events_published += 1;
            stats.last_event_time = Some(stamped.timestamp);
        }

        if let Err(e) = self.sender.send(stamped) {
            // Only worth reporting when receivers were supposed to exist
            if self.sender.receiver_count() > 0 {
                error!("Failed to broadcast event: {}", e);
            }
        }
    }

    /// Attach a subscriber. Events published before the call are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<StampedEvent> {
        self.sender.subscribe()
    }

    /// Snapshot of publication statistics
    pub fn stats(&self) -> EventStats {
        self.stats.lock().clone()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(SystemEvent::Cache(CacheEvent::Hit {
            key: "leaderboard".into(),
        }));

        let stamped = rx.recv().await.unwrap();
        match stamped.event {
            SystemEvent::Cache(CacheEvent::Hit { key }) => assert_eq!(key, "leaderboard"),
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(bus.stats().events_published, 1);
    }

    #[tokio::test]
    async fn publishing_without_subscribers_is_not_an_error() {
        let bus = EventBus::new(16);
        bus.publish(SystemEvent::Security(SecurityEvent::RateLimitExceeded {
            identifier: "10.0.0.1".into(),
            violation_count: 1,
        }));
        assert_eq!(bus.stats().events_published, 1);
    }
}
