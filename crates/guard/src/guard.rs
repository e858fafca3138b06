//! The abuse guard: sliding-window rate limiting, escalating blocks,
//! suspicion heuristics, and the periodic cleanup sweep.

use crate::types::{BlockEntry, BlockInfo, Decision, GuardConfig, RateRecord, SuspicionRecord};
use dashmap::DashMap;
use parking_lot::Mutex;
use questdeck_core::constants::{
    BOT_UA_MARKERS, ESCALATION_LONG_THRESHOLD, ESCALATION_SHORT_THRESHOLD, MIN_UA_LENGTH,
    RECOMMENDED_MIN_BLOCK, SUSPICION_HARD_VOLUME, SUSPICION_STALE_AFTER, SUSPICION_THRESHOLD,
    SUSPICION_WINDOW,
};
use questdeck_core::{EventBus, SecurityEvent, SystemEvent};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

struct GuardInner {
    config: GuardConfig,
    records: DashMap<String, RateRecord>,
    blocks: DashMap<String, BlockEntry>,
    suspicion: DashMap<String, SuspicionRecord>,
    events: EventBus,
}

/// Per-identifier rate limiter and abuse detector. Cloning is cheap; all
/// clones share the same registries and sweep task slot.
#[derive(Clone)]
pub struct AbuseGuard {
    inner: Arc<GuardInner>,
    sweep_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl AbuseGuard {
    pub fn new(config: GuardConfig, events: EventBus) -> Self {
        Self {
            inner: Arc::new(GuardInner {
                config,
                records: DashMap::new(),
                blocks: DashMap::new(),
                suspicion: DashMap::new(),
                events,
            }),
            sweep_task: Arc::new(Mutex::new(None)),
        }
    }

    /// Decide whether a request from `identifier` may proceed.
    ///
    /// An active block denies outright. Otherwise the identifier's counting
    /// window is found or created: an elapsed window resets the counter to 1
    /// (violations are preserved across windows), a counter already at
    /// `max_requests` denies and escalates, and anything else increments
    /// and allows.
    pub fn check(&self, identifier: &str, max_requests: u32, window: Duration) -> Decision {
        let now = SystemTime::now();

        if let Some(block) = self.inner.blocks.get(identifier) {
            if now < block.blocked_until {
                let reason = block.reason.clone();
                drop(block);
                warn!(identifier, %reason, "rejected request from blocked identifier");
                self.publish(SecurityEvent::BlockedRequestRejected {
                    identifier: identifier.to_string(),
                    reason: reason.clone(),
                });
                return Decision::denied(reason);
            }
            drop(block);
            // Expired: removed lazily here, never re-checked actively
            self.inner.blocks.remove(identifier);
            debug!(identifier, "expired block removed");
        }

        // The whole read-modify-write on this identifier's record happens
        // under one entry guard
        let violations = {
            let mut record = self
                .inner
                .records
                .entry(identifier.to_string())
                .or_insert_with(|| RateRecord {
                    window_count: 0,
                    window_reset_at: now + window,
                    violation_count: 0,
                });

            if now > record.window_reset_at {
                record.window_count = 1;
                record.window_reset_at = now + window;
                return Decision::Allowed;
            }

            if record.window_count >= max_requests {
                record.violation_count += 1;
                record.violation_count
            } else {
                record.window_count += 1;
                return Decision::Allowed;
            }
        };

        warn!(identifier, violations, "rate limit exceeded");
        self.publish(SecurityEvent::RateLimitExceeded {
            identifier: identifier.to_string(),
            violation_count: violations,
        });

        if violations >= ESCALATION_LONG_THRESHOLD {
            self.insert_block(
                identifier,
                "repeated rate limit violations",
                self.inner.config.long_block,
            );
        } else if violations >= ESCALATION_SHORT_THRESHOLD {
            self.insert_block(
                identifier,
                "rate limit violations",
                self.inner.config.short_block,
            );
        }

        Decision::denied("too many requests")
    }

    /// Heuristic suspicious-activity detector.
    ///
    /// Keeps a rolling per-identifier count that resets after an hour from
    /// first-seen. An identifier is flagged (and blocked for the short
    /// duration) once the count passes the threshold and at least one
    /// user-agent or volume heuristic fires.
    pub fn detect_suspicious(&self, identifier: &str, user_agent: Option<&str>) -> bool {
        let now = SystemTime::now();

        let count = {
            let mut record = self
                .inner
                .suspicion
                .entry(identifier.to_string())
                .or_insert_with(|| SuspicionRecord {
                    count: 0,
                    first_seen_at: now,
                });
            let age = now
                .duration_since(record.first_seen_at)
                .unwrap_or_default();
            if age > SUSPICION_WINDOW {
                record.count = 0;
                record.first_seen_at = now;
            }
            record.count += 1;
            record.count
        };

        if count <= SUSPICION_THRESHOLD {
            return false;
        }

        let ua_suspect = match user_agent {
            None => true,
            Some(ua) => {
                let trimmed = ua.trim();
                trimmed.len() < MIN_UA_LENGTH || {
                    let lower = trimmed.to_lowercase();
                    BOT_UA_MARKERS.iter().any(|marker| lower.contains(marker))
                }
            }
        };

        if count > SUSPICION_HARD_VOLUME || ua_suspect {
            warn!(identifier, count, user_agent, "suspicious activity detected");
            self.publish(SecurityEvent::SuspiciousActivity {
                identifier: identifier.to_string(),
                user_agent: user_agent.map(str::to_string),
            });
            self.insert_block(
                identifier,
                "suspicious activity detected",
                self.inner.config.short_block,
            );
            return true;
        }

        false
    }

    /// Insert or overwrite a block on behalf of an operator and emit an
    /// audit event.
    pub fn block(&self, identifier: &str, reason: &str, duration: Duration) {
        if duration < RECOMMENDED_MIN_BLOCK {
            warn!(
                identifier,
                ?duration,
                "block duration is below the recommended minimum of {:?}",
                RECOMMENDED_MIN_BLOCK
            );
        }
        self.inner.blocks.insert(
            identifier.to_string(),
            BlockEntry {
                blocked_until: SystemTime::now() + duration,
                reason: reason.to_string(),
            },
        );
        info!(identifier, reason, ?duration, "identifier blocked by operator");
        self.publish(SecurityEvent::ManualBlock {
            identifier: identifier.to_string(),
            reason: reason.to_string(),
            duration_ms: duration.as_millis() as u64,
        });
    }

    /// Currently active blocks, for the security status query
    pub fn blocked(&self) -> Vec<BlockInfo> {
        let now = SystemTime::now();
        self.inner
            .blocks
            .iter()
            .filter(|entry| now < entry.blocked_until)
            .map(|entry| BlockInfo {
                identifier: entry.key().clone(),
                blocked_until: entry.blocked_until,
                reason: entry.reason.clone(),
            })
            .collect()
    }

    /// Purge elapsed windows, expired blocks, and stale suspicion records.
    /// Returns how many entries were removed.
    pub fn purge(&self) -> usize {
        let now = SystemTime::now();
        let before = self.inner.records.len() + self.inner.blocks.len() + self.inner.suspicion.len();

        self.inner.records.retain(|_, r| now <= r.window_reset_at);
        self.inner.blocks.retain(|_, b| now < b.blocked_until);
        self.inner.suspicion.retain(|_, s| {
            now.duration_since(s.first_seen_at).unwrap_or_default() <= SUSPICION_STALE_AFTER
        });

        let after = self.inner.records.len() + self.inner.blocks.len() + self.inner.suspicion.len();
        before - after
    }

    /// Start the periodic cleanup sweep. Idempotent.
    pub fn start_sweep(&self) {
        let mut task = self.sweep_task.lock();
        if task.is_some() {
            debug!("cleanup sweep already running");
            return;
        }

        info!(interval = ?self.inner.config.cleanup_interval, "starting cleanup sweep");
        let guard = self.clone();
        let interval = self.inner.config.cleanup_interval;
        *task = Some(tokio::spawn(async move {
            loop {
                sleep(interval).await;
                let removed = guard.purge();
                if removed > 0 {
                    debug!(removed, "cleanup sweep purged stale entries");
                }
            }
        }));
    }

    /// Stop the periodic cleanup sweep. Idempotent.
    pub fn stop_sweep(&self) {
        if let Some(handle) = self.sweep_task.lock().take() {
            info!("stopping cleanup sweep");
            handle.abort();
        }
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweep_task.lock().is_some()
    }

    fn insert_block(&self, identifier: &str, reason: &str, duration: Duration) {
        self.inner.blocks.insert(
            identifier.to_string(),
            BlockEntry {
                blocked_until: SystemTime::now() + duration,
                reason: reason.to_string(),
            },
        );
        warn!(identifier, reason, ?duration, "identifier blocked");
        self.publish(SecurityEvent::IdentifierBlocked {
            identifier: identifier.to_string(),
            reason: reason.to_string(),
            duration_ms: duration.as_millis() as u64,
        });
    }

    fn publish(&self, event: SecurityEvent) {
        self.inner.events.publish(SystemEvent::Security(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> AbuseGuard {
        AbuseGuard::new(GuardConfig::default(), EventBus::new(256))
    }

    fn fast_guard() -> AbuseGuard {
        AbuseGuard::new(
            GuardConfig {
                cleanup_interval: Duration::from_millis(50),
                short_block: Duration::from_millis(80),
                long_block: Duration::from_millis(300),
            },
            EventBus::new(256),
        )
    }

    const WINDOW: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn denies_only_past_the_limit() {
        let g = guard();
        for _ in 0..100 {
            assert!(g.check("10.0.0.1", 100, WINDOW).is_allowed());
        }
        let denied = g.check("10.0.0.1", 100, WINDOW);
        assert!(!denied.is_allowed());
        match denied {
            Decision::Denied {
                retry_after_secs, ..
            } => assert_eq!(retry_after_secs, 60),
            Decision::Allowed => unreachable!(),
        }

        let record = g.inner.records.get("10.0.0.1").unwrap();
        assert_eq!(record.violation_count, 1);
    }

    #[tokio::test]
    async fn identifiers_are_tracked_independently() {
        let g = guard();
        for _ in 0..3 {
            assert!(g.check("a", 3, WINDOW).is_allowed());
        }
        assert!(!g.check("a", 3, WINDOW).is_allowed());
        assert!(g.check("b", 3, WINDOW).is_allowed());
    }

    #[tokio::test]
    async fn window_reset_preserves_violations() {
        let g = guard();
        let window = Duration::from_millis(50);

        assert!(g.check("ip", 1, window).is_allowed());
        assert!(!g.check("ip", 1, window).is_allowed());
        assert_eq!(g.inner.records.get("ip").unwrap().violation_count, 1);

        sleep(Duration::from_millis(70)).await;

        // The elapsed window resets the count, not the violation history
        assert!(g.check("ip", 1, window).is_allowed());
        let record = g.inner.records.get("ip").unwrap();
        assert_eq!(record.window_count, 1);
        assert_eq!(record.violation_count, 1);
    }

    #[tokio::test]
    async fn escalation_blocks_then_supersedes() {
        let g = fast_guard();

        assert!(g.check("ip", 1, WINDOW).is_allowed());
        // Violations 1 and 2: denied but not yet blocked
        assert!(!g.check("ip", 1, WINDOW).is_allowed());
        assert!(!g.check("ip", 1, WINDOW).is_allowed());
        assert!(g.blocked().is_empty());

        // Violation 3: short block
        assert!(!g.check("ip", 1, WINDOW).is_allowed());
        let blocks = g.blocked();
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].reason.contains("rate limit"));

        // While blocked, the denial carries the block reason
        match g.check("ip", 1, WINDOW) {
            Decision::Denied { reason, .. } => assert!(reason.contains("rate limit")),
            Decision::Allowed => panic!("blocked identifier was allowed"),
        }

        // Wait out the short block; the still-full window keeps escalating
        sleep(Duration::from_millis(100)).await;
        assert!(!g.check("ip", 1, WINDOW).is_allowed()); // violation 4
        sleep(Duration::from_millis(100)).await;
        assert!(!g.check("ip", 1, WINDOW).is_allowed()); // violation 5: long block

        assert_eq!(g.inner.records.get("ip").unwrap().violation_count, 5);
        let blocks = g.blocked();
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].reason.contains("repeated"));
        // The long block supersedes the short one
        let remaining = blocks[0]
            .blocked_until
            .duration_since(SystemTime::now())
            .unwrap_or_default();
        assert!(remaining > Duration::from_millis(150));
    }

    #[tokio::test]
    async fn expired_blocks_are_removed_lazily() {
        let g = guard();
        g.block("ip", "manual test block", Duration::from_millis(50));

        assert!(!g.check("ip", 10, WINDOW).is_allowed());
        sleep(Duration::from_millis(70)).await;

        assert!(g.check("ip", 10, WINDOW).is_allowed());
        assert!(!g.inner.blocks.contains_key("ip"));
    }

    #[tokio::test]
    async fn bot_user_agent_trips_the_detector() {
        let g = fast_guard();

        for _ in 0..100 {
            assert!(!g.detect_suspicious("ip", Some("curl/7.88.1")));
        }
        // Count is now past the threshold and the UA carries a bot marker
        assert!(g.detect_suspicious("ip", Some("curl/7.88.1")));
        assert_eq!(g.blocked().len(), 1);
        assert!(g.blocked()[0].reason.contains("suspicious"));
    }

    #[tokio::test]
    async fn ordinary_browser_traffic_is_not_flagged() {
        let g = guard();
        let ua = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";
        for _ in 0..150 {
            assert!(!g.detect_suspicious("ip", Some(ua)));
        }
        assert!(g.blocked().is_empty());
    }

    #[tokio::test]
    async fn missing_and_short_user_agents_are_suspect() {
        let g = fast_guard();
        for _ in 0..101 {
            g.detect_suspicious("no-ua", None);
        }
        assert!(g.detect_suspicious("no-ua", None));

        let g = fast_guard();
        for _ in 0..101 {
            g.detect_suspicious("short-ua", Some("x"));
        }
        assert!(g.detect_suspicious("short-ua", Some("x")));
    }

    #[tokio::test]
    async fn denial_publishes_a_violation_event() {
        let g = guard();
        let mut rx = g.inner.events.subscribe();

        assert!(g.check("ip", 1, WINDOW).is_allowed());
        assert!(!g.check("ip", 1, WINDOW).is_allowed());

        let mut saw_violation = false;
        while let Ok(stamped) = rx.try_recv() {
            if let SystemEvent::Security(SecurityEvent::RateLimitExceeded {
                identifier,
                violation_count,
            }) = stamped.event
            {
                assert_eq!(identifier, "ip");
                assert_eq!(violation_count, 1);
                saw_violation = true;
            }
        }
        assert!(saw_violation);
    }

    #[tokio::test]
    async fn purge_drops_expired_state() {
        let g = guard();
        let window = Duration::from_millis(10);

        assert!(g.check("window-ip", 5, window).is_allowed());
        g.block("blocked-ip", "test", Duration::from_millis(10));
        g.inner.suspicion.insert(
            "stale-ip".to_string(),
            SuspicionRecord {
                count: 7,
                first_seen_at: SystemTime::now() - Duration::from_secs(25 * 3600),
            },
        );

        sleep(Duration::from_millis(30)).await;
        let removed = g.purge();
        assert_eq!(removed, 3);
        assert!(g.inner.records.is_empty());
        assert!(g.inner.blocks.is_empty());
        assert!(g.inner.suspicion.is_empty());
    }

    #[tokio::test]
    async fn sweep_start_is_idempotent() {
        let g = fast_guard();
        g.start_sweep();
        assert!(g.is_sweeping());
        g.start_sweep();
        assert!(g.is_sweeping());
        g.stop_sweep();
        assert!(!g.is_sweeping());
        g.stop_sweep();
    }

    #[tokio::test]
    async fn sweep_task_purges_in_the_background() {
        let g = fast_guard();
        g.block("ip", "test", Duration::from_millis(10));
        g.start_sweep();

        sleep(Duration::from_millis(120)).await;
        assert!(g.inner.blocks.is_empty());
        g.stop_sweep();
    }
}
