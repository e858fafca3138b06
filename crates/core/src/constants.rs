/// Constants used throughout the questdeck codebase
use std::time::Duration;

// Health monitoring defaults
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_PROBE_RETRIES: u32 = 2;
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_millis(30_000);
pub const HEALTH_HISTORY_CAP: usize = 100;

// Error classification
pub const ERROR_HISTORY_CAP: usize = 50;
pub const DEFAULT_ERROR_METRICS_WINDOW: Duration = Duration::from_secs(3600);

// Rate limiting and abuse detection
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);
pub const SHORT_BLOCK: Duration = Duration::from_secs(3600);
pub const LONG_BLOCK: Duration = Duration::from_secs(24 * 3600);
pub const ESCALATION_SHORT_THRESHOLD: u32 = 3;
pub const ESCALATION_LONG_THRESHOLD: u32 = 5;
pub const SUSPICION_WINDOW: Duration = Duration::from_secs(3600);
pub const SUSPICION_THRESHOLD: u64 = 100;
pub const SUSPICION_HARD_VOLUME: u64 = 1000;
pub const SUSPICION_STALE_AFTER: Duration = Duration::from_secs(24 * 3600);
pub const MIN_UA_LENGTH: usize = 10;
pub const RETRY_AFTER_SECS: u64 = 60;
pub const RECOMMENDED_MIN_BLOCK: Duration = Duration::from_secs(60);

// User-agent fragments that mark automated clients
pub const BOT_UA_MARKERS: &[&str] = &["bot", "crawler", "spider", "scraper", "curl", "wget"];
