//! Cache entry management and in-memory statistics

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

/// In-memory cache entry. Read-only once written; replaced wholesale on
/// overwrite.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// Cached value
    pub value: T,
    /// Write timestamp; also the FIFO eviction key
    pub written_at: SystemTime,
    /// TTL for this entry
    pub ttl: Duration,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            written_at: SystemTime::now(),
            ttl,
        }
    }

    pub fn with_written_at(value: T, ttl: Duration, written_at: SystemTime) -> Self {
        Self {
            value,
            written_at,
            ttl,
        }
    }

    /// An entry is expired strictly after its ttl has elapsed; at exactly
    /// the ttl boundary it is still fresh.
    pub fn is_expired(&self) -> bool {
        match self.written_at.elapsed() {
            Ok(elapsed) => elapsed > self.ttl,
            Err(_) => true, // Clock moved backwards, consider expired
        }
    }
}

/// Cache operation counters
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
    pub stale_served: AtomicU64,
}

impl CacheStats {
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            stale_served: self.stale_served.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub stale_served: u64,
}

impl CacheStatsSnapshot {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
