//! Fallback cache for questdeck
//!
//! A time-boxed key/value store used to serve cached or degraded results
//! when the live call to the gamification backend fails. Features:
//! - TTL-based freshness with an explicit staleness flag
//! - Stale-while-revalidate background refresh
//! - Bounded size with FIFO (oldest-inserted) eviction
//! - Fallback precedence: fresh value, configured fallback, last known
//!   value even if expired, then the error itself
//! - Point-in-time snapshot persistence

pub mod entry;
pub mod persist;
pub mod store;

pub use entry::{CacheEntry, CacheStatsSnapshot};
pub use persist::{CacheSnapshot, PersistedEntry};
pub use store::{BatchOptions, BatchRequest, CacheConfig, FallbackCache, FetchOptions, Fetched};
