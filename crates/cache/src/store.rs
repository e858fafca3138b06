//! The fallback cache store.
//!
//! Eviction is FIFO: when the store grows past `max_size`, the entry with
//! the smallest `written_at` is removed. This is oldest-*inserted* order,
//! not least-recently-used — reads never reorder anything.

use crate::entry::{CacheEntry, CacheStats, CacheStatsSnapshot};
use futures::future::{join_all, BoxFuture};
use parking_lot::RwLock;
use questdeck_core::{CacheEvent, ErrorClassifier, EventBus, Result, SystemEvent};
use questdeck_resilience::{retry, RetryConfig};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default number of entries kept before FIFO eviction kicks in
const DEFAULT_MAX_SIZE: usize = 100;

/// Cache sizing configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries before the oldest-inserted is evicted
    pub max_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
        }
    }
}

/// Per-request options for [`FallbackCache::get_with_fallback`]
pub struct FetchOptions<T> {
    /// Key the result is cached under
    pub cache_key: String,
    /// TTL for a newly written entry
    pub cache_duration: Duration,
    /// Served (flagged stale) when the live operation fails
    pub fallback: Option<T>,
    /// Serve a stale entry immediately and refresh in the background
    pub stale_while_revalidate: bool,
    /// Run the live operation through the retry executor
    pub retry: Option<RetryConfig>,
}

impl<T> FetchOptions<T> {
    pub fn new(cache_key: impl Into<String>, cache_duration: Duration) -> Self {
        Self {
            cache_key: cache_key.into(),
            cache_duration,
            fallback: None,
            stale_while_revalidate: false,
            retry: None,
        }
    }

    #[must_use]
    pub fn fallback(mut self, value: T) -> Self {
        self.fallback = Some(value);
        self
    }

    #[must_use]
    pub fn stale_while_revalidate(mut self) -> Self {
        self.stale_while_revalidate = true;
        self
    }

    #[must_use]
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = Some(config);
        self
    }
}

/// A cache read result with its staleness flag. `stale` is true whenever
/// the value did not come from a fresh entry or a successful live call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched<T> {
    pub value: T,
    pub stale: bool,
}

/// One request of a batch lookup
pub struct BatchRequest<T> {
    pub cache_key: String,
    pub operation: Box<dyn Fn() -> BoxFuture<'static, Result<T>> + Send + Sync + 'static>,
    pub fallback: Option<T>,
}

/// Options shared by every request of a batch lookup
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub cache_duration: Duration,
    pub stale_while_revalidate: bool,
    pub retry: Option<RetryConfig>,
}

impl BatchOptions {
    pub fn new(cache_duration: Duration) -> Self {
        Self {
            cache_duration,
            stale_while_revalidate: false,
            retry: None,
        }
    }
}

struct CacheInner<T> {
    entries: RwLock<HashMap<String, CacheEntry<T>>>,
    max_size: usize,
    stats: CacheStats,
    classifier: Arc<ErrorClassifier>,
    events: EventBus,
}

/// Staleness-aware fallback cache. Cloning is cheap; all clones share the
/// same store.
pub struct FallbackCache<T> {
    inner: Arc<CacheInner<T>>,
}

impl<T> Clone for FallbackCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> FallbackCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(config: CacheConfig, classifier: Arc<ErrorClassifier>, events: EventBus) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: RwLock::new(HashMap::new()),
                max_size: config.max_size.max(1),
                stats: CacheStats::default(),
                classifier,
                events,
            }),
        }
    }

    /// Resolve a value through the cache.
    ///
    /// Fresh entry: returned immediately, the operation is not invoked.
    /// Stale entry with stale-while-revalidate: returned immediately while
    /// the operation refreshes the entry in the background (refresh
    /// failures are logged and swallowed). Otherwise the operation runs
    /// (through the retry executor when configured); on failure the
    /// configured fallback is served, then the last known value even if
    /// expired, and only when neither exists does the failure propagate.
    pub async fn get_with_fallback<F, Fut>(
        &self,
        operation: F,
        options: FetchOptions<T>,
    ) -> Result<Fetched<T>>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let key = options.cache_key.clone();
        let existing = self.inner.entries.read().get(&key).cloned();

        if let Some(entry) = &existing {
            if !entry.is_expired() {
                self.inner.stats.hits.fetch_add(1, Ordering::Relaxed);
                self.publish(CacheEvent::Hit { key });
                return Ok(Fetched {
                    value: entry.value.clone(),
                    stale: false,
                });
            }

            if options.stale_while_revalidate {
                self.inner.stats.stale_served.fetch_add(1, Ordering::Relaxed);
                self.publish(CacheEvent::StaleServed { key: key.clone() });
                self.spawn_refresh(key, options.cache_duration, operation);
                return Ok(Fetched {
                    value: entry.value.clone(),
                    stale: true,
                });
            }
        }

        self.inner.stats.misses.fetch_add(1, Ordering::Relaxed);
        self.publish(CacheEvent::Miss { key: key.clone() });

        let context = format!("cache:{key}");
        let result = match &options.retry {
            Some(config) => retry(config, &self.inner.classifier, &context, &operation).await,
            None => operation().await,
        };

        match result {
            Ok(value) => {
                self.insert(&key, value.clone(), options.cache_duration);
                Ok(Fetched {
                    value,
                    stale: false,
                })
            }
            Err(error) => {
                // The retry executor already recorded each attempt
                if options.retry.is_none() {
                    self.inner
                        .classifier
                        .classify_and_record(&error, Some(&context));
                }

                if let Some(fallback) = options.fallback {
                    warn!(key = %key, %error, "live call failed, serving configured fallback");
                    self.inner.stats.stale_served.fetch_add(1, Ordering::Relaxed);
                    self.publish(CacheEvent::StaleServed { key });
                    return Ok(Fetched {
                        value: fallback,
                        stale: true,
                    });
                }

                // Emergency fallback: any previously cached value, even expired
                let last_known = self.inner.entries.read().get(&key).cloned();
                if let Some(entry) = last_known {
                    warn!(key = %key, %error, "live call failed, serving expired entry");
                    self.inner.stats.stale_served.fetch_add(1, Ordering::Relaxed);
                    self.publish(CacheEvent::StaleServed { key });
                    return Ok(Fetched {
                        value: entry.value,
                        stale: true,
                    });
                }

                Err(error)
            }
        }
    }

    /// Resolve a set of requests concurrently, each independently following
    /// the same fresh/stale/fallback rules.
    pub async fn get_many(
        &self,
        requests: Vec<BatchRequest<T>>,
        options: &BatchOptions,
    ) -> Vec<Result<Fetched<T>>> {
        let lookups = requests.into_iter().map(|request| {
            let mut fetch = FetchOptions::new(request.cache_key, options.cache_duration);
            fetch.fallback = request.fallback;
            fetch.stale_while_revalidate = options.stale_while_revalidate;
            fetch.retry = options.retry.clone();
            self.get_with_fallback(request.operation, fetch)
        });
        join_all(lookups).await
    }

    /// Write a value directly, evicting the oldest-inserted entries while
    /// over capacity.
    pub fn insert(&self, key: &str, value: T, ttl: Duration) {
        self.store_entry(key, CacheEntry::new(value, ttl));
        self.publish(CacheEvent::Write {
            key: key.to_string(),
        });
    }

    fn store_entry(&self, key: &str, entry: CacheEntry<T>) {
        let mut evicted = Vec::new();
        {
            // Evict-then-insert is a single critical section
            let mut entries = self.inner.entries.write();
            entries.insert(key.to_string(), entry);
            while entries.len() > self.inner.max_size {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, e)| e.written_at)
                    .map(|(k, _)| k.clone());
                match oldest {
                    Some(k) => {
                        entries.remove(&k);
                        evicted.push(k);
                    }
                    None => break,
                }
            }
        }
        for key in evicted {
            self.inner.stats.evictions.fetch_add(1, Ordering::Relaxed);
            self.publish(CacheEvent::Evicted { key });
        }
    }

    fn spawn_refresh<F, Fut>(&self, key: String, ttl: Duration, operation: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let cache = self.clone();
        tokio::spawn(async move {
            match operation().await {
                Ok(value) => {
                    debug!(key = %key, "background revalidation succeeded");
                    cache.store_entry(&key, CacheEntry::new(value, ttl));
                    cache.publish(CacheEvent::Write { key });
                }
                Err(error) => {
                    // Never surfaces to the original caller
                    warn!(key = %key, %error, "background revalidation failed");
                    cache
                        .inner
                        .classifier
                        .classify_and_record(&error, Some(&format!("cache-refresh:{key}")));
                    cache.publish(CacheEvent::RefreshFailed {
                        key,
                        error: error.to_string(),
                    });
                }
            }
        });
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.inner.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        before - entries.len()
    }

    /// Remove a single entry
    pub fn invalidate(&self, key: &str) -> bool {
        self.inner.entries.write().remove(key).is_some()
    }

    /// Remove everything
    pub fn clear(&self) {
        self.inner.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.read().is_empty()
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.inner.stats.snapshot()
    }

    pub(crate) fn entries_snapshot(&self) -> Vec<(String, CacheEntry<T>)> {
        self.inner
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub(crate) fn restore_entry(&self, key: &str, entry: CacheEntry<T>) {
        self.store_entry(key, entry);
    }

    fn publish(&self, event: CacheEvent) {
        self.inner.events.publish(SystemEvent::Cache(event));
    }
}
