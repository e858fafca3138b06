//! Shared state and statistics tracking for circuit breaker.

use super::types::{CircuitBreakerStats, CircuitState};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};

/// Internal state tracking for circuit breaker
#[derive(Debug)]
pub struct MetricsState {
    pub state: RwLock<CircuitState>,
    pub consecutive_failures: AtomicUsize,
    pub opened_at: Mutex<Option<Instant>>,
    pub last_state_change: Mutex<Instant>,
    /// Gate for the single half-open trial call
    pub trial_in_flight: AtomicBool,
    /// Bumped on every transition so stale in-flight calls cannot record
    /// into a later state epoch
    pub generation: AtomicU64,
}

impl MetricsState {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(CircuitState::Closed),
            consecutive_failures: AtomicUsize::new(0),
            opened_at: Mutex::new(None),
            last_state_change: Mutex::new(Instant::now()),
            trial_in_flight: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        }
    }

    /// Get current circuit breaker statistics
    pub async fn stats(&self) -> CircuitBreakerStats {
        CircuitBreakerStats {
            state: *self.state.read().await,
            consecutive_failures: self.consecutive_failures.load(Ordering::SeqCst),
            opened_at: *self.opened_at.lock().await,
            last_state_change: *self.last_state_change.lock().await,
        }
    }

    /// Increment generation counter for state changes
    pub fn increment_generation(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Get current generation
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

impl Default for MetricsState {
    fn default() -> Self {
        Self::new()
    }
}
