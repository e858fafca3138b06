//! State transition logic for circuit breaker.

use super::config::CircuitBreakerConfig;
use super::metrics::MetricsState;
use super::types::{CircuitState, TransitionHook};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

/// Handles state transitions for circuit breaker
pub struct StateTransitions {
    config: CircuitBreakerConfig,
    metrics: Arc<MetricsState>,
    pub(super) on_open: Option<TransitionHook>,
    pub(super) on_close: Option<TransitionHook>,
}

impl StateTransitions {
    /// Create new state transitions handler
    pub fn new(config: CircuitBreakerConfig, metrics: Arc<MetricsState>) -> Self {
        Self {
            config,
            metrics,
            on_open: None,
            on_close: None,
        }
    }

    /// Transition to open state and restart the cooldown
    pub async fn transition_to_open(&self) {
        let mut state = self.metrics.state.write().await;
        if *state != CircuitState::Open {
            log::warn!("Circuit breaker opening");
            *state = CircuitState::Open;
            *self.metrics.opened_at.lock().await = Some(Instant::now());
            *self.metrics.last_state_change.lock().await = Instant::now();
            self.metrics.trial_in_flight.store(false, Ordering::SeqCst);
            self.metrics.increment_generation();
            if let Some(hook) = &self.on_open {
                hook();
            }
        }
    }

    /// Transition to half-open state, arming a single trial call
    pub async fn transition_to_half_open(&self) {
        let mut state = self.metrics.state.write().await;
        if *state == CircuitState::Open {
            log::info!("Circuit breaker entering half-open state");
            *state = CircuitState::HalfOpen;
            *self.metrics.last_state_change.lock().await = Instant::now();
            self.metrics.trial_in_flight.store(false, Ordering::SeqCst);
            self.metrics.increment_generation();
        }
    }

    /// Transition to closed state
    pub async fn transition_to_closed(&self) {
        let mut state = self.metrics.state.write().await;
        if *state != CircuitState::Closed {
            log::info!("Circuit breaker closing");
            *state = CircuitState::Closed;
            self.metrics.consecutive_failures.store(0, Ordering::SeqCst);
            *self.metrics.opened_at.lock().await = None;
            *self.metrics.last_state_change.lock().await = Instant::now();
            self.metrics.trial_in_flight.store(false, Ordering::SeqCst);
            self.metrics.increment_generation();
            if let Some(hook) = &self.on_close {
                hook();
            }
        }
    }

    /// Record a successful call and handle state transitions
    pub async fn record_success(&self, generation: u64) {
        // Only record if we're still in the same generation
        if generation != self.metrics.current_generation() {
            return;
        }

        let state = *self.metrics.state.read().await;

        match state {
            CircuitState::HalfOpen => {
                // The first successful trial closes the circuit
                self.transition_to_closed().await;
            }
            CircuitState::Closed => {
                self.metrics.consecutive_failures.store(0, Ordering::SeqCst);
            }
            CircuitState::Open => {} // Shouldn't happen
        }
    }

    /// Record a failed call and handle state transitions
    pub async fn record_failure(&self, generation: u64) {
        // Only record if we're still in the same generation
        if generation != self.metrics.current_generation() {
            return;
        }

        let state = *self.metrics.state.read().await;

        match state {
            CircuitState::Closed => {
                let count = self
                    .metrics
                    .consecutive_failures
                    .fetch_add(1, Ordering::SeqCst)
                    + 1;
                if count >= self.config.failure_threshold {
                    self.transition_to_open().await;
                }
            }
            CircuitState::HalfOpen => {
                // The failed trial reopens the circuit and restarts the cooldown
                self.transition_to_open().await;
            }
            CircuitState::Open => {} // Already open
        }
    }

    /// Check if we should transition from Open to HalfOpen based on the
    /// reset timeout
    pub async fn check_half_open_transition(&self) -> bool {
        let state = *self.metrics.state.read().await;
        if state == CircuitState::Open {
            let opened_at = *self.metrics.opened_at.lock().await;
            if let Some(opened_at) = opened_at {
                if opened_at.elapsed() >= self.config.reset_timeout {
                    self.transition_to_half_open().await;
                    return true;
                }
            }
        }
        false
    }
}
