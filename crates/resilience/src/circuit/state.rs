//! Circuit breaker state management and execution logic.

use super::config::CircuitBreakerConfig;
use super::metrics::MetricsState;
use super::transitions::StateTransitions;
use super::types::{CircuitBreakerStats, CircuitState};
use questdeck_core::{Error, Result};
use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Circuit breaker implementation.
///
/// While open, every call is rejected with [`Error::CircuitOpen`] without
/// invoking the wrapped operation. Once the reset timeout elapses the
/// breaker goes half-open and exactly one trial call proceeds; concurrent
/// calls arriving during the trial are rejected as if the circuit were
/// still open. The first trial success closes the circuit.
pub struct CircuitBreaker {
    name: String,
    metrics: Arc<MetricsState>,
    transitions: StateTransitions,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given configuration
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let metrics = Arc::new(MetricsState::new());
        let transitions = StateTransitions::new(config, Arc::clone(&metrics));

        Self {
            name: name.into(),
            metrics,
            transitions,
        }
    }

    /// Install a hook invoked once each time the circuit opens
    #[must_use]
    pub fn on_open(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.transitions.on_open = Some(Arc::new(hook));
        self
    }

    /// Install a hook invoked once each time the circuit closes
    #[must_use]
    pub fn on_close(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.transitions.on_close = Some(Arc::new(hook));
        self
    }

    /// Get the current state of the circuit
    pub async fn state(&self) -> CircuitState {
        let state = *self.metrics.state.read().await;

        // Check if we should transition from Open to HalfOpen
        if state == CircuitState::Open && self.transitions.check_half_open_transition().await {
            return CircuitState::HalfOpen;
        }

        state
    }

    /// Execute an operation through the circuit breaker
    pub async fn call<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let current_state = self.state().await;

        match current_state {
            CircuitState::Open => Err(Error::circuit_open(&self.name)),
            CircuitState::HalfOpen => {
                // Single-trial policy: the first caller to flip the flag owns
                // the trial, everyone else is rejected as if still open
                if self
                    .metrics
                    .trial_in_flight
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_err()
                {
                    return Err(Error::circuit_open(&self.name));
                }
                self.execute_with_recording(operation).await
            }
            CircuitState::Closed => self.execute_with_recording(operation).await,
        }
    }

    /// Execute operation and record the result
    async fn execute_with_recording<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let generation = self.metrics.current_generation();
        let result = operation().await;

        match result {
            Ok(_) => {
                self.transitions.record_success(generation).await;
            }
            Err(_) => {
                self.transitions.record_failure(generation).await;
            }
        }

        result
    }

    /// Name used in rejection errors and logs
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current circuit breaker statistics
    pub async fn stats(&self) -> CircuitBreakerStats {
        self.metrics.stats().await
    }
}
