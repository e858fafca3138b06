//! Configuration for circuit breaker behavior.

use std::time::Duration;

/// Default number of consecutive failures before opening
const DEFAULT_FAILURE_THRESHOLD: usize = 5;

/// Default cooldown before a half-open trial is allowed (30s)
const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: usize,
    /// Duration to wait in the open state before allowing a trial call
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            reset_timeout: DEFAULT_RESET_TIMEOUT,
        }
    }
}
