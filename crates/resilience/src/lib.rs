//! Resilience patterns for outbound calls to the gamification backend
//!
//! This crate provides the machinery that lets calls to an unreliable remote
//! service survive transient failure: a retry executor with exponential
//! backoff and jitter, and a circuit breaker that stops calling a
//! persistently failing dependency.
//!
//! ## Architecture
//!
//! - [`retry`] - Retry logic driven by error classification
//! - [`circuit`] - Three-state circuit breaker (closed/open/half-open)
//! - [`instrument`] - Explicit duration logging for wrapped operations
//!
//! ## Examples
//!
//! ### Basic Retry
//!
//! ```rust,no_run
//! use questdeck_resilience::{retry, RetryConfig};
//! use questdeck_core::ErrorClassifier;
//!
//! # async fn example() -> Result<String, questdeck_core::Error> {
//! let config = RetryConfig::default();
//! let classifier = ErrorClassifier::new();
//! let result = retry(&config, &classifier, "fetch_points", || async {
//!     // Your operation here
//!     Ok("success".to_string())
//! }).await;
//! result
//! # }
//! ```
//!
//! ### Circuit Breaker
//!
//! ```rust,no_run
//! use questdeck_resilience::{CircuitBreaker, CircuitBreakerConfig};
//!
//! # async fn example() -> Result<String, questdeck_core::Error> {
//! let cb = CircuitBreaker::new("points-api", CircuitBreakerConfig::default());
//!
//! let result = cb.call(|| async {
//!     // Your operation here
//!     Ok("success".to_string())
//! }).await;
//! result
//! # }
//! ```

pub mod circuit;
pub mod instrument;
pub mod retry;

// Re-export public API
pub use circuit::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
pub use instrument::timed;
pub use retry::{retry, retry_with_circuit_breaker, RetryConfig};
