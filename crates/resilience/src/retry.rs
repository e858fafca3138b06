//! Retry logic with exponential backoff and jitter.

use crate::circuit::CircuitBreaker;
use questdeck_core::{Error, ErrorClassifier, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Default total number of invocations
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay for exponential backoff (1s)
const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(1000);

/// Default maximum delay between attempts (10s)
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

/// Default backoff multiplier
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Jitter stretches the delay by a uniform factor in [1.0, JITTER_CEILING)
const JITTER_CEILING: f64 = 1.3;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of invocations, including the first (>= 1)
    pub max_attempts: u32,
    /// Base delay for exponential backoff
    pub initial_delay: Duration,
    /// Maximum delay between attempts
    pub max_delay: Duration,
    /// Growth factor applied per failed attempt
    pub backoff_multiplier: f64,
    /// Whether to randomize delays to avoid synchronized retry storms
    pub jitter_enabled: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            jitter_enabled: true,
        }
    }
}

impl RetryConfig {
    /// Config for calls to the proxied gamification service
    pub fn for_upstream() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            ..Default::default()
        }
    }

    /// Un-jittered delay after the given failed attempt (1-based):
    /// `min(initial_delay * backoff_multiplier^(attempt-1), max_delay)`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let exponential = self.initial_delay.mul_f64(factor);
        exponential.min(self.max_delay)
    }

    /// Delay after the given failed attempt, jitter applied. The jitter
    /// factor is uniform in [1.0, 1.3): it stretches the wait by up to 30%
    /// and never shortens it.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let base = self.backoff_delay(attempt);
        if self.jitter_enabled {
            let factor = rand::thread_rng().gen_range(1.0..JITTER_CEILING);
            base.mul_f64(factor)
        } else {
            base
        }
    }
}

/// Execute an operation with retry logic.
///
/// The first attempt runs immediately. Each failure is classified and
/// recorded; non-retryable failures and exhausted attempts end the loop with
/// the last error. At most `max_attempts` total invocations.
pub async fn retry<F, Fut, T>(
    config: &RetryConfig,
    classifier: &ErrorClassifier,
    context: &str,
    operation: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    log::info!("{context}: succeeded on attempt {attempt}");
                }
                return Ok(result);
            }
            Err(error) => {
                let classified = classifier.classify_and_record(&error, Some(context));
                if !classified.retryable || attempt == max_attempts {
                    return Err(error);
                }
                let delay = config.delay_after(attempt);
                log::warn!(
                    "{context}: attempt {attempt}/{max_attempts} failed, retrying in {delay:?}: {error}"
                );
                sleep(delay).await;
                last_error = Some(error);
            }
        }
    }

    // This should be unreachable, but just in case
    Err(last_error.unwrap_or_else(|| Error::unknown("retry loop ended unexpectedly")))
}

/// Retry wrapped in circuit breaker protection.
///
/// The breaker is the outermost layer: it records one failure per exhausted
/// retry sequence, not one per attempt, and once open it preempts all
/// attempts entirely.
pub async fn retry_with_circuit_breaker<F, Fut, T>(
    retry_config: &RetryConfig,
    classifier: &ErrorClassifier,
    circuit_breaker: &CircuitBreaker,
    context: &str,
    operation: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    circuit_breaker
        .call(|| retry(retry_config, classifier, context, &operation))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_follows_exponential_formula() {
        let config = RetryConfig {
            max_attempts: 6,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            backoff_multiplier: 2.0,
            jitter_enabled: false,
        };

        // Delay before attempt n equals min(1000 * 2^(n-2), 10000)
        assert_eq!(config.backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(config.backoff_delay(2), Duration::from_millis(2000));
        assert_eq!(config.backoff_delay(3), Duration::from_millis(4000));
        assert_eq!(config.backoff_delay(4), Duration::from_millis(8000));
        assert_eq!(config.backoff_delay(5), Duration::from_millis(10_000));
        assert_eq!(config.backoff_delay(6), Duration::from_millis(10_000));
    }

    #[test]
    fn jitter_never_shortens_the_delay() {
        let config = RetryConfig {
            initial_delay: Duration::from_millis(1000),
            jitter_enabled: true,
            ..Default::default()
        };

        for _ in 0..100 {
            let delay = config.delay_after(1);
            assert!(delay >= Duration::from_millis(1000));
            assert!(delay < Duration::from_millis(1300));
        }
    }

    #[tokio::test]
    async fn retries_until_success() {
        let config = RetryConfig {
            max_attempts: 4,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            backoff_multiplier: 2.0,
            jitter_enabled: false,
        };
        let classifier = ErrorClassifier::new();
        let calls = AtomicU32::new(0);

        let result = retry(&config, &classifier, "flaky", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(Error::network("api", "connection reset"))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Both intermediate failures were recorded
        assert_eq!(classifier.history_len(), 2);
    }

    #[tokio::test]
    async fn non_retryable_errors_fail_immediately() {
        let config = RetryConfig {
            max_attempts: 5,
            initial_delay: Duration::from_millis(10),
            jitter_enabled: false,
            ..Default::default()
        };
        let classifier = ErrorClassifier::new();
        let calls = AtomicU32::new(0);

        let result: Result<()> = retry(&config, &classifier, "login", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::authentication("token expired"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stops_after_max_attempts() {
        let config = RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(10),
            backoff_multiplier: 2.0,
            jitter_enabled: false,
        };
        let classifier = ErrorClassifier::new();
        let calls = AtomicU32::new(0);

        let result: Result<()> = retry(&config, &classifier, "down", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::network("api", "unreachable"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(classifier.history_len(), 3);
    }
}
