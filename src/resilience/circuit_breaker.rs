// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Circuit breaker pattern using the recloser crate.
//!
//! Every remote store (and bus publish) call goes through one breaker per
//! cache instance. The breaker keeps a sliding window of recent outcomes and
//! stops attempting calls once the failure rate trips the threshold,
//! converting a failing remote into an immediate, cheap rejection.
//!
//! States:
//! - Closed: normal operation, outcomes recorded
//! - Open: calls short-circuit immediately without attempting I/O
//! - HalfOpen: after the open wait, a limited number of trial calls probe
//!   recovery; success closes the breaker, failure reopens it
//!
//! Slow calls: the breaker does not cancel anything. A call that completes
//! successfully but exceeds the configured slow-call duration is returned to
//! the caller as a success and recorded in the window as a failure, so a
//! degraded remote trips the breaker the same way a broken one does.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use recloser::{AsyncRecloser, Error as RecloserError, Recloser};
use tracing::{debug, warn};

use crate::config::CircuitBreakerConfig;
use crate::error::ConfigError;

/// Error type for breaker-protected operations.
#[derive(Debug, thiserror::Error)]
pub enum CircuitError<E> {
    /// The breaker is open and rejected the call without attempting it.
    #[error("circuit breaker open, call rejected")]
    Rejected,

    /// The underlying operation failed.
    #[error("operation failed: {0}")]
    Inner(#[source] E),
}

/// Internal window record: lets a slow success count as a failure while the
/// caller still receives the value.
enum Recorded<T, E> {
    Slow(T),
    Failed(E),
}

/// A named circuit breaker with outcome counters.
pub struct CircuitBreaker {
    name: String,
    inner: AsyncRecloser,
    slow_call_duration: Duration,

    calls_total: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    slow_calls: AtomicU64,
    rejections: AtomicU64,
}

impl CircuitBreaker {
    /// Build a breaker from validated configuration.
    ///
    /// recloser keeps a single outcome window, so the failure and slow-call
    /// rate thresholds are folded together: the stricter of the two governs
    /// tripping, and slow calls are recorded as failures.
    pub fn new(name: impl Into<String>, config: &CircuitBreakerConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let threshold = config
            .failure_rate_threshold
            .min(config.slow_call_rate_threshold);
        let recloser = Recloser::custom()
            .error_rate(threshold as f32 / 100.0)
            .closed_len(config.sliding_window_size())
            .half_open_len(config.half_open_permits())
            .open_wait(config.open_wait())
            .build();

        Ok(Self {
            name: name.into(),
            inner: recloser.into(),
            slow_call_duration: config.slow_call_duration(),
            calls_total: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            slow_calls: AtomicU64::new(0),
            rejections: AtomicU64::new(0),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute an async operation through the breaker.
    ///
    /// Takes a closure so an open breaker rejects without constructing (or
    /// consuming) the future.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.calls_total.fetch_add(1, Ordering::Relaxed);
        let slow_after = self.slow_call_duration;

        let outcome = self
            .inner
            .call(async move {
                let started = Instant::now();
                match f().await {
                    Ok(value) if started.elapsed() >= slow_after => Err(Recorded::Slow(value)),
                    Ok(value) => Ok(value),
                    Err(e) => Err(Recorded::Failed(e)),
                }
            })
            .await;

        match outcome {
            Ok(value) => {
                self.successes.fetch_add(1, Ordering::Relaxed);
                crate::metrics::record_circuit_breaker_call(&self.name, "success");
                Ok(value)
            }
            Err(RecloserError::Inner(Recorded::Slow(value))) => {
                self.successes.fetch_add(1, Ordering::Relaxed);
                self.slow_calls.fetch_add(1, Ordering::Relaxed);
                debug!(circuit = %self.name, threshold = ?slow_after, "slow remote call recorded");
                crate::metrics::record_circuit_breaker_call(&self.name, "slow");
                Ok(value)
            }
            Err(RecloserError::Inner(Recorded::Failed(e))) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                debug!(circuit = %self.name, "remote call failed");
                crate::metrics::record_circuit_breaker_call(&self.name, "failure");
                Err(CircuitError::Inner(e))
            }
            Err(RecloserError::Rejected) => {
                self.rejections.fetch_add(1, Ordering::Relaxed);
                warn!(circuit = %self.name, "circuit breaker rejected call (open)");
                crate::metrics::record_circuit_breaker_call(&self.name, "rejected");
                Err(CircuitError::Rejected)
            }
        }
    }

    #[must_use]
    pub fn calls_total(&self) -> u64 {
        self.calls_total.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Calls that completed successfully but exceeded the slow-call duration.
    #[must_use]
    pub fn slow_calls(&self) -> u64 {
        self.slow_calls.load(Ordering::Relaxed)
    }

    /// Calls rejected without being attempted (breaker open).
    #[must_use]
    pub fn rejections(&self) -> u64 {
        self.rejections.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_rate_threshold: 25,
            slow_call_rate_threshold: 25,
            slow_call_duration_ms: 50,
        }
    }

    #[tokio::test]
    async fn test_passes_successful_calls() {
        let breaker = CircuitBreaker::new("test", &test_config()).unwrap();

        let result: Result<i32, CircuitError<&str>> = breaker.call(|| async { Ok(42) }).await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(breaker.successes(), 1);
        assert_eq!(breaker.failures(), 0);
    }

    #[tokio::test]
    async fn test_tracks_failures() {
        let breaker = CircuitBreaker::new("test", &test_config()).unwrap();

        let result: Result<i32, CircuitError<&str>> = breaker.call(|| async { Err("boom") }).await;

        assert!(matches!(result, Err(CircuitError::Inner("boom"))));
        assert_eq!(breaker.failures(), 1);
    }

    #[tokio::test]
    async fn test_slow_success_returns_value_but_counts_slow() {
        let breaker = CircuitBreaker::new("test", &test_config()).unwrap();

        let result: Result<i32, CircuitError<&str>> = breaker
            .call(|| async {
                tokio::time::sleep(Duration::from_millis(60)).await;
                Ok(7)
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(breaker.slow_calls(), 1);
        assert_eq!(breaker.successes(), 1);
    }

    #[tokio::test]
    async fn test_opens_after_failure_rate_exceeded() {
        let config = CircuitBreakerConfig {
            failure_rate_threshold: 25,
            slow_call_rate_threshold: 25,
            // 2.5s worth: permits=2, window=4, min calls=1
            slow_call_duration_ms: 2500,
        };
        let breaker = CircuitBreaker::new("test", &config).unwrap();

        // Fill the window with failures.
        for _ in 0..8 {
            let _: Result<i32, CircuitError<&str>> = breaker.call(|| async { Err("down") }).await;
        }

        // Breaker is now open: calls are rejected without running.
        let mut attempted = false;
        let result: Result<i32, CircuitError<&str>> = breaker
            .call(|| {
                attempted = true;
                async { Ok(1) }
            })
            .await;

        assert!(matches!(result, Err(CircuitError::Rejected)));
        assert!(!attempted, "open breaker must not invoke the operation");
        assert!(breaker.rejections() >= 1);
    }

    #[tokio::test]
    async fn test_counters_accumulate() {
        let breaker = CircuitBreaker::new("test", &test_config()).unwrap();

        for i in 0..4 {
            let _: Result<i32, CircuitError<&str>> = breaker.call(|| async move { Ok(i) }).await;
        }

        assert_eq!(breaker.calls_total(), 4);
        assert_eq!(breaker.successes(), 4);
        assert_eq!(breaker.failures(), 0);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = CircuitBreakerConfig {
            failure_rate_threshold: 0,
            ..CircuitBreakerConfig::default()
        };
        assert!(CircuitBreaker::new("test", &config).is_err());
    }
}
