//! Configuration for the multi-level cache.
//!
//! # Example
//!
//! ```
//! use multilevel_cache::MultiLevelCacheConfig;
//!
//! // Minimal config (uses defaults)
//! let config = MultiLevelCacheConfig::default();
//! assert_eq!(config.time_to_live_secs, 3600);
//! assert_eq!(config.local.max_size, 2000);
//!
//! // Full config
//! let config = MultiLevelCacheConfig {
//!     time_to_live_secs: 600,
//!     topic: "orders:invalidation".into(),
//!     cache_names: vec!["orders".into(), "customers".into()],
//!     ..Default::default()
//! };
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::expiry::ExpirationMode;

/// Top-level cache configuration.
///
/// Loaded once at process start and immutable afterwards. Validation happens
/// when the [`CacheManager`](crate::CacheManager) is constructed.
#[derive(Debug, Clone, Deserialize)]
pub struct MultiLevelCacheConfig {
    /// Time to live for remote store entries, in seconds.
    #[serde(default = "default_time_to_live_secs")]
    pub time_to_live_secs: u64,

    /// Optional key prefix applied by the remote store.
    #[serde(default)]
    pub key_prefix: Option<String>,

    /// Whether to apply `key_prefix` when writing to the remote store.
    #[serde(default)]
    pub use_key_prefix: bool,

    /// Pub/sub topic used to synchronize eviction of entries across processes.
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Allow-list of cache names. Empty means any name may be created on
    /// demand; non-empty restricts the registry to exactly these names.
    #[serde(default)]
    pub cache_names: Vec<String>,

    #[serde(default)]
    pub local: LocalCacheConfig,

    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
}

fn default_time_to_live_secs() -> u64 {
    3600
}
fn default_topic() -> String {
    "cache:multilevel:topic".to_string()
}

impl Default for MultiLevelCacheConfig {
    fn default() -> Self {
        Self {
            time_to_live_secs: default_time_to_live_secs(),
            key_prefix: None,
            use_key_prefix: false,
            topic: default_topic(),
            cache_names: Vec::new(),
            local: LocalCacheConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl MultiLevelCacheConfig {
    /// Remote entry TTL as a [`Duration`].
    #[must_use]
    pub fn time_to_live(&self) -> Duration {
        Duration::from_secs(self.time_to_live_secs)
    }

    /// Key prefix the remote store should use, if enabled.
    #[must_use]
    pub fn effective_key_prefix(&self) -> Option<&str> {
        if self.use_key_prefix {
            self.key_prefix.as_deref()
        } else {
            None
        }
    }
}

/// Settings for the process-local store.
#[derive(Debug, Clone, Deserialize)]
pub struct LocalCacheConfig {
    /// Maximum number of entries to keep locally.
    #[serde(default = "default_local_max_size")]
    pub max_size: usize,

    /// Percentage of time deviation for local entry expiration (0..100).
    #[serde(default = "default_expiry_jitter")]
    pub expiry_jitter: u32,

    /// Optional local TTL override, in seconds. When unset the remote TTL
    /// feeds the jittered expiry computation.
    #[serde(default)]
    pub time_to_live_secs: Option<u64>,

    /// When the jittered deadline is (re)computed for an entry.
    #[serde(default)]
    pub expiration_mode: ExpirationMode,
}

fn default_local_max_size() -> usize {
    2000
}
fn default_expiry_jitter() -> u32 {
    50
}

impl Default for LocalCacheConfig {
    fn default() -> Self {
        Self {
            max_size: default_local_max_size(),
            expiry_jitter: default_expiry_jitter(),
            time_to_live_secs: None,
            expiration_mode: ExpirationMode::default(),
        }
    }
}

impl LocalCacheConfig {
    #[must_use]
    pub fn time_to_live(&self) -> Option<Duration> {
        self.time_to_live_secs.map(Duration::from_secs)
    }
}

/// Circuit breaker tunables for remote store access.
///
/// The breaker records call outcomes, it does not time calls out: a call that
/// exceeds `slow_call_duration_ms` still completes, but counts against the
/// sliding window. The remaining breaker parameters are derived from the slow
/// call duration:
///
/// - permitted trial calls while half-open: 5s worth of slow calls
/// - sliding window size: twice the trial call count
/// - minimum calls before rates are evaluated: half the trial call count
/// - open-state wait: one slow call duration per minimum call
#[derive(Debug, Clone, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Percentage of call failures that prohibits further remote calls.
    #[serde(default = "default_rate_threshold")]
    pub failure_rate_threshold: u32,

    /// Percentage of slow calls that prohibits further remote calls.
    #[serde(default = "default_rate_threshold")]
    pub slow_call_rate_threshold: u32,

    /// Duration after which a remote call is considered slow, in milliseconds.
    #[serde(default = "default_slow_call_duration_ms")]
    pub slow_call_duration_ms: u64,
}

fn default_rate_threshold() -> u32 {
    25
}
fn default_slow_call_duration_ms() -> u64 {
    250
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: default_rate_threshold(),
            slow_call_rate_threshold: default_rate_threshold(),
            slow_call_duration_ms: default_slow_call_duration_ms(),
        }
    }
}

impl CircuitBreakerConfig {
    #[must_use]
    pub fn slow_call_duration(&self) -> Duration {
        Duration::from_millis(self.slow_call_duration_ms)
    }

    /// Remote calls permitted to probe the backend while half-open.
    #[must_use]
    pub fn half_open_permits(&self) -> usize {
        let permits =
            Duration::from_secs(5).as_millis() / u128::from(self.slow_call_duration_ms.max(1));
        (permits as usize).max(1)
    }

    /// Sliding window size, in calls.
    #[must_use]
    pub fn sliding_window_size(&self) -> usize {
        self.half_open_permits() * 2
    }

    /// Minimum observed calls before failure/slow rates are evaluated.
    #[must_use]
    pub fn min_calls(&self) -> usize {
        (self.half_open_permits() / 2).max(1)
    }

    /// Time to wait in the open state before permitting trial calls.
    #[must_use]
    pub fn open_wait(&self) -> Duration {
        self.slow_call_duration() * self.min_calls() as u32
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slow_call_duration_ms == 0 {
            return Err(ConfigError::ZeroSlowCallDuration);
        }
        for (name, value) in [
            ("failure rate threshold", self.failure_rate_threshold),
            ("slow call rate threshold", self.slow_call_rate_threshold),
        ] {
            if value == 0 || value > 100 {
                return Err(ConfigError::RateOutOfRange { name, value });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = MultiLevelCacheConfig::default();

        assert_eq!(config.time_to_live(), Duration::from_secs(3600));
        assert_eq!(config.topic, "cache:multilevel:topic");
        assert!(config.cache_names.is_empty());
        assert_eq!(config.local.max_size, 2000);
        assert_eq!(config.local.expiry_jitter, 50);
        assert_eq!(config.local.time_to_live(), None);
        assert_eq!(config.circuit_breaker.failure_rate_threshold, 25);
    }

    #[test]
    fn test_derived_breaker_parameters() {
        let breaker = CircuitBreakerConfig::default();

        // 250ms slow calls: 20 trial calls in 5s, window of 40, 10 min calls.
        assert_eq!(breaker.half_open_permits(), 20);
        assert_eq!(breaker.sliding_window_size(), 40);
        assert_eq!(breaker.min_calls(), 10);
        assert_eq!(breaker.open_wait(), Duration::from_millis(2500));
    }

    #[test]
    fn test_breaker_validation_rejects_bad_rates() {
        let mut breaker = CircuitBreakerConfig::default();
        assert!(breaker.validate().is_ok());

        breaker.failure_rate_threshold = 0;
        assert!(breaker.validate().is_err());

        breaker.failure_rate_threshold = 101;
        assert!(breaker.validate().is_err());

        breaker = CircuitBreakerConfig {
            slow_call_duration_ms: 0,
            ..Default::default()
        };
        assert!(breaker.validate().is_err());
    }

    #[test]
    fn test_key_prefix_only_applies_when_enabled() {
        let mut config = MultiLevelCacheConfig {
            key_prefix: Some("app:".into()),
            ..Default::default()
        };
        assert_eq!(config.effective_key_prefix(), None);

        config.use_key_prefix = true;
        assert_eq!(config.effective_key_prefix(), Some("app:"));
    }

    #[test]
    fn test_deserializes_with_partial_fields() {
        let config: MultiLevelCacheConfig =
            serde_json::from_str(r#"{"time_to_live_secs": 120, "local": {"expiry_jitter": 10}}"#)
                .unwrap();

        assert_eq!(config.time_to_live(), Duration::from_secs(120));
        assert_eq!(config.local.expiry_jitter, 10);
        assert_eq!(config.local.max_size, 2000);
    }
}
