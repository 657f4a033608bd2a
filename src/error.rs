use thiserror::Error;

use crate::bus::BusError;

/// Boxed error type accepted from caller-supplied loaders.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Construction-time configuration failures. These fail fast and prevent
/// the manager (and therefore any coordinator) from being built.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("time to live duration must not be zero")]
    ZeroTimeToLive,

    #[error("local time to live override must not be zero")]
    ZeroLocalTimeToLive,

    #[error("expiry jitter must be below 100 percent, got {0}")]
    JitterOutOfRange(u32),

    #[error("slow call duration must not be zero")]
    ZeroSlowCallDuration,

    #[error("{name} must be within 1..=100 percent, got {value}")]
    RateOutOfRange { name: &'static str, value: u32 },
}

/// Errors surfaced to cache callers.
///
/// Infrastructure failures (remote store down, slow, erroring) never show up
/// here - they are absorbed by the circuit breaker and degrade to local-only
/// behavior. What remains is caller-supplied computation failure and
/// construction-time problems.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The loader passed to `get` failed or produced no value.
    #[error("failed to load value for key '{key}'")]
    Retrieval {
        key: String,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The invalidation bus subscription could not be established at startup.
    #[error("invalidation bus error")]
    Bus(#[from] BusError),
}

impl CacheError {
    pub(crate) fn retrieval(key: &str, source: BoxError) -> Self {
        Self::Retrieval {
            key: key.to_string(),
            source,
        }
    }
}
