// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Randomized expiry policy for local entries.
//!
//! Entries created together would otherwise expire together and stampede the
//! remote store on refill. Each deadline is therefore computed independently:
//! centred at half the configured TTL and spread by up to the configured
//! jitter percentage of that midpoint.

use std::time::Duration;

use rand::Rng;
use serde::Deserialize;
use tracing::trace;

use crate::error::ConfigError;

/// When a local entry's jittered deadline is computed.
///
/// All modes compute a fresh deadline when an entry is first created; they
/// differ in what later writes and reads do to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpirationMode {
    /// Deadline fixed at creation. Overwrites keep the remaining time,
    /// reads never extend.
    #[default]
    AfterCreate,
    /// Every write recomputes the deadline, reads never extend.
    AfterUpdate,
    /// Writes recompute and reads also recompute the deadline.
    AfterRead,
}

/// Computes per-entry time-to-live values with random jitter.
///
/// For configured TTL `T` and jitter percentage `J`, each computed TTL is
/// `T * floor(100 * r) / 200` with `r = 1 ± (J/100)·U`, `U` uniform in
/// `[0, 1)` and the sign chosen uniformly. Results fall within
/// `[T/2·(1-J/100), T/2·(1+J/100)]`.
#[derive(Debug)]
pub struct JitteredExpiry {
    time_to_live: Duration,
    jitter_percent: u32,
}

impl JitteredExpiry {
    /// Build a policy from the configured remote TTL, jitter percentage and
    /// optional local TTL override.
    ///
    /// Fails if the effective TTL is zero or the jitter is not below 100%.
    pub fn new(
        time_to_live: Duration,
        jitter_percent: u32,
        local_override: Option<Duration>,
    ) -> Result<Self, ConfigError> {
        if time_to_live.is_zero() {
            return Err(ConfigError::ZeroTimeToLive);
        }
        if let Some(local) = local_override {
            if local.is_zero() {
                return Err(ConfigError::ZeroLocalTimeToLive);
            }
        }
        if jitter_percent >= 100 {
            return Err(ConfigError::JitterOutOfRange(jitter_percent));
        }

        Ok(Self {
            time_to_live: local_override.unwrap_or(time_to_live),
            jitter_percent,
        })
    }

    /// Compute a fresh randomized TTL.
    #[must_use]
    pub fn compute_ttl(&self) -> Duration {
        let mut rng = rand::thread_rng();
        let sign: f64 = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        let jitter = 1.0 + sign * (f64::from(self.jitter_percent) / 100.0) * rng.gen::<f64>();

        // Integer truncation before the division mirrors the midpoint math:
        // floor(100 * r) / 200 lands in [(100-J)/200, (100+J)/200].
        let expiry = self.time_to_live.mul_f64((100.0 * jitter).floor() / 200.0);
        trace!(ttl = ?expiry, "computed jittered expiry");
        expiry
    }

    /// The TTL the jitter is applied to (local override if configured).
    #[must_use]
    pub fn base_time_to_live(&self) -> Duration {
        self.time_to_live
    }
}
