// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the multi-level cache.
//!
//! Uses the `metrics` crate for backend-agnostic collection; the host process
//! chooses the exporter (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `multilevel_cache_` prefix for all metrics
//! - `_total` suffix for counters
//!
//! # Labels
//! - `cache`: cache name
//! - `tier`: local, remote
//! - `operation`: lookup, get, put, evict, clear
//! - `status`: hit, miss, success, failure, slow, rejected

use metrics::{counter, gauge};

/// Record a tier lookup outcome.
pub fn record_lookup(cache: &str, tier: &str, status: &str) {
    counter!(
        "multilevel_cache_lookups_total",
        "cache" => cache.to_string(),
        "tier" => tier.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a coordinator operation.
pub fn record_operation(cache: &str, operation: &str) {
    counter!(
        "multilevel_cache_operations_total",
        "cache" => cache.to_string(),
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record the outcome of a breaker-wrapped remote call.
pub fn record_circuit_breaker_call(circuit: &str, status: &str) {
    counter!(
        "multilevel_cache_circuit_breaker_calls_total",
        "circuit" => circuit.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record an invalidation event, by origin (local publish or remote apply).
pub fn record_invalidation(cache: &str, origin: &str) {
    counter!(
        "multilevel_cache_invalidations_total",
        "cache" => cache.to_string(),
        "origin" => origin.to_string()
    )
    .increment(1);
}

/// Set the current local entry count for a cache.
pub fn set_local_entries(cache: &str, count: usize) {
    gauge!(
        "multilevel_cache_local_entries",
        "cache" => cache.to_string()
    )
    .set(count as f64);
}
