//! Telemetry metric name constants.
//!
//! Centralised metric names for huginn operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `huginn_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `cache`: which cache: "metadata" or "bytes"
//! - `tier`: where a byte cache hit was served from: "memory" or "disk"
//! - `kind`: fetch kind: "metadata" or "bytes"
//! - `status`: outcome: "ok" or "error"

/// Total cache hits.
///
/// Labels: `cache`, `tier`.
pub const CACHE_HITS_TOTAL: &str = "huginn_cache_hits_total";

/// Total cache misses.
///
/// Labels: `cache`.
pub const CACHE_MISSES_TOTAL: &str = "huginn_cache_misses_total";

/// Total calls to an external fetcher.
///
/// Labels: `kind`, `status`.
pub const FETCHES_TOTAL: &str = "huginn_fetches_total";

/// Total resolution attempts, including the first.
pub const RESOLVE_ATTEMPTS_TOTAL: &str = "huginn_resolve_attempts_total";

/// Total retry attempts (not counting the initial attempt).
pub const RETRIES_TOTAL: &str = "huginn_retries_total";

/// Total finished resolutions.
///
/// Labels: `status`.
pub const RESOLUTIONS_TOTAL: &str = "huginn_resolutions_total";

/// Wall time of a resolution from first attempt to terminal state.
pub const RESOLVE_DURATION_SECONDS: &str = "huginn_resolve_duration_seconds";
