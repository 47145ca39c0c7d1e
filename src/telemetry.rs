//! Telemetry metric name constants.
//!
//! Centralised metric names for draupnir operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops. Read-only snapshots
//! ([`SamplingMetrics`](crate::SamplingMetrics), [`CacheStats`](crate::CacheStats))
//! are available regardless of the recorder.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `draupnir_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `backend`: backend name
//! - `template`: template id
//! - `status`: outcome: "ok" or "error"
//! - `reason`: eviction reason: "ttl", "lru" or "memory"
//! - `strategy`: candidate strategy name

/// Total sampling requests.
///
/// Labels: `template`, `status` ("ok" | "error").
pub const SAMPLE_REQUESTS_TOTAL: &str = "draupnir_sample_requests_total";

/// Sampling duration in seconds, cache hits included.
///
/// Labels: `template`.
pub const SAMPLE_DURATION_SECONDS: &str = "draupnir_sample_duration_seconds";

/// Total backend invocations.
///
/// Labels: `backend`.
pub const BACKEND_INVOCATIONS_TOTAL: &str = "draupnir_backend_invocations_total";

/// Total retry attempts (not counting the initial invocation).
///
/// Labels: `backend`.
pub const RETRIES_TOTAL: &str = "draupnir_retries_total";

/// Total tokens consumed.
///
/// Labels: `backend`, `direction` ("prompt" | "completion").
pub const TOKENS_TOTAL: &str = "draupnir_tokens_total";

/// Total response cache hits.
///
/// Labels: `template`.
pub const CACHE_HITS_TOTAL: &str = "draupnir_cache_hits_total";

/// Total response cache misses.
///
/// Labels: `template`.
pub const CACHE_MISSES_TOTAL: &str = "draupnir_cache_misses_total";

/// Total response cache evictions.
///
/// Labels: `reason` ("ttl" | "lru" | "memory").
pub const CACHE_EVICTIONS_TOTAL: &str = "draupnir_cache_evictions_total";

/// Total candidates generated successfully.
///
/// Labels: `strategy`.
pub const CANDIDATES_GENERATED_TOTAL: &str = "draupnir_candidates_generated_total";

/// Total strategy failures (skipped candidates).
///
/// Labels: `strategy`.
pub const CANDIDATES_FAILED_TOTAL: &str = "draupnir_candidates_failed_total";

/// Total structured-output repairs attempted.
///
/// Labels: `status` ("ok" | "error").
pub const REPAIRS_TOTAL: &str = "draupnir_repairs_total";
