//! Telemetry metric name constants.
//!
//! Consumers install their own `metrics` recorder (e.g. prometheus,
//! statsd); without a recorder installed, all metric calls are no-ops.
//!
//! All metrics are prefixed with `promptify_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).

/// Total remote completion requests.
///
/// Labels: `operation` ("generate" | "generate_stream"), `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "promptify_requests_total";

/// Time to first byte of a completion request, in seconds.
///
/// Labels: `operation`.
pub const REQUEST_DURATION_SECONDS: &str = "promptify_request_duration_seconds";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `client`, `operation`.
pub const RETRIES_TOTAL: &str = "promptify_retries_total";

/// Total prompt cache hits.
pub const CACHE_HITS_TOTAL: &str = "promptify_cache_hits_total";

/// Total prompt cache misses.
pub const CACHE_MISSES_TOTAL: &str = "promptify_cache_misses_total";

/// Total entries evicted from the prompt cache for capacity.
pub const CACHE_EVICTIONS_TOTAL: &str = "promptify_cache_evictions_total";
