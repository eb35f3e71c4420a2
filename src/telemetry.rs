//! Telemetry metric name constants.
//!
//! Centralised metric names for tensor operations. Consumers install their
//! own `metrics` recorder (e.g. prometheus, statsd); without a recorder
//! installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `tensor_`. Counters end in `_total`,
//! histograms use meaningful units.
//!
//! # Common labels
//!
//! - `endpoint` — HTTP operation ("embed", "summarize", "chat")
//! - `provider` — adapter name (e.g. "openai/text-embedding-3-small")
//! - `status` — outcome: "ok" or "error"

/// Total requests served by the HTTP surface.
///
/// Labels: `endpoint`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "tensor_requests_total";

/// Total vector cache hits across submitter probes and batch re-probes.
pub const CACHE_HITS_TOTAL: &str = "tensor_cache_hits_total";

/// Total vector cache misses across submitter probes and batch re-probes.
pub const CACHE_MISSES_TOTAL: &str = "tensor_cache_misses_total";

/// Total batches dispatched by the batcher loop.
///
/// Labels: `status` ("ok" | "error").
pub const BATCHES_TOTAL: &str = "tensor_batches_total";

/// Number of work items in each dispatched batch.
pub const BATCH_ITEMS: &str = "tensor_batch_items";

/// Total provider `embed_batch` calls made by fan-out.
///
/// Labels: `provider`, `status` ("ok" | "error").
pub const PROVIDER_CALLS_TOTAL: &str = "tensor_provider_calls_total";
