//! Metrics and observability utilities
//!
//! Provides Prometheus metrics for ingestion cycles and the read API
//! with standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all MoltWatch metrics
pub const METRICS_PREFIX: &str = "moltwatch";

/// Histogram buckets for read API latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001, // 1ms
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
];

/// Buckets for ingestion cycles (network and translation bound)
pub const CYCLE_BUCKETS: &[f64] = &[
    0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0,
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Cycle metrics
    describe_counter!(
        format!("{}_cycles_total", METRICS_PREFIX),
        Unit::Count,
        "Ingestion cycles by outcome"
    );

    describe_histogram!(
        format!("{}_cycle_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Ingestion cycle latency in seconds"
    );

    describe_counter!(
        format!("{}_posts_created_total", METRICS_PREFIX),
        Unit::Count,
        "Posts stored for the first time"
    );

    describe_counter!(
        format!("{}_posts_updated_total", METRICS_PREFIX),
        Unit::Count,
        "Posts refreshed in place"
    );

    // Retention metrics
    describe_counter!(
        format!("{}_posts_pruned_total", METRICS_PREFIX),
        Unit::Count,
        "Posts removed by retention"
    );

    describe_counter!(
        format!("{}_comments_pruned_total", METRICS_PREFIX),
        Unit::Count,
        "Comments removed by retention"
    );

    // Upstream metrics
    describe_counter!(
        format!("{}_upstream_attempts_total", METRICS_PREFIX),
        Unit::Count,
        "Feed endpoint attempts by outcome"
    );

    // Translation metrics
    describe_counter!(
        format!("{}_translation_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Translation backend requests by outcome"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Helper to record a finished ingestion cycle
pub fn record_cycle(outcome: &str, duration_secs: f64) {
    counter!(
        format!("{}_cycles_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(format!("{}_cycle_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

/// Helper to record reconcile results
pub fn record_reconcile(created: u64, updated: u64, from_cache: bool) {
    let source = if from_cache { "cache" } else { "live" };

    counter!(
        format!("{}_posts_created_total", METRICS_PREFIX),
        "source" => source
    )
    .increment(created);

    counter!(
        format!("{}_posts_updated_total", METRICS_PREFIX),
        "source" => source
    )
    .increment(updated);
}

/// Helper to record retention results
pub fn record_prune(removed_posts: u64, removed_comments: u64) {
    counter!(format!("{}_posts_pruned_total", METRICS_PREFIX)).increment(removed_posts);
    counter!(format!("{}_comments_pruned_total", METRICS_PREFIX)).increment(removed_comments);
}

/// Helper to record a feed endpoint attempt
pub fn record_upstream_attempt(outcome: &str) {
    counter!(
        format!("{}_upstream_attempts_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Helper to record translation metrics
pub fn record_translation(provider: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_translation_requests_total", METRICS_PREFIX),
        "provider" => provider.to_string(),
        "status" => status
    )
    .increment(1);
}
