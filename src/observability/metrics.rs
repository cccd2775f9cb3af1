//! Metrics collection and exposition.
//!
//! # Metrics
//! - `turngate_requests_total` (counter): requests by method, status, backend
//! - `turngate_request_duration_seconds` (histogram): end-to-end latency
//! - `turngate_rate_limited_total` (counter): denied requests by reason
//! - `turngate_backend_up` (gauge): 1=alive, 0=down, per backend
//! - `turngate_rate_limit_buckets` (gauge): live buckets in the registry
//!
//! # Design Decisions
//! - Recording helpers wrap the `metrics` macros so call sites stay one
//!   line and the label sets stay consistent.
//! - Without an installed exporter every helper is a no-op, so unit tests
//!   and the CLI pay nothing for them.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter and its scrape endpoint.
///
/// Must run inside the Tokio runtime; the exporter spawns its own listener
/// task. Failure is logged and the proxy keeps serving without metrics.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe_metrics();
            tracing::info!(address = %addr, "Prometheus metrics endpoint available");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Prometheus exporter");
        }
    }
}

fn describe_metrics() {
    describe_counter!(
        "turngate_requests_total",
        "Total requests handled, labeled by method, status, and backend"
    );
    describe_histogram!(
        "turngate_request_duration_seconds",
        Unit::Seconds,
        "End-to-end request latency"
    );
    describe_counter!(
        "turngate_rate_limited_total",
        "Requests denied by the rate limiter, labeled by reason"
    );
    describe_gauge!(
        "turngate_backend_up",
        "Backend liveness as seen by the prober: 1 alive, 0 down"
    );
    describe_gauge!(
        "turngate_rate_limit_buckets",
        "Token buckets currently live in the registry"
    );
}

/// Record one completed (or refused) request.
pub fn record_request(method: &str, status: u16, backend: &str, start_time: Instant) {
    counter!(
        "turngate_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "backend" => backend.to_string(),
    )
    .increment(1);

    histogram!(
        "turngate_request_duration_seconds",
        "method" => method.to_string(),
        "backend" => backend.to_string(),
    )
    .record(start_time.elapsed().as_secs_f64());
}

/// Record a rate-limiter denial.
pub fn record_rate_limited(reason: &str) {
    counter!("turngate_rate_limited_total", "reason" => reason.to_string()).increment(1);
}

/// Publish a backend's probed liveness.
pub fn record_backend_health(backend: &str, alive: bool) {
    gauge!("turngate_backend_up", "backend" => backend.to_string())
        .set(if alive { 1.0 } else { 0.0 });
}

/// Publish the size of the bucket registry.
pub fn record_bucket_count(count: usize) {
    gauge!("turngate_rate_limit_buckets").set(count as f64);
}
