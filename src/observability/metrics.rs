//! Gateway metrics and the Prometheus scrape endpoint.
//!
//! # Responsibilities
//! - Define gateway metrics (requests, latency, resolution, redirects)
//! - Expose a Prometheus-compatible scrape endpoint
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, route
//! - `gateway_request_duration_seconds` (histogram): end-to-end latency
//! - `gateway_errors_total` (counter): failed exchanges by route and kind
//! - `gateway_resolutions_total` (counter): lookups by upstream and outcome
//! - `gateway_redirects_total` (counter): redirect responses by kind
//! - `gateway_upgrades_total` (counter): relayed WebSocket sessions by route
//!
//! # Design Decisions
//! - Call sites go through the `metrics` facade; without an installed
//!   recorder every record call is a no-op, which keeps tests quiet
//! - The exporter runs its own listener, separate from proxy traffic

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and start the scrape endpoint.
///
/// Failure to bind is logged, not fatal: the gateway keeps serving
/// traffic without metrics.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe_metrics();
            tracing::info!(address = %addr, "Metrics exporter listening");
        }
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to start metrics exporter");
        }
    }
}

fn describe_metrics() {
    describe_counter!(
        "gateway_requests_total",
        "Requests handled, by method, status and route"
    );
    describe_histogram!(
        "gateway_request_duration_seconds",
        "End-to-end request latency per route"
    );
    describe_counter!(
        "gateway_errors_total",
        "Failed upstream exchanges, by route and error kind"
    );
    describe_counter!(
        "gateway_resolutions_total",
        "Upstream name resolutions, by upstream and outcome"
    );
    describe_counter!(
        "gateway_redirects_total",
        "Redirect responses issued, by kind"
    );
    describe_counter!(
        "gateway_upgrades_total",
        "WebSocket sessions relayed, by route"
    );
}

/// Record a completed exchange and its latency.
pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// Record a failed upstream exchange.
pub fn record_error(route: &str, kind: &'static str) {
    counter!(
        "gateway_errors_total",
        "route" => route.to_string(),
        "kind" => kind
    )
    .increment(1);
}

/// Record a name resolution and how it was served.
///
/// Outcomes: `cached`, `fresh`, `stale`, `failed`.
pub fn record_resolution(upstream: &str, outcome: &'static str) {
    counter!(
        "gateway_resolutions_total",
        "upstream" => upstream.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a redirect response. Kinds: `legacy`, `canonical_slash`.
pub fn record_redirect(kind: &'static str) {
    counter!("gateway_redirects_total", "kind" => kind).increment(1);
}

/// Record a relayed WebSocket session.
pub fn record_upgrade(route: &str) {
    counter!("gateway_upgrades_total", "route" => route.to_string()).increment(1);
}
