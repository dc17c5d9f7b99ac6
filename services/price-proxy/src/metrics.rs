//! Prometheus metrics for the price proxy
//!
//! Metrics covered:
//! - HTTP request metrics (latency, status codes)
//! - Rate limiting rejections per proxy route
//! - Upstream provider calls (latency, failures)

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::sync::OnceLock;

#[cfg(feature = "monitoring")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::warn;

use crate::server;

pub const ROUTE_RECENT: &str = "providerA";
pub const ROUTE_ARCHIVE: &str = "providerB";

/// Register all metric descriptions
fn register_metrics() {
    describe_counter!(
        "price_proxy_http_requests_total",
        "Total number of HTTP requests by route and status code"
    );
    describe_histogram!(
        "price_proxy_http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_counter!(
        "price_proxy_rate_limit_exceeded_total",
        "Total requests rejected by the daily limiter"
    );
    describe_counter!(
        "price_proxy_upstream_requests_total",
        "Total requests sent to upstream providers"
    );
    describe_histogram!(
        "price_proxy_upstream_request_duration_seconds",
        "Upstream provider call duration in seconds"
    );
    describe_counter!(
        "price_proxy_upstream_errors_total",
        "Total upstream calls that failed or returned a non-OK status"
    );
}

/// Label for a request's matched route template; `unmatched` when no
/// route matched. Templates are fixed at startup, so labels stay bounded.
#[must_use]
pub fn route_label(matched_path: Option<&str>) -> String {
    match matched_path {
        Some(server::RECENT_PATH) => ROUTE_RECENT.to_string(),
        Some(server::ARCHIVE_PATH) => ROUTE_ARCHIVE.to_string(),
        Some(path) => path.to_string(),
        None => "unmatched".to_string(),
    }
}

/// Record HTTP request
pub fn record_http_request(route: String, status: u16, duration: f64) {
    counter!("price_proxy_http_requests_total",
        "route" => route.clone(),
        "status_code" => status.to_string()
    )
    .increment(1);

    histogram!("price_proxy_http_request_duration_seconds", "route" => route).record(duration);
}

/// Record a request rejected by the limiter
pub fn record_rate_limited(route: &'static str) {
    counter!("price_proxy_rate_limit_exceeded_total", "route" => route).increment(1);
}

/// Record upstream provider call
pub fn record_upstream_call(provider: &'static str, duration: f64, success: bool) {
    counter!("price_proxy_upstream_requests_total", "provider" => provider).increment(1);
    histogram!("price_proxy_upstream_request_duration_seconds", "provider" => provider)
        .record(duration);

    if !success {
        counter!("price_proxy_upstream_errors_total", "provider" => provider).increment(1);
    }
}

#[cfg(feature = "monitoring")]
static PROMETHEUS: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

#[cfg(not(feature = "monitoring"))]
static PROMETHEUS: OnceLock<Option<()>> = OnceLock::new();

/// Install the process-wide Prometheus recorder once. Returns whether a
/// recorder is available for rendering.
pub fn init_metrics() -> bool {
    PROMETHEUS
        .get_or_init(|| {
            #[cfg(feature = "monitoring")]
            let handle = match PrometheusBuilder::new().install_recorder() {
                Ok(handle) => Some(handle),
                Err(e) => {
                    warn!("Failed to install Prometheus recorder: {}", e);
                    None
                }
            };
            #[cfg(not(feature = "monitoring"))]
            let handle = {
                warn!("Built without the monitoring feature; metrics are not exported");
                None
            };

            register_metrics();
            handle
        })
        .is_some()
}

/// Render the Prometheus text exposition, if a recorder is installed
#[must_use]
pub fn render() -> Option<String> {
    #[cfg(feature = "monitoring")]
    {
        PROMETHEUS.get()?.as_ref().map(PrometheusHandle::render)
    }
    #[cfg(not(feature = "monitoring"))]
    {
        None
    }
}
