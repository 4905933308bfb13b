//! Prometheus metrics for Covenant services.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `covenant_requests_total` | Counter | `operation`, `status` | Total requests |
//! | `covenant_request_duration_seconds` | Histogram | `operation` | Request latency |
//! | `covenant_in_flight_requests` | Gauge | - | In-flight requests |
//! | `covenant_validation_failures_total` | Counter | `operation`, `stage` | Rejected requests and responses |
//!
//! Recording functions are no-ops until a recorder is installed, so they
//! are safe to call from tests and from services that run without metrics.
//!
//! # Example
//!
//! ```rust,ignore
//! use covenant_telemetry::metrics::record_request;
//! use std::time::Duration;
//!
//! record_request("getUser", 200, Duration::from_millis(45));
//! ```

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

/// Request counter.
pub const REQUESTS_TOTAL: &str = "covenant_requests_total";
/// Request duration histogram.
pub const REQUEST_DURATION_SECONDS: &str = "covenant_request_duration_seconds";
/// In-flight request gauge.
pub const IN_FLIGHT_REQUESTS: &str = "covenant_in_flight_requests";
/// Validation failure counter.
pub const VALIDATION_FAILURES_TOTAL: &str = "covenant_validation_failures_total";

/// Global metrics handle for rendering.
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,

    /// Address for the Prometheus scrape listener (e.g., "0.0.0.0:9090").
    ///
    /// When `None`, the recorder is installed without a listener and the
    /// metrics are only available through [`render_metrics`].
    pub addr: Option<String>,

    /// Histogram buckets for request duration, in seconds.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: Some("0.0.0.0:9090".to_string()),
            // 1ms .. 10s
            duration_buckets: vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        }
    }
}

/// Initializes the metrics subsystem.
///
/// With a listener address this must be called from within a Tokio
/// runtime, because the scrape endpoint runs as a spawned task.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidAddress` for an unparsable address and
/// `TelemetryError::RecorderInstalled` if another recorder is already set.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let builder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(REQUEST_DURATION_SECONDS.to_string()),
            &config.duration_buckets,
        )
        .map_err(|e| TelemetryError::InvalidBuckets(e.to_string()))?;

    let handle = match &config.addr {
        Some(addr) => {
            let addr: SocketAddr = addr
                .parse()
                .map_err(|e: std::net::AddrParseError| TelemetryError::InvalidAddress {
                    addr: addr.clone(),
                    reason: e.to_string(),
                })?;
            let runtime =
                tokio::runtime::Handle::try_current().map_err(|_| TelemetryError::NoRuntime)?;

            let (recorder, exporter) = builder
                .with_http_listener(addr)
                .build()
                .map_err(|e| TelemetryError::Exporter(e.to_string()))?;
            let handle = recorder.handle();
            metrics::set_global_recorder(recorder).map_err(|_| TelemetryError::RecorderInstalled)?;
            runtime.spawn(async move {
                if let Err(e) = exporter.await {
                    tracing::error!(error = ?e, "metrics exporter stopped");
                }
            });
            handle
        }
        None => builder
            .install_recorder()
            .map_err(|e| TelemetryError::Exporter(e.to_string()))?,
    };

    let _ = METRICS_HANDLE.set(handle);
    register_metric_descriptions();

    Ok(())
}

/// Renders metrics in Prometheus text format.
///
/// Returns `None` if metrics are not initialized.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(REQUESTS_TOTAL, "Total number of HTTP requests processed");
    describe_histogram!(REQUEST_DURATION_SECONDS, "HTTP request duration in seconds");
    describe_gauge!(
        IN_FLIGHT_REQUESTS,
        "Number of HTTP requests currently being processed"
    );
    describe_counter!(
        VALIDATION_FAILURES_TOTAL,
        "Requests and responses rejected by contract validation"
    );
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Records a completed request.
///
/// Updates `covenant_requests_total` and `covenant_request_duration_seconds`.
pub fn record_request(operation: &str, status_code: u16, duration: Duration) {
    counter!(
        REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "status" => status_code.to_string()
    )
    .increment(1);

    histogram!(
        REQUEST_DURATION_SECONDS,
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Records a validation failure.
///
/// `stage` is `request`, `middleware` or `response`.
pub fn record_validation_failure(operation: &str, stage: &str) {
    counter!(
        VALIDATION_FAILURES_TOTAL,
        "operation" => operation.to_string(),
        "stage" => stage.to_string()
    )
    .increment(1);
}

/// Guard that tracks one in-flight request.
///
/// Increments `covenant_in_flight_requests` on creation and decrements it
/// on drop, including when the request future is cancelled.
#[derive(Debug)]
pub struct InFlightGuard {
    _private: (),
}

impl InFlightGuard {
    /// Creates a new guard and increments the in-flight counter.
    #[must_use]
    pub fn new() -> Self {
        gauge!(IN_FLIGHT_REQUESTS).increment(1.0);
        Self { _private: () }
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(IN_FLIGHT_REQUESTS).decrement(1.0);
    }
}
