//! Observability for Covenant services.
//!
//! - **Logging**: structured logs via `tracing-subscriber` (JSON, pretty or compact)
//! - **Metrics**: Prometheus-format metrics via the `metrics` crate
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `covenant_requests_total` | Counter | `operation`, `status` | Total request count |
//! | `covenant_request_duration_seconds` | Histogram | `operation` | Request latency |
//! | `covenant_in_flight_requests` | Gauge | - | Currently processing requests |
//! | `covenant_validation_failures_total` | Counter | `operation`, `stage` | Contract validation failures |
//!
//! # Example
//!
//! ```rust,no_run
//! use covenant_telemetry::{init_telemetry, LogConfig, MetricsConfig, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), covenant_telemetry::TelemetryError> {
//!     let metrics = MetricsConfig {
//!         addr: Some("0.0.0.0:9090".to_string()),
//!         ..MetricsConfig::default()
//!     };
//!     init_telemetry(&TelemetryConfig::new(LogConfig::production(), metrics))?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use error::TelemetryError;
pub use logging::{fields, init_logging, LogConfig, LogFormat};
pub use metrics::{
    init_metrics, record_request, record_validation_failure, render_metrics, InFlightGuard,
    MetricsConfig,
};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Initializes logging, then metrics.
///
/// # Errors
///
/// Returns `TelemetryError` if either subsystem fails to initialize.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<()> {
    if !config.is_active() {
        return Ok(());
    }
    init_logging(&config.logging)?;
    init_metrics(&config.metrics)?;
    Ok(())
}
