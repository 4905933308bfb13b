//! Telemetry configuration.

use crate::logging::LogConfig;
use crate::metrics::MetricsConfig;

/// Settings for both telemetry subsystems.
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    /// Prometheus recorder and scrape listener.
    pub metrics: MetricsConfig,

    /// Global tracing subscriber.
    pub logging: LogConfig,
}

impl TelemetryConfig {
    /// Combines logging and metrics settings.
    #[must_use]
    pub fn new(logging: LogConfig, metrics: MetricsConfig) -> Self {
        Self { metrics, logging }
    }

    /// Installs nothing. Useful for tests and embedded use.
    #[must_use]
    pub fn disabled() -> Self {
        let mut config = Self::default();
        config.logging.enabled = false;
        config.metrics.enabled = false;
        config
    }

    /// `true` if [`init_telemetry`](crate::init_telemetry) would install anything.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.logging.enabled || self.metrics.enabled
    }
}
