//! Bridges the `logging` and `metrics` configuration sections to
//! `covenant-telemetry`.

use covenant_config::{CovenantConfig, LogFormat as ConfigLogFormat};
use covenant_telemetry::{LogConfig, LogFormat, MetricsConfig, TelemetryConfig};

use crate::error::ServerResult;

/// Builds the telemetry settings for `config`.
#[must_use]
pub fn telemetry_config(config: &CovenantConfig) -> TelemetryConfig {
    let format = match config.logging.format {
        ConfigLogFormat::Json => LogFormat::Json,
        ConfigLogFormat::Pretty => LogFormat::Pretty,
        ConfigLogFormat::Compact => LogFormat::Compact,
    };

    let logging = LogConfig {
        level: config.logging.level.clone(),
        format,
        ansi: config.logging.ansi,
        ..LogConfig::default()
    };

    let metrics = MetricsConfig {
        enabled: config.metrics.enabled,
        addr: Some(config.metrics.addr.clone()),
        ..MetricsConfig::default()
    };

    TelemetryConfig::new(logging, metrics)
}

/// Installs logging and metrics for `config`.
///
/// Call once at startup, from within a Tokio runtime when metrics are
/// enabled.
pub fn init_telemetry(config: &CovenantConfig) -> ServerResult<()> {
    covenant_telemetry::init_telemetry(&telemetry_config(config))?;
    Ok(())
}
