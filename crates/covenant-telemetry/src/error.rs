//! Telemetry error types.

use thiserror::Error;

/// Errors raised while installing logging or metrics.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// `logging.format` named an unknown format.
    #[error("unknown log format '{0}' (expected json, pretty or compact)")]
    UnknownLogFormat(String),

    /// The level string is not a valid `EnvFilter` directive.
    #[error("invalid log filter '{filter}': {reason}")]
    InvalidFilter {
        /// The rejected directive.
        filter: String,
        /// Parser message.
        reason: String,
    },

    /// A global tracing subscriber is already set.
    #[error("logging already initialized: {0}")]
    SubscriberInstalled(String),

    /// Histogram buckets were rejected by the exporter.
    #[error("invalid duration buckets: {0}")]
    InvalidBuckets(String),

    /// The scrape listener address does not parse.
    #[error("invalid metrics address '{addr}': {reason}")]
    InvalidAddress {
        /// The configured address.
        addr: String,
        /// Parser message.
        reason: String,
    },

    /// The scrape listener was requested outside a Tokio runtime.
    #[error("the metrics listener needs a running Tokio runtime")]
    NoRuntime,

    /// The Prometheus exporter failed to build.
    #[error("metrics exporter failed: {0}")]
    Exporter(String),

    /// A global metrics recorder is already set.
    #[error("a metrics recorder is already installed")]
    RecorderInstalled,
}
