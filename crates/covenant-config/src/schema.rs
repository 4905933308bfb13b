//! Configuration schema types.
//!
//! This module defines the structure of all configuration sections. Every
//! section rejects unknown fields and fills missing ones from its defaults.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Server configuration section.
///
/// Controls the HTTP listener, per-request limits and shutdown.
///
/// # Example
///
/// ```
/// use covenant_config::ServerConfig;
///
/// let config = ServerConfig {
///     http_addr: "127.0.0.1:3000".to_string(),
///     ..Default::default()
/// };
/// assert_eq!(config.max_body_bytes, 1024 * 1024);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// HTTP server bind address (e.g., "0.0.0.0:8080").
    pub http_addr: String,

    /// Request timeout in milliseconds. Slower requests get a 408.
    pub request_timeout_ms: u64,

    /// Largest accepted request body. Larger bodies get a 413.
    pub max_body_bytes: usize,

    /// How long in-flight connections may drain on shutdown, in seconds.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:8080".to_string(),
            request_timeout_ms: 30_000,
            max_body_bytes: 1024 * 1024,
            shutdown_timeout_secs: 30,
        }
    }
}

/// Response validation switches.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationConfig {
    /// Check handler replies against their declared schemas.
    pub validate_responses: bool,

    /// Include response validation issues in 500 bodies.
    pub expose_response_issues: bool,

    /// Treat replies with undeclared statuses as failures.
    pub reject_undeclared_status: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            validate_responses: true,
            expose_response_issues: false,
            reject_undeclared_status: false,
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON formatted logs (production).
    #[default]
    Json,
    /// Human-readable pretty format (development).
    Pretty,
    /// Single-line human-readable format.
    Compact,
}

impl LogFormat {
    /// The lowercase name used in files and environment variables.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
            Self::Compact => "compact",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(format!(
                "unknown log format '{other}', expected 'json', 'pretty' or 'compact'"
            )),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub level: String,

    /// Log output format.
    pub format: LogFormat,

    /// Include ANSI color codes in output.
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            ansi: false,
        }
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder and exporter.
    pub enabled: bool,

    /// Prometheus scrape endpoint address.
    pub addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: "0.0.0.0:9090".to_string(),
        }
    }
}

/// OpenAPI document endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DocsConfig {
    /// Serve the generated document.
    pub enabled: bool,

    /// Path the document is served at. Must start with `/`.
    pub path: String,

    /// `info.title` of the document.
    pub title: String,

    /// `info.version` of the document.
    pub version: String,

    /// `info.description` of the document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/openapi.json".to_string(),
            title: "Covenant API".to_string(),
            version: "0.1.0".to_string(),
            description: None,
        }
    }
}
