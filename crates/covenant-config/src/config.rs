//! Main configuration types.
//!
//! This module provides the top-level [`CovenantConfig`] struct and its builder.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::{
    ConfigError, DocsConfig, LogFormat, LoggingConfig, MetricsConfig, ServerConfig,
    ValidationConfig,
};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Complete Covenant service configuration.
///
/// This is the root configuration type that contains all configuration sections.
/// Use [`ConfigLoader`](crate::ConfigLoader) to load configuration from files
/// and environment variables.
///
/// # Example
///
/// ```
/// use covenant_config::CovenantConfig;
///
/// let config = CovenantConfig::default();
/// assert_eq!(config.server.http_addr, "0.0.0.0:8080");
/// assert!(config.validation.validate_responses);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct CovenantConfig {
    /// Server configuration.
    pub server: ServerConfig,

    /// Response validation configuration.
    pub validation: ValidationConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Metrics configuration.
    pub metrics: MetricsConfig,

    /// OpenAPI endpoint configuration.
    pub docs: DocsConfig,
}

impl CovenantConfig {
    /// Create a new configuration builder.
    ///
    /// # Example
    ///
    /// ```
    /// use covenant_config::{CovenantConfig, ServerConfig};
    ///
    /// let config = CovenantConfig::builder()
    ///     .server(ServerConfig {
    ///         http_addr: "127.0.0.1:3000".to_string(),
    ///         ..Default::default()
    ///     })
    ///     .build();
    ///
    /// assert_eq!(config.server.http_addr, "127.0.0.1:3000");
    /// ```
    #[must_use]
    pub fn builder() -> CovenantConfigBuilder {
        CovenantConfigBuilder::new()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The server or metrics address is not a socket address
    /// - The request timeout or body limit is zero
    /// - The log level is not one of trace, debug, info, warn, error
    /// - The docs path does not start with `/`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.http_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::invalid_value(
                "server.http_addr",
                format!("invalid socket address: {}", self.server.http_addr),
            ));
        }

        if self.server.request_timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "server.request_timeout_ms",
                "must be greater than zero",
            ));
        }

        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::invalid_value(
                "server.max_body_bytes",
                "must be greater than zero",
            ));
        }

        if self.metrics.enabled && self.metrics.addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::invalid_value(
                "metrics.addr",
                format!("invalid socket address: {}", self.metrics.addr),
            ));
        }

        let level = self.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::invalid_value(
                "logging.level",
                format!("expected one of {}", LOG_LEVELS.join(", ")),
            ));
        }

        if self.docs.enabled && !self.docs.path.starts_with('/') {
            return Err(ConfigError::validation_error(format!(
                "docs.path must start with '/', got '{}'",
                self.docs.path
            )));
        }

        Ok(())
    }

    /// Create a development configuration preset.
    ///
    /// This preset is optimized for local development with:
    /// - Pretty log formatting with ANSI colors at debug level
    /// - Response validation issues included in 500 bodies
    /// - Undeclared response statuses rejected
    /// - Metrics disabled
    ///
    /// # Example
    ///
    /// ```
    /// use covenant_config::CovenantConfig;
    ///
    /// let config = CovenantConfig::development();
    /// assert_eq!(config.logging.level, "debug");
    /// assert!(config.validation.expose_response_issues);
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();

        config.server.http_addr = "127.0.0.1:8080".to_string();

        config.logging.level = "debug".to_string();
        config.logging.format = LogFormat::Pretty;
        config.logging.ansi = true;

        config.validation.expose_response_issues = true;
        config.validation.reject_undeclared_status = true;

        config.metrics.enabled = false;

        config
    }

    /// Create a production configuration preset.
    ///
    /// This preset is optimized for production with:
    /// - JSON log formatting at info level
    /// - Response validation on, with issues hidden from clients
    ///
    /// # Example
    ///
    /// ```
    /// use covenant_config::CovenantConfig;
    ///
    /// let config = CovenantConfig::production();
    /// assert_eq!(config.logging.format, covenant_config::LogFormat::Json);
    /// assert!(!config.validation.expose_response_issues);
    /// ```
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();

        config.logging.level = "info".to_string();
        config.logging.format = LogFormat::Json;
        config.logging.ansi = false;

        config.validation.validate_responses = true;
        config.validation.expose_response_issues = false;

        config
    }
}

/// Builder for [`CovenantConfig`].
#[derive(Debug, Default)]
pub struct CovenantConfigBuilder {
    server: Option<ServerConfig>,
    validation: Option<ValidationConfig>,
    logging: Option<LoggingConfig>,
    metrics: Option<MetricsConfig>,
    docs: Option<DocsConfig>,
}

impl CovenantConfigBuilder {
    /// Create a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server configuration.
    #[must_use]
    pub fn server(mut self, server: ServerConfig) -> Self {
        self.server = Some(server);
        self
    }

    /// Set the validation configuration.
    #[must_use]
    pub fn validation(mut self, validation: ValidationConfig) -> Self {
        self.validation = Some(validation);
        self
    }

    /// Set the logging configuration.
    #[must_use]
    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Set the metrics configuration.
    #[must_use]
    pub fn metrics(mut self, metrics: MetricsConfig) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Set the docs configuration.
    #[must_use]
    pub fn docs(mut self, docs: DocsConfig) -> Self {
        self.docs = Some(docs);
        self
    }

    /// Build the configuration.
    ///
    /// Any unset sections will use their default values.
    #[must_use]
    pub fn build(self) -> CovenantConfig {
        CovenantConfig {
            server: self.server.unwrap_or_default(),
            validation: self.validation.unwrap_or_default(),
            logging: self.logging.unwrap_or_default(),
            metrics: self.metrics.unwrap_or_default(),
            docs: self.docs.unwrap_or_default(),
        }
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if validation fails.
    pub fn build_validated(self) -> Result<CovenantConfig, ConfigError> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}
