//! Typed configuration system for Covenant services.
//!
//! This crate provides a strongly-typed configuration system with support for:
//! - TOML and JSON configuration files
//! - `.env` files and environment variable overrides
//! - Strict validation (fails on unknown fields)
//! - Layered configuration (defaults → files → env)
//!
//! # Overview
//!
//! The configuration system is built around the [`CovenantConfig`] struct:
//!
//! - [`ServerConfig`] - listener address, request timeout, body limit, shutdown drain
//! - [`ValidationConfig`] - response validation switches
//! - [`LoggingConfig`] - log level, format and colors
//! - [`MetricsConfig`] - Prometheus exporter
//! - [`DocsConfig`] - OpenAPI endpoint
//!
//! # Example
//!
//! ```no_run
//! use covenant_config::{ConfigLoader, DEFAULT_ENV_PREFIX};
//!
//! # fn main() -> Result<(), covenant_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_optional_file("covenant.toml")?
//!     .with_dotenv()?
//!     .with_env_prefix(DEFAULT_ENV_PREFIX)
//!     .load()?;
//!
//! println!("Server will listen on: {}", config.server.http_addr);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! http_addr = "0.0.0.0:8080"
//! request_timeout_ms = 30000
//! max_body_bytes = 1048576
//! shutdown_timeout_secs = 30
//!
//! [validation]
//! validate_responses = true
//! expose_response_issues = false
//! reject_undeclared_status = false
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ansi = false
//!
//! [metrics]
//! enabled = true
//! addr = "0.0.0.0:9090"
//!
//! [docs]
//! enabled = true
//! path = "/openapi.json"
//! title = "User Service"
//! version = "1.0.0"
//! ```
//!
//! # Environment Variable Overrides
//!
//! All configuration values can be overridden via environment variables using
//! the format `PREFIX__SECTION__KEY`. For example:
//!
//! - `COVENANT__SERVER__HTTP_ADDR=0.0.0.0:9000`
//! - `COVENANT__VALIDATION__EXPOSE_RESPONSE_ISSUES=true`
//! - `COVENANT__METRICS__ENABLED=false`

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::*;
pub use error::ConfigError;
pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
pub use schema::*;
