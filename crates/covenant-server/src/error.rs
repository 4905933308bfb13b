//! Server error types.

use std::io;

use covenant_config::ConfigError;
use covenant_docs::DocsError;
use covenant_telemetry::TelemetryError;
use http::Method;
use thiserror::Error;

/// Errors raised while assembling or running a contract service.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Two contracts claim the same method and normalized path.
    #[error("Duplicate route {method} {path}: already registered by '{existing}'")]
    DuplicateRoute {
        /// The HTTP method.
        method: Method,
        /// The normalized path.
        path: String,
        /// The operation that registered the route first.
        existing: String,
    },

    /// Two contracts share an operation id.
    #[error("Duplicate operation id '{operation_id}'")]
    DuplicateOperationId {
        /// The repeated operation id.
        operation_id: String,
    },

    /// The listener could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// The configured address.
        addr: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// OpenAPI generation failed.
    #[error(transparent)]
    Docs(#[from] DocsError),

    /// Configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Logging or metrics could not be initialized.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// Any other I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
