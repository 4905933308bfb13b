//! Error types for Covenant.
//!
//! [`ContractError`] is the error type shared by contracts, middleware
//! contracts and handlers. Every variant maps to an [`ErrorCategory`], which
//! in turn decides the HTTP status and the machine-readable `code` written to
//! the [`ErrorEnvelope`].
//!
//! Internal errors never leak their message: the envelope for an
//! [`ErrorCategory::Internal`] error always reads `internal server error`.

use crate::schema::{Issue, Issues};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`ContractError`].
pub type ContractResult<T> = Result<T, ContractError>;

/// Categories of errors for classification and handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Request validation errors.
    Validation,
    /// Missing or invalid credentials.
    Authentication,
    /// Permission denied.
    Authorization,
    /// Resource not found.
    NotFound,
    /// Conflicting state.
    Conflict,
    /// Request body is not JSON.
    UnsupportedMediaType,
    /// Request body exceeds the configured limit.
    PayloadTooLarge,
    /// Request took too long.
    Timeout,
    /// A handler produced a reply that does not match its contract.
    ResponseValidation,
    /// Everything else, including invalid contract definitions.
    Internal,
}

impl ErrorCategory {
    /// Returns the HTTP status code for this category.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::Authentication => StatusCode::UNAUTHORIZED,
            Self::Authorization => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Timeout => StatusCode::REQUEST_TIMEOUT,
            Self::ResponseValidation | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::Authentication => "AUTHENTICATION_ERROR",
            Self::Authorization => "AUTHORIZATION_DENIED",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::UnsupportedMediaType => "UNSUPPORTED_MEDIA_TYPE",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::Timeout => "TIMEOUT",
            Self::ResponseValidation => "RESPONSE_VALIDATION_FAILED",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

/// Standard error type for Covenant.
///
/// # Example
///
/// ```
/// use covenant_core::{ContractError, ErrorCategory};
///
/// fn find_user(id: u64) -> Result<(), ContractError> {
///     Err(ContractError::not_found(format!("user {id} not found")))
/// }
///
/// let err = find_user(7).unwrap_err();
/// assert_eq!(err.category(), ErrorCategory::NotFound);
/// ```
#[derive(Error, Debug)]
pub enum ContractError {
    /// Request validation failed.
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable error message.
        message: String,
        /// Every issue found.
        issues: Issues,
    },

    /// Authentication failed.
    #[error("Authentication error: {message}")]
    Authentication {
        /// Human-readable error message.
        message: String,
    },

    /// Authorization denied.
    #[error("Authorization denied: {message}")]
    Authorization {
        /// Human-readable error message.
        message: String,
    },

    /// Resource not found.
    #[error("Not found: {message}")]
    NotFound {
        /// Human-readable error message.
        message: String,
    },

    /// Conflict with the current state of a resource.
    #[error("Conflict: {message}")]
    Conflict {
        /// Human-readable error message.
        message: String,
    },

    /// Request content type is not JSON.
    #[error("Unsupported media type: {content_type}")]
    UnsupportedMediaType {
        /// The content type that was sent.
        content_type: String,
    },

    /// Request body exceeds the configured limit.
    #[error("Payload too large: limit is {limit} bytes")]
    PayloadTooLarge {
        /// Configured limit in bytes.
        limit: usize,
    },

    /// Request timed out.
    #[error("Timeout: {message}")]
    Timeout {
        /// Human-readable error message.
        message: String,
    },

    /// A reply did not match the declared response schema.
    #[error("Response validation failed for '{operation_id}': {issues}")]
    ResponseValidation {
        /// Operation that produced the reply.
        operation_id: String,
        /// Every issue found.
        issues: Issues,
    },

    /// A contract or schema was declared incorrectly.
    #[error("Invalid definition: {message}")]
    Definition {
        /// Human-readable error message.
        message: String,
    },

    /// Internal server error.
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message (not exposed to clients).
        message: String,
        /// The underlying error (not exposed to clients).
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl ContractError {
    /// Creates a validation error from a set of issues.
    #[must_use]
    pub fn validation(issues: Issues) -> Self {
        Self::Validation {
            message: "request validation failed".to_string(),
            issues,
        }
    }

    /// Creates a validation error with a single root-level issue.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::Validation {
            issues: Issues::from(vec![Issue::new(Default::default(), message.clone())]),
            message,
        }
    }

    /// Creates an authentication error.
    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Creates an authorization error.
    #[must_use]
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates an unsupported media type error.
    #[must_use]
    pub fn unsupported_media_type(content_type: impl Into<String>) -> Self {
        Self::UnsupportedMediaType {
            content_type: content_type.into(),
        }
    }

    /// Creates a payload too large error.
    #[must_use]
    pub const fn payload_too_large(limit: usize) -> Self {
        Self::PayloadTooLarge { limit }
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Creates a response validation error.
    #[must_use]
    pub fn response_validation(operation_id: impl Into<String>, issues: Issues) -> Self {
        Self::ResponseValidation {
            operation_id: operation_id.into(),
            issues,
        }
    }

    /// Creates a definition error.
    #[must_use]
    pub fn definition(message: impl Into<String>) -> Self {
        Self::Definition {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an internal error with a source error.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::Authentication { .. } => ErrorCategory::Authentication,
            Self::Authorization { .. } => ErrorCategory::Authorization,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::UnsupportedMediaType { .. } => ErrorCategory::UnsupportedMediaType,
            Self::PayloadTooLarge { .. } => ErrorCategory::PayloadTooLarge,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::ResponseValidation { .. } => ErrorCategory::ResponseValidation,
            Self::Definition { .. } | Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.category().status_code()
    }

    /// Returns the issues carried by validation errors.
    #[must_use]
    pub fn issues(&self) -> Option<&Issues> {
        match self {
            Self::Validation { issues, .. } | Self::ResponseValidation { issues, .. } => {
                Some(issues)
            }
            _ => None,
        }
    }

    /// Converts this error to a serializable error envelope.
    ///
    /// Response validation issues are only included when `expose_issues`
    /// is set, because they describe server internals.
    #[must_use]
    pub fn to_envelope(&self, request_id: Option<&str>, expose_issues: bool) -> ErrorEnvelope {
        let category = self.category();
        let (message, issues) = match self {
            Self::Validation { message, issues } => (message.clone(), Some(issues.clone())),
            Self::ResponseValidation { issues, .. } => (
                "response validation failed".to_string(),
                expose_issues.then(|| issues.clone()),
            ),
            Self::Definition { .. } | Self::Internal { .. } => {
                ("internal server error".to_string(), None)
            }
            other => (public_message(other), None),
        };

        ErrorEnvelope {
            error: ErrorDetail {
                code: category.code().to_string(),
                message,
                issues,
            },
            request_id: request_id.map(ToString::to_string),
        }
    }
}

fn public_message(error: &ContractError) -> String {
    match error {
        ContractError::Authentication { message }
        | ContractError::Authorization { message }
        | ContractError::NotFound { message }
        | ContractError::Conflict { message }
        | ContractError::Timeout { message } => message.clone(),
        other => other.to_string(),
    }
}

impl From<Issues> for ContractError {
    fn from(issues: Issues) -> Self {
        Self::validation(issues)
    }
}

impl From<serde_json::Error> for ContractError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal_with_source("JSON serialization failed", err)
    }
}

/// Serializable error envelope for HTTP responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The error details.
    pub error: ErrorDetail,
    /// The request ID for correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Error detail within an envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Validation issues, as `{path, message}` entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issues: Option<Issues>,
}
