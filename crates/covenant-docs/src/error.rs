//! Errors raised while building an OpenAPI document.

use thiserror::Error;

/// Why a set of contracts could not be turned into a document.
#[derive(Debug, Error)]
pub enum DocsError {
    /// The document could not be rendered as JSON.
    #[error("failed to render OpenAPI document: {0}")]
    Render(#[from] serde_json::Error),

    /// Two contracts share an operation id.
    #[error("operation id '{operation_id}' is used by more than one contract")]
    DuplicateOperationId {
        /// The repeated operation id.
        operation_id: String,
    },

    /// A contract cannot be placed in the document.
    #[error("cannot document '{operation_id}': {reason}")]
    InvalidOperation {
        /// The contract's operation id.
        operation_id: String,
        /// What prevents it from being documented.
        reason: String,
    },
}

/// Result alias for document generation.
pub type DocsResult<T> = Result<T, DocsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_error_from_serde() {
        let err: DocsError = serde_json::from_str::<String>("invalid").unwrap_err().into();
        assert!(matches!(err, DocsError::Render(_)));
        assert!(err.to_string().starts_with("failed to render"));
    }

    #[test]
    fn test_messages_name_the_operation() {
        let duplicate = DocsError::DuplicateOperationId {
            operation_id: "getUser".to_string(),
        };
        assert_eq!(
            duplicate.to_string(),
            "operation id 'getUser' is used by more than one contract"
        );

        let invalid = DocsError::InvalidOperation {
            operation_id: "tunnel".to_string(),
            reason: "unsupported HTTP method: CONNECT".to_string(),
        };
        assert_eq!(
            invalid.to_string(),
            "cannot document 'tunnel': unsupported HTTP method: CONNECT"
        );
    }
}
