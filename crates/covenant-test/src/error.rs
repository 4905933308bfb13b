//! Test error types.

use thiserror::Error;

/// Errors raised while building a test request or reading its response.
#[derive(Debug, Error)]
pub enum TestError {
    /// A header name or value could not be used.
    #[error("invalid header {name}: {reason}")]
    InvalidHeader {
        /// The offending header name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The request could not be assembled.
    #[error("request build error: {0}")]
    RequestBuild(String),

    /// The response body was not what the caller expected.
    #[error("body read error: {0}")]
    BodyRead(String),

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = TestError::InvalidHeader {
            name: "x-bad".to_string(),
            reason: "invalid value".to_string(),
        };
        assert_eq!(err.to_string(), "invalid header x-bad: invalid value");

        let err = TestError::BodyRead("not UTF-8".to_string());
        assert_eq!(err.to_string(), "body read error: not UTF-8");
    }

    #[test]
    fn test_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: TestError = json_err.into();
        assert!(matches!(err, TestError::Json(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
