//! Test response wrapper.

use crate::error::TestError;
use bytes::Bytes;
use covenant_core::{ErrorEnvelope, Issue};
use covenant_middleware::types::Response;
use http::{header, HeaderMap, HeaderValue, StatusCode};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;

/// A buffered response with helpers for assertions.
#[derive(Debug, Clone)]
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    /// Buffers a service response.
    pub async fn from_http(response: Response) -> Result<Self, TestError> {
        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| TestError::BodyRead(e.to_string()))?
            .to_bytes();

        Ok(Self::new(parts.status, parts.headers, body))
    }

    /// Creates a response from raw parts.
    #[must_use]
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the status code as a u16.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Returns the headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Gets a header value as a string.
    #[must_use]
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.header_value(name).and_then(|v| v.to_str().ok())
    }

    /// Gets a raw header value.
    #[must_use]
    pub fn header_value(&self, name: impl AsRef<str>) -> Option<&HeaderValue> {
        self.headers.get(name.as_ref())
    }

    /// The `x-request-id` echoed by the service.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.header(covenant_middleware::stages::REQUEST_ID_HEADER)
    }

    /// Returns the raw body bytes.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body as a string.
    pub fn text(&self) -> Result<String, TestError> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| TestError::BodyRead(format!("invalid UTF-8: {e}")))
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TestError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Parses the body as a Covenant error envelope.
    pub fn error_envelope(&self) -> Result<ErrorEnvelope, TestError> {
        self.json()
    }

    /// Returns the issues of a validation failure.
    ///
    /// Fails if the body is not an error envelope or the envelope
    /// carries no issue list.
    pub fn validation_issues(&self) -> Result<Vec<Issue>, TestError> {
        let envelope = self.error_envelope()?;
        envelope.error.issues.map(|issues| issues.into_vec()).ok_or_else(|| {
            TestError::BodyRead(format!(
                "error envelope with code {} has no issues",
                envelope.error.code
            ))
        })
    }

    /// Issue paths in order, rendered the way the envelope renders them.
    pub fn issue_paths(&self) -> Result<Vec<String>, TestError> {
        Ok(self
            .validation_issues()?
            .iter()
            .map(|issue| issue.path.to_string())
            .collect())
    }

    /// Asserts the status code.
    ///
    /// # Panics
    ///
    /// Panics if the status differs; the body is included in the message.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "expected status {expected}, got {} with body {}",
            self.status,
            String::from_utf8_lossy(&self.body)
        );
        self
    }

    /// Asserts a header value.
    ///
    /// # Panics
    ///
    /// Panics if the header is missing or differs.
    pub fn assert_header(&self, name: impl AsRef<str>, expected: &str) -> &Self {
        let name = name.as_ref();
        match self.header(name) {
            Some(actual) => assert_eq!(actual, expected, "header {name} mismatch"),
            None => panic!("header {name} not present"),
        }
        self
    }

    /// Asserts the `Content-Type` header starts with `expected`.
    ///
    /// # Panics
    ///
    /// Panics if the content type is missing or different.
    pub fn assert_content_type(&self, expected: &str) -> &Self {
        let actual = self.header(header::CONTENT_TYPE.as_str()).unwrap_or_default();
        assert!(
            actual.starts_with(expected),
            "expected content type {expected}, got {actual:?}"
        );
        self
    }

    /// Asserts that a validation issue exists at `path`.
    ///
    /// # Panics
    ///
    /// Panics if the body has no issue list or none matches `path`.
    pub fn assert_issue(&self, path: &str) -> &Self {
        let paths = self
            .issue_paths()
            .unwrap_or_else(|err| panic!("response carries no validation issues: {err}"));
        assert!(
            paths.iter().any(|p| p == path),
            "no issue at {path}, found {paths:?}"
        );
        self
    }
}
