//! Common types used throughout the middleware layer.

use bytes::Bytes;
use covenant_core::{ContractError, Reply};
use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use http_body_util::Full;
use serde_json::Value;

/// The HTTP request type used by middleware and the contract pipeline.
///
/// This is a standard `http::Request` with a `Full<Bytes>` body.
pub type Request = http::Request<Full<Bytes>>;

/// The HTTP response type used by middleware and the contract pipeline.
///
/// This is a standard `http::Response` with a `Full<Bytes>` body.
pub type Response = http::Response<Full<Bytes>>;

/// Content type for JSON bodies.
pub const APPLICATION_JSON: &str = "application/json";

/// Extension trait for building JSON responses.
pub trait ResponseExt {
    /// Creates a JSON response with the given status and body.
    fn json(status: StatusCode, body: &Value) -> Response;

    /// Creates a JSON error response with a bare `{"error":{code,message}}` body.
    fn json_error(status: StatusCode, code: &str, message: &str) -> Response;

    /// Renders a [`ContractError`] as its standard error envelope.
    fn from_error(error: &ContractError, request_id: Option<&str>, expose_issues: bool)
        -> Response;

    /// Converts a handler or middleware [`Reply`] into a response.
    fn from_reply(reply: Reply) -> Response;
}

impl ResponseExt for Response {
    fn json(status: StatusCode, body: &Value) -> Response {
        let mut response = http::Response::new(Full::new(Bytes::from(body.to_string())));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        response
    }

    fn json_error(status: StatusCode, code: &str, message: &str) -> Response {
        let body = serde_json::json!({
            "error": {
                "code": code,
                "message": message
            }
        });
        Self::json(status, &body)
    }

    fn from_error(
        error: &ContractError,
        request_id: Option<&str>,
        expose_issues: bool,
    ) -> Response {
        let envelope = error.to_envelope(request_id, expose_issues);
        match serde_json::to_value(&envelope) {
            Ok(body) => Self::json(error.status_code(), &body),
            Err(_) => Self::json_error(
                error.status_code(),
                error.category().code(),
                "internal server error",
            ),
        }
    }

    fn from_reply(reply: Reply) -> Response {
        let (status, body, headers) = reply.into_parts();
        let mut response = match body {
            Some(body) => Self::json(status, &body),
            None => {
                let mut response = http::Response::new(Full::new(Bytes::new()));
                *response.status_mut() = status;
                response
            }
        };
        for (name, value) in &headers {
            response.headers_mut().append(name, value.clone());
        }
        response
    }
}
