//! Telemetry emission middleware.
//!
//! Logs one completion event per request and records the standard request
//! metrics (`covenant_requests_total`, `covenant_request_duration_seconds`,
//! `covenant_in_flight_requests`).
//!
//! Requests that matched no contract are labelled `unmatched`, so 404 scans
//! cannot blow up metric cardinality.
//!
//! # Log Fields
//!
//! - `request_id`, `trace_id` (when the caller sent `traceparent`)
//! - `operation_id`
//! - `http.method`, `http.path`, `http.status_code`
//! - `duration_ms`

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};
use covenant_telemetry::{record_request, InFlightGuard};

/// Operation label used when no contract matched.
pub const UNMATCHED_OPERATION: &str = "unmatched";

/// Telemetry middleware that emits metrics and logs for every request.
#[derive(Debug, Clone)]
pub struct TelemetryMiddleware {
    service_name: String,
}

/// What was recorded for one request.
///
/// Stored in the [`MiddlewareContext`] after the response is produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestRecord {
    /// The service name.
    pub service_name: String,
    /// The matched operation, or `unmatched`.
    pub operation_id: String,
    /// The HTTP method.
    pub method: String,
    /// The request path.
    pub path: String,
    /// The HTTP status code.
    pub status_code: u16,
    /// Request duration in milliseconds.
    pub duration_ms: f64,
    /// The request ID.
    pub request_id: String,
    /// Trace id from the caller's `traceparent`.
    pub trace_id: Option<String>,
}

impl TelemetryMiddleware {
    /// Creates a telemetry middleware for the given service.
    #[must_use]
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    /// The service name attached to completion logs.
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl Middleware for TelemetryMiddleware {
    fn name(&self) -> &'static str {
        "telemetry"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let _in_flight = InFlightGuard::new();
            let method = request.method().to_string();
            let path = request.uri().path().to_string();

            let response = next.run(ctx, request).await;

            let duration = ctx.elapsed();
            let operation_id = ctx
                .operation_id()
                .unwrap_or(UNMATCHED_OPERATION)
                .to_string();
            let status_code = response.status().as_u16();

            record_request(&operation_id, status_code, duration);

            let record = RequestRecord {
                service_name: self.service_name.clone(),
                operation_id,
                method,
                path,
                status_code,
                duration_ms: duration.as_secs_f64() * 1000.0,
                request_id: ctx.request_id().to_string(),
                trace_id: ctx.trace_id().map(ToString::to_string),
            };

            if response.status().is_server_error() {
                tracing::error!(
                    service = %record.service_name,
                    request_id = %record.request_id,
                    trace_id = record.trace_id.as_deref(),
                    operation_id = %record.operation_id,
                    http.method = %record.method,
                    http.path = %record.path,
                    http.status_code = record.status_code,
                    duration_ms = record.duration_ms,
                    "request failed"
                );
            } else {
                tracing::info!(
                    service = %record.service_name,
                    request_id = %record.request_id,
                    trace_id = record.trace_id.as_deref(),
                    operation_id = %record.operation_id,
                    http.method = %record.method,
                    http.path = %record.path,
                    http.status_code = record.status_code,
                    duration_ms = record.duration_ms,
                    "request completed"
                );
            }

            ctx.set_extension(record);
            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{Request as HttpRequest, Response as HttpResponse, StatusCode};
    use http_body_util::Full;

    fn make_test_request() -> Request {
        HttpRequest::builder()
            .method("GET")
            .uri("/users/123")
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    fn respond_with<'a>(status: StatusCode) -> Next<'a> {
        Next::handler(move |_ctx, _req| {
            Box::pin(async move {
                HttpResponse::builder()
                    .status(status)
                    .body(Full::new(Bytes::new()))
                    .unwrap()
            })
        })
    }

    #[test]
    fn test_middleware_name() {
        let middleware = TelemetryMiddleware::new("test-service");
        assert_eq!(middleware.name(), "telemetry");
        assert_eq!(middleware.service_name(), "test-service");
    }

    #[tokio::test]
    async fn test_telemetry_collects_record() {
        let middleware = TelemetryMiddleware::new("test-service");

        let mut ctx = MiddlewareContext::new();
        ctx.set_operation_id("getUser");

        let response = middleware
            .process(&mut ctx, make_test_request(), respond_with(StatusCode::OK))
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let record = ctx.get_extension::<RequestRecord>().unwrap();
        assert_eq!(record.service_name, "test-service");
        assert_eq!(record.operation_id, "getUser");
        assert_eq!(record.method, "GET");
        assert_eq!(record.path, "/users/123");
        assert_eq!(record.status_code, 200);
        assert_eq!(record.request_id, ctx.request_id().to_string());
        assert!(record.duration_ms >= 0.0);
    }

    #[tokio::test]
    async fn test_unmatched_requests_are_labelled() {
        let middleware = TelemetryMiddleware::new("test-service");
        let mut ctx = MiddlewareContext::new();

        let response = middleware
            .process(
                &mut ctx,
                make_test_request(),
                respond_with(StatusCode::NOT_FOUND),
            )
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let record = ctx.get_extension::<RequestRecord>().unwrap();
        assert_eq!(record.operation_id, UNMATCHED_OPERATION);
        assert_eq!(record.status_code, 404);
    }

    #[tokio::test]
    async fn test_operation_set_downstream_is_seen() {
        let middleware = TelemetryMiddleware::new("test-service");
        let mut ctx = MiddlewareContext::new();

        let next = Next::handler(|ctx: &mut MiddlewareContext, _req| {
            ctx.set_operation_id("listUsers");
            let response: BoxFuture<'static, Response> = Box::pin(async {
                HttpResponse::builder()
                    .status(StatusCode::OK)
                    .body(Full::new(Bytes::new()))
                    .unwrap()
            });
            response
        });

        middleware.process(&mut ctx, make_test_request(), next).await;
        let record = ctx.get_extension::<RequestRecord>().unwrap();
        assert_eq!(record.operation_id, "listUsers");
    }
}
