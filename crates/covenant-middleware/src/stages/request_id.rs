//! Request correlation.
//!
//! Every request gets an id that appears in logs, in error envelopes and
//! in the `x-request-id` response header. A valid UUID sent by the caller
//! is kept; anything else is replaced by a fresh UUID v7.
//!
//! A W3C `traceparent` header, when well formed, contributes its trace id
//! to the [`RequestContext`](covenant_core::RequestContext) seen by
//! middleware contracts and handlers.

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};
use covenant_core::RequestId;
use http::HeaderValue;

/// Header carrying the request id in both directions.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// W3C trace context header.
pub const TRACEPARENT_HEADER: &str = "traceparent";

/// Assigns the request id and picks up the caller's trace id.
#[derive(Debug, Clone)]
pub struct RequestIdMiddleware {
    trust_incoming: bool,
}

impl Default for RequestIdMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestIdMiddleware {
    /// Keeps valid ids sent by the caller.
    #[must_use]
    pub fn new() -> Self {
        Self {
            trust_incoming: true,
        }
    }

    /// Ignores caller-supplied ids and trace context.
    #[must_use]
    pub fn always_generate() -> Self {
        Self {
            trust_incoming: false,
        }
    }

    fn header<'r>(&self, request: &'r Request, name: &str) -> Option<&'r str> {
        if !self.trust_incoming {
            return None;
        }
        request.headers().get(name).and_then(|v| v.to_str().ok())
    }
}

/// Extracts the trace id from a `traceparent` value
/// (`00-<32 hex trace id>-<16 hex parent id>-<2 hex flags>`).
///
/// The all-zero trace id is invalid and yields `None`.
#[must_use]
pub fn parse_traceparent(value: &str) -> Option<&str> {
    let mut parts = value.trim().split('-');
    let (version, trace_id, parent_id, flags) =
        (parts.next()?, parts.next()?, parts.next()?, parts.next()?);

    let is_hex = |s: &str, len: usize| s.len() == len && s.bytes().all(|b| b.is_ascii_hexdigit());
    if parts.next().is_some()
        || !is_hex(version, 2)
        || !is_hex(trace_id, 32)
        || !is_hex(parent_id, 16)
        || !is_hex(flags, 2)
        || trace_id.bytes().all(|b| b == b'0')
    {
        return None;
    }
    Some(trace_id)
}

impl Middleware for RequestIdMiddleware {
    fn name(&self) -> &'static str {
        "request_id"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let request_id = self
                .header(&request, REQUEST_ID_HEADER)
                .and_then(RequestId::parse)
                .unwrap_or_default();
            ctx.set_request_id(request_id);

            if let Some(trace_id) = self
                .header(&request, TRACEPARENT_HEADER)
                .and_then(parse_traceparent)
            {
                ctx.set_trace_id(trace_id);
            }

            let mut response = next.run(ctx, request).await;

            if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
                response.headers_mut().insert(REQUEST_ID_HEADER, value);
            }
            response
        })
    }
}
