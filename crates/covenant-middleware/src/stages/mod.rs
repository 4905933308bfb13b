//! Built-in HTTP middleware stages.
//!
//! 1. [`request_id`] - Propagate or generate the request id
//! 2. [`telemetry`] - Completion logs and request metrics

pub mod request_id;
pub mod telemetry;

pub use request_id::{parse_traceparent, RequestIdMiddleware, REQUEST_ID_HEADER, TRACEPARENT_HEADER};
pub use telemetry::{RequestRecord, TelemetryMiddleware, UNMATCHED_OPERATION};
