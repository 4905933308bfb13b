//! # Covenant Middleware
//!
//! Request processing for the Covenant contract layer.
//!
//! Two layers process every request:
//!
//! ```text
//! Request → RequestId → Telemetry → [route match] → ContractPipeline
//!                                                         ↓
//! Response ← RequestId ← Telemetry ←─────────────────────┘
//! ```
//!
//! - The [`MiddlewareStack`] wraps every request, matched or not, with HTTP
//!   middleware such as [`RequestIdMiddleware`](stages::RequestIdMiddleware)
//!   and [`TelemetryMiddleware`](stages::TelemetryMiddleware).
//! - The [`ContractPipeline`] runs a matched contract: request validation,
//!   middleware contracts, the handler and response validation.
//!
//! ## Example
//!
//! ```
//! use covenant_middleware::stages::{RequestIdMiddleware, TelemetryMiddleware};
//! use covenant_middleware::{ContractPipeline, MiddlewareStack, ValidationSettings};
//!
//! let stack = MiddlewareStack::builder()
//!     .layer(RequestIdMiddleware::new())
//!     .layer(TelemetryMiddleware::new("users"))
//!     .build();
//! assert_eq!(stack.names(), ["request_id", "telemetry"]);
//!
//! let pipeline = ContractPipeline::new(ValidationSettings::default());
//! assert!(pipeline.settings().validate_responses);
//! ```

#![doc(html_root_url = "https://docs.rs/covenant-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod context;
pub mod extract;
pub mod middleware;
pub mod pipeline;
pub mod stack;
pub mod stages;
pub mod types;

// Re-export main types at crate root
pub use context::MiddlewareContext;
pub use middleware::{BoxFuture, Middleware, Next};
pub use pipeline::{ContractPipeline, ValidationSettings};
pub use stack::{MiddlewareStack, MiddlewareStackBuilder};
pub use types::{Request, Response, ResponseExt, APPLICATION_JSON};
