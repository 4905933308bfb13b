//! # Covenant Core
//!
//! Core types for declarative HTTP contracts.
//!
//! - [`Schema`] - JSON shape description with multi-issue validation
//! - [`Contract`] - Route path/method bound to request/response schemas and a handler
//! - [`MiddlewareContract`] - Reusable pre-handler validation and context step
//! - [`Context`] - Fields shared between middlewares and the handler
//! - [`ContractError`] - Standard error type with HTTP status mapping
//! - [`Handler`] - Contract handler trait

#![doc(html_root_url = "https://docs.rs/covenant-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
pub mod contract;
mod error;
pub mod fixtures;
pub mod guard;
mod handler;
pub mod schema;

pub use context::{Context, RequestContext, RequestId};
pub use contract::{Contract, ContractBuilder, PathTemplate, RequestShape, ResponseSpec, RouteKey};
pub use error::{ContractError, ContractResult, ErrorCategory, ErrorDetail, ErrorEnvelope};
pub use guard::{MiddlewareContract, MiddlewareInput, Outcome, SecurityScheme};
pub use handler::{erase, BoxFuture, ErasedHandler, Handler, Input, RawInput, Reply};
pub use schema::{Issue, IssuePath, Issues, NumberBound, Schema};
