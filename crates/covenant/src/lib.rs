//! # Covenant
//!
//! **Declarative HTTP contracts.**
//!
//! A contract binds a method and path to request schemas, response
//! schemas, a chain of middleware contracts and a handler. From that one
//! definition Covenant:
//!
//! - validates body, headers, query and path parameters, reporting every
//!   issue in a single 400
//! - runs middleware contracts in order, merging what each contributes
//!   into the context the handler sees
//! - validates handler replies against the declared responses
//! - generates an OpenAPI 3.1 document
//! - rejects duplicate routes at startup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use covenant::prelude::*;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let hello = Contract::builder(Method::GET, "/hello/{name}")
//!         .operation_id("sayHello")
//!         .params(Schema::object([("name", Schema::string().min_length(1))]))
//!         .response(
//!             StatusCode::OK,
//!             "A greeting",
//!             Schema::object([("message", Schema::string())]),
//!         )
//!         .handler(|input: Input| async move {
//!             let name = input.params["name"].as_str().unwrap_or_default();
//!             Reply::ok(&json!({ "message": format!("hello {name}") }))
//!         })
//!         .build()?;
//!
//!     let config = ConfigLoader::new().load()?;
//!     init_telemetry(&config)?;
//!
//!     let service = ContractService::builder()
//!         .config(config)
//!         .contract(hello)?
//!         .build()?;
//!     Server::new(service).run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Request flow
//!
//! ```text
//! Request → RequestId → Telemetry → Router → contract validation
//!                                               ↓
//!                              middleware contracts (in order)
//!                                               ↓
//! Response ← response validation ←─────────── handler
//! ```

#![doc(html_root_url = "https://docs.rs/covenant/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Contracts, schemas and handler types
pub use covenant_core as core;

// HTTP middleware and the contract pipeline
pub use covenant_middleware as middleware;

// Router, service and server
pub use covenant_server as server;

// OpenAPI generation
pub use covenant_docs as docs;

// Layered configuration
pub use covenant_config as config;

// Logging and metrics
pub use covenant_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```
/// use covenant::prelude::*;
///
/// let schema = Schema::object([("id", Schema::integer())]);
/// assert!(schema.is_required());
/// ```
pub mod prelude {
    pub use covenant_core::{
        Context, Contract, ContractError, ContractResult, Input, Issue, Issues, MiddlewareContract,
        MiddlewareInput, Outcome, Reply, RequestContext, RequestId, Schema, SecurityScheme,
    };

    pub use covenant_middleware::{Middleware, MiddlewareContext, Next, ValidationSettings};

    pub use covenant_server::{init_telemetry, ContractService, Server, ServerError};

    pub use covenant_docs::OpenApiGenerator;

    pub use covenant_config::{ConfigLoader, CovenantConfig};

    pub use http::{Method, StatusCode};
}
