//! # Covenant Docs
//!
//! OpenAPI 3.1 generation from Covenant contracts.
//!
//! Every registered contract becomes one operation: path and query
//! parameters, headers, the JSON request body and each declared response.
//! Middleware contracts add their own parameters and security schemes, and
//! operations that validate any input get a `400` response pointing at the
//! shared `ValidationError` schema.
//!
//! ## Quick Start
//!
//! ```
//! use covenant_core::fixtures;
//! use covenant_docs::OpenApiGenerator;
//!
//! let contracts = fixtures::user_service_contracts().unwrap();
//!
//! let json = OpenApiGenerator::new()
//!     .title("Users")
//!     .version("1.0.0")
//!     .description("User management")
//!     .contracts(&contracts)
//!     .generate_json()
//!     .unwrap();
//!
//! assert!(json.contains("\"operationId\": \"createUser\""));
//! ```

#![doc(html_root_url = "https://docs.rs/covenant-docs/0.1.0")]

mod error;
mod openapi;

pub use error::{DocsError, DocsResult};
pub use openapi::{
    convert_schema, validation_error_schema, Components, Contact, Info, License, MediaType,
    OpenApi, OpenApiGenerator, Operation, Parameter, ParameterIn, PathItem, RequestBody,
    Response, Schema, SchemaType, SchemaTypes, SecurityRequirement, SecurityScheme, Server, Tag,
    OPENAPI_VERSION, VALIDATION_ERROR_SCHEMA,
};
