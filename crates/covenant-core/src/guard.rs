//! Middleware contracts.
//!
//! A [`MiddlewareContract`] is a reusable pre-handler step. It declares the
//! request parts it reads (validated exactly like a contract's), and its
//! handler either contributes fields to the shared [`Context`] or answers
//! the request itself.
//!
//! # Example
//!
//! ```
//! use covenant_core::{MiddlewareContract, Outcome, Schema, SecurityScheme};
//! use serde_json::json;
//!
//! let auth = MiddlewareContract::builder("auth")
//!     .headers(Schema::object([("authorization", Schema::string())]))
//!     .security(SecurityScheme::bearer())
//!     .handler(|input| async move {
//!         let token = input.headers["authorization"].as_str().unwrap_or_default();
//!         Outcome::provide(&json!({ "token_len": token.len() }))
//!     })
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(auth.name(), "auth");
//! ```

use crate::context::{Context, RequestContext};
use crate::contract::RequestShape;
use crate::error::ContractError;
use crate::handler::{BoxFuture, Reply};
use crate::schema::Schema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Type-erased middleware handler.
pub type ErasedMiddleware =
    Arc<dyn Fn(MiddlewareInput) -> BoxFuture<'static, Result<Outcome, ContractError>> + Send + Sync>;

/// What a middleware handler decided.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Continue down the chain, merging these fields into the context.
    Continue(Map<String, Value>),
    /// Stop and send this reply.
    Respond(Reply),
}

impl Outcome {
    /// Continues without contributing anything.
    #[must_use]
    pub fn proceed() -> Self {
        Self::Continue(Map::new())
    }

    /// Continues, contributing the fields of `value`.
    ///
    /// `value` must serialize to a JSON object.
    pub fn provide<T: Serialize>(value: &T) -> Result<Self, ContractError> {
        match serde_json::to_value(value)? {
            Value::Object(fields) => Ok(Self::Continue(fields)),
            other => Err(ContractError::internal(format!(
                "middleware context must be an object, got {}",
                match other {
                    Value::Null => "null",
                    Value::Bool(_) => "boolean",
                    Value::Number(_) => "number",
                    Value::String(_) => "string",
                    Value::Array(_) => "array",
                    Value::Object(_) => "object",
                }
            ))),
        }
    }

    /// Short-circuits with a reply.
    #[must_use]
    pub fn respond(reply: Reply) -> Self {
        Self::Respond(reply)
    }
}

/// Where an API key is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKeyLocation {
    /// A request header.
    Header,
    /// A query parameter.
    Query,
}

/// Authentication scheme a middleware enforces, for documentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityScheme {
    /// `Authorization: Bearer <token>`.
    Bearer {
        /// Token format hint, e.g. `JWT`.
        format: Option<String>,
    },
    /// An API key in a header or query parameter.
    ApiKey {
        /// Header or parameter name.
        name: String,
        /// Where the key is sent.
        location: ApiKeyLocation,
    },
}

impl SecurityScheme {
    /// Bearer token without a format hint.
    #[must_use]
    pub fn bearer() -> Self {
        Self::Bearer { format: None }
    }

    /// Bearer JWT.
    #[must_use]
    pub fn bearer_jwt() -> Self {
        Self::Bearer {
            format: Some("JWT".to_string()),
        }
    }

    /// API key sent in a header.
    #[must_use]
    pub fn api_key_header(name: impl Into<String>) -> Self {
        Self::ApiKey {
            name: name.into(),
            location: ApiKeyLocation::Header,
        }
    }
}

/// Validated request parts and the context built so far.
#[derive(Debug, Clone)]
pub struct MiddlewareInput {
    /// Parsed body (`null` when undeclared).
    pub body: Value,
    /// Parsed query object (`null` when undeclared).
    pub query: Value,
    /// Parsed path parameters (`null` when undeclared).
    pub params: Value,
    /// Parsed headers (`null` when undeclared).
    pub headers: Value,
    /// Fields contributed by earlier middlewares.
    pub context: Context,
    /// Request metadata.
    pub request: RequestContext,
}

impl MiddlewareInput {
    /// Decodes the headers into a typed struct.
    pub fn headers_as<T: DeserializeOwned>(&self) -> Result<T, ContractError> {
        Ok(serde_json::from_value(self.headers.clone())?)
    }

    /// Decodes the query into a typed struct.
    pub fn query_as<T: DeserializeOwned>(&self) -> Result<T, ContractError> {
        Ok(serde_json::from_value(self.query.clone())?)
    }

    /// Decodes the body into a typed struct.
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, ContractError> {
        Ok(serde_json::from_value(self.body.clone())?)
    }
}

/// A reusable pre-handler validation and context step.
#[derive(Clone)]
pub struct MiddlewareContract {
    name: String,
    description: Option<String>,
    request: RequestShape,
    security: Option<SecurityScheme>,
    handler: ErasedMiddleware,
}

impl fmt::Debug for MiddlewareContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareContract")
            .field("name", &self.name)
            .field("request", &self.request)
            .field("security", &self.security)
            .finish_non_exhaustive()
    }
}

impl MiddlewareContract {
    /// Starts a middleware contract.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> MiddlewareContractBuilder {
        MiddlewareContractBuilder {
            name: name.into(),
            description: None,
            request: RequestShape::default(),
            security: None,
            handler: None,
        }
    }

    /// The middleware name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description for documentation.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Declared request parts.
    #[must_use]
    pub fn request(&self) -> &RequestShape {
        &self.request
    }

    /// Security scheme, if this middleware authenticates.
    #[must_use]
    pub fn security(&self) -> Option<&SecurityScheme> {
        self.security.as_ref()
    }

    /// Runs the middleware handler.
    pub fn run(&self, input: MiddlewareInput) -> BoxFuture<'static, Result<Outcome, ContractError>> {
        (self.handler)(input)
    }
}

/// Builder for [`MiddlewareContract`].
pub struct MiddlewareContractBuilder {
    name: String,
    description: Option<String>,
    request: RequestShape,
    security: Option<SecurityScheme>,
    handler: Option<ErasedMiddleware>,
}

impl MiddlewareContractBuilder {
    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declares the body schema.
    #[must_use]
    pub fn body(mut self, schema: Schema) -> Self {
        self.request.body = Some(schema);
        self
    }

    /// Declares the header schema.
    #[must_use]
    pub fn headers(mut self, schema: Schema) -> Self {
        self.request.headers = Some(schema.with_lowercase_keys());
        self
    }

    /// Declares the query schema.
    #[must_use]
    pub fn query(mut self, schema: Schema) -> Self {
        self.request.query = Some(schema);
        self
    }

    /// Declares the path parameter schema.
    #[must_use]
    pub fn params(mut self, schema: Schema) -> Self {
        self.request.params = Some(schema);
        self
    }

    /// Declares the security scheme this middleware enforces.
    #[must_use]
    pub fn security(mut self, scheme: SecurityScheme) -> Self {
        self.security = Some(scheme);
        self
    }

    /// Sets the handler.
    #[must_use]
    pub fn handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(MiddlewareInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Outcome, ContractError>> + Send + 'static,
    {
        self.handler = Some(Arc::new(
            move |input: MiddlewareInput| -> BoxFuture<'static, Result<Outcome, ContractError>> {
                Box::pin(handler(input))
            },
        ));
        self
    }

    /// Builds the middleware contract.
    pub fn build(self) -> Result<MiddlewareContract, ContractError> {
        let handler = self.handler.ok_or_else(|| {
            ContractError::definition(format!("middleware '{}': no handler was provided", self.name))
        })?;
        self.request
            .check(&format!("middleware '{}'", self.name))?;

        Ok(MiddlewareContract {
            name: self.name,
            description: self.description,
            request: self.request,
            security: self.security,
            handler,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use serde_json::json;

    fn input() -> MiddlewareInput {
        MiddlewareInput {
            body: Value::Null,
            query: json!({ "page": 2 }),
            params: Value::Null,
            headers: json!({ "x-tenant": "acme" }),
            context: Context::new(),
            request: RequestContext::new(),
        }
    }

    #[test]
    fn test_provide_requires_object() {
        assert!(matches!(
            Outcome::provide(&json!({ "a": 1 })).unwrap(),
            Outcome::Continue(fields) if fields["a"] == 1
        ));
        let err = Outcome::provide(&json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("got array"));
    }

    #[tokio::test]
    async fn test_run_continue() {
        let middleware = MiddlewareContract::builder("tenant")
            .headers(Schema::object([("X-Tenant", Schema::string())]))
            .handler(|input| async move {
                let tenant = input.headers["x-tenant"].clone();
                Outcome::provide(&json!({ "tenant": tenant }))
            })
            .build()
            .unwrap();

        match middleware.run(input()).await.unwrap() {
            Outcome::Continue(fields) => assert_eq!(fields["tenant"], "acme"),
            Outcome::Respond(_) => panic!("expected continue"),
        }
    }

    #[tokio::test]
    async fn test_run_respond() {
        let middleware = MiddlewareContract::builder("maintenance")
            .handler(|_input| async move {
                Ok::<_, ContractError>(Outcome::respond(Reply::empty(
                    StatusCode::SERVICE_UNAVAILABLE,
                )))
            })
            .build()
            .unwrap();

        match middleware.run(input()).await.unwrap() {
            Outcome::Respond(reply) => {
                assert_eq!(reply.status(), StatusCode::SERVICE_UNAVAILABLE);
            }
            Outcome::Continue(_) => panic!("expected respond"),
        }
    }

    #[test]
    fn test_typed_accessors() {
        #[derive(serde::Deserialize)]
        struct Tenant {
            #[serde(rename = "x-tenant")]
            tenant: String,
        }

        let input = input();
        let tenant: Tenant = input.headers_as().unwrap();
        assert_eq!(tenant.tenant, "acme");
        assert_eq!(input.query_as::<Value>().unwrap()["page"], 2);
    }

    #[test]
    fn test_missing_handler() {
        let err = MiddlewareContract::builder("noop").build().unwrap_err();
        assert!(err.to_string().contains("no handler"));
    }
}
