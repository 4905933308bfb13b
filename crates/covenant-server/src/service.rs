//! The contract service.
//!
//! A [`ContractService`] ties the pieces together for one API:
//!
//! ```text
//! Request → RequestId → Telemetry → [extra layers] → route match ─┬→ ContractPipeline
//!                                                                  ├→ OpenAPI document
//!                                                                  └→ 404 / 405
//! ```
//!
//! It is transport-agnostic: [`ContractService::handle`] takes a fully read
//! request, so the same service runs behind [`Server`](crate::Server) or in
//! an in-memory test client.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use covenant_config::CovenantConfig;
use covenant_core::{Contract, ContractError};
use covenant_docs::OpenApiGenerator;
use covenant_middleware::stages::{RequestIdMiddleware, TelemetryMiddleware};
use covenant_middleware::{
    BoxFuture, ContractPipeline, Middleware, MiddlewareContext, MiddlewareStack, Request,
    Response, ResponseExt, ValidationSettings, APPLICATION_JSON,
};
use http::header::{HeaderValue, ALLOW, CONTENT_TYPE};
use http::{Method, StatusCode};
use http_body_util::Full;
use serde_json::json;

use crate::error::ServerError;
use crate::router::{RouteMatch, Router};

/// Operation label for the OpenAPI document endpoint.
pub const DOCS_OPERATION: &str = "openapi";

const DEFAULT_SERVICE_NAME: &str = "covenant";

/// A set of contracts served behind one middleware stack.
///
/// Cheap to clone; clones share the same routes.
///
/// # Example
///
/// ```
/// use covenant_core::fixtures;
/// use covenant_server::ContractService;
///
/// let service = ContractService::builder()
///     .service_name("users")
///     .contracts(fixtures::user_service_contracts().unwrap())
///     .unwrap()
///     .build()
///     .unwrap();
///
/// assert_eq!(service.router().len(), 4);
/// assert!(service.openapi_json().is_some());
/// ```
#[derive(Clone)]
pub struct ContractService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    router: Arc<Router>,
    stack: MiddlewareStack,
    pipeline: ContractPipeline,
    docs: Option<DocsEndpoint>,
    config: CovenantConfig,
}

struct DocsEndpoint {
    path: String,
    document: Bytes,
}

impl fmt::Debug for ContractService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractService")
            .field("router", &self.inner.router)
            .field("stack", &self.inner.stack)
            .field("docs", &self.inner.docs.as_ref().map(|d| &d.path))
            .finish_non_exhaustive()
    }
}

impl ContractService {
    /// Creates a service builder.
    #[must_use]
    pub fn builder() -> ContractServiceBuilder {
        ContractServiceBuilder::new()
    }

    /// The configuration the service was built with.
    #[must_use]
    pub fn config(&self) -> &CovenantConfig {
        &self.inner.config
    }

    /// The frozen route table.
    #[must_use]
    pub fn router(&self) -> &Router {
        &self.inner.router
    }

    /// The generated OpenAPI document, if docs are enabled.
    #[must_use]
    pub fn openapi_json(&self) -> Option<&[u8]> {
        self.inner.docs.as_ref().map(|docs| docs.document.as_ref())
    }

    /// Handles one request.
    pub async fn handle(&self, request: Request) -> Response {
        let mut ctx = MiddlewareContext::new();
        self.handle_with_context(&mut ctx, request).await
    }

    /// Handles one request with a caller-provided context.
    ///
    /// After the call the context holds what the middleware recorded, such as
    /// the request id and the matched operation.
    pub async fn handle_with_context(&self, ctx: &mut MiddlewareContext, request: Request) -> Response {
        let inner = Arc::clone(&self.inner);
        self.inner
            .stack
            .process(ctx, request, move |ctx: &mut MiddlewareContext, request: Request| {
                inner.dispatch(ctx, request)
            })
            .await
    }
}

impl ServiceInner {
    fn dispatch(&self, ctx: &mut MiddlewareContext, request: Request) -> BoxFuture<'static, Response> {
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        if let Some(docs) = &self.docs {
            if method == Method::GET && path == docs.path {
                ctx.set_operation_id(DOCS_OPERATION);
                return ready(docs.response());
            }
        }

        match self.router.match_route(&method, &path) {
            RouteMatch::Found { contract, params } => {
                ctx.set_operation_id(contract.operation_id());
                let contract = Arc::clone(contract);
                let pipeline = self.pipeline.clone();
                let request_ctx = ctx.to_request_context();
                Box::pin(async move { pipeline.execute(&contract, request, params, request_ctx).await })
            }
            RouteMatch::MethodNotAllowed(allowed) => {
                tracing::debug!(method = %method, path = %path, "Method not allowed");
                ready(method_not_allowed(&method, &path, &allowed, &ctx.request_id().to_string()))
            }
            RouteMatch::NotFound => {
                tracing::debug!(method = %method, path = %path, "No route");
                let error = ContractError::not_found(format!("No route for {method} {path}"));
                ready(Response::from_error(&error, Some(&ctx.request_id().to_string()), false))
            }
        }
    }
}

impl DocsEndpoint {
    fn response(&self) -> Response {
        let mut response = http::Response::new(Full::new(self.document.clone()));
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        response
    }
}

fn ready(response: Response) -> BoxFuture<'static, Response> {
    Box::pin(std::future::ready(response))
}

fn method_not_allowed(method: &Method, path: &str, allowed: &[Method], request_id: &str) -> Response {
    let allow = allowed
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    let body = json!({
        "error": {
            "code": "METHOD_NOT_ALLOWED",
            "message": format!("{method} is not allowed for {path}"),
        },
        "request_id": request_id,
    });
    let mut response = Response::json(StatusCode::METHOD_NOT_ALLOWED, &body);
    if let Ok(value) = HeaderValue::from_str(&allow) {
        response.headers_mut().insert(ALLOW, value);
    }
    response
}

/// Builder for [`ContractService`].
pub struct ContractServiceBuilder {
    router: Router,
    config: CovenantConfig,
    service_name: String,
    layers: Vec<Box<dyn Middleware>>,
}

impl Default for ContractServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContractServiceBuilder {
    /// Creates a builder with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            config: CovenantConfig::default(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            layers: Vec::new(),
        }
    }

    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: CovenantConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the service name used in logs.
    #[must_use]
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Appends an HTTP middleware layer after request id and telemetry.
    #[must_use]
    pub fn layer<M: Middleware>(mut self, middleware: M) -> Self {
        self.layers.push(Box::new(middleware));
        self
    }

    /// Registers a contract.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::DuplicateRoute`] or
    /// [`ServerError::DuplicateOperationId`] when the contract collides with
    /// one registered earlier.
    pub fn contract(mut self, contract: impl Into<Arc<Contract>>) -> Result<Self, ServerError> {
        self.router.register(contract)?;
        Ok(self)
    }

    /// Registers several contracts, stopping at the first collision.
    pub fn contracts<I, C>(mut self, contracts: I) -> Result<Self, ServerError>
    where
        I: IntoIterator<Item = C>,
        C: Into<Arc<Contract>>,
    {
        for contract in contracts {
            self.router.register(contract)?;
        }
        Ok(self)
    }

    /// Builds the service and generates its OpenAPI document.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::DuplicateRoute`] if a contract claims the docs
    /// path, or [`ServerError::Docs`] if the document cannot be generated.
    pub fn build(self) -> Result<ContractService, ServerError> {
        let docs = if self.config.docs.enabled {
            Some(self.docs_endpoint()?)
        } else {
            None
        };

        let mut stack = MiddlewareStack::builder()
            .layer(RequestIdMiddleware::new())
            .layer(TelemetryMiddleware::new(self.service_name.clone()));
        for layer in self.layers {
            stack = stack.layer_boxed(layer);
        }

        let validation = &self.config.validation;
        let pipeline = ContractPipeline::new(ValidationSettings {
            validate_responses: validation.validate_responses,
            expose_response_issues: validation.expose_response_issues,
            reject_undeclared_status: validation.reject_undeclared_status,
        });

        tracing::info!(
            service = %self.service_name,
            routes = self.router.len(),
            docs = docs.as_ref().map(|d| d.path.as_str()),
            "Contract service built"
        );

        Ok(ContractService {
            inner: Arc::new(ServiceInner {
                router: self.router.freeze(),
                stack: stack.build(),
                pipeline,
                docs,
                config: self.config,
            }),
        })
    }

    fn docs_endpoint(&self) -> Result<DocsEndpoint, ServerError> {
        let docs = &self.config.docs;

        if let RouteMatch::Found { contract, .. } = self.router.match_route(&Method::GET, &docs.path) {
            return Err(ServerError::DuplicateRoute {
                method: Method::GET,
                path: docs.path.clone(),
                existing: contract.operation_id().to_string(),
            });
        }

        let mut generator = OpenApiGenerator::new()
            .title(&docs.title)
            .version(&docs.version)
            .contracts(self.router.contracts());
        if let Some(description) = &docs.description {
            generator = generator.description(description);
        }

        Ok(DocsEndpoint {
            path: docs.path.clone(),
            document: Bytes::from(generator.generate_json()?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_core::{fixtures, Input, Reply};
    use covenant_middleware::stages::REQUEST_ID_HEADER;
    use http_body_util::BodyExt;
    use serde_json::Value;

    fn users_service() -> ContractService {
        ContractService::builder()
            .service_name("users")
            .contracts(fixtures::user_service_contracts().unwrap())
            .unwrap()
            .build()
            .unwrap()
    }

    fn request(method: Method, uri: &str) -> Request {
        http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn ping(path: &str, operation_id: &str) -> Contract {
        Contract::builder(Method::GET, path)
            .operation_id(operation_id)
            .response_empty(StatusCode::NO_CONTENT, "Pong")
            .handler(|_input: Input| async move { Ok::<_, ContractError>(Reply::no_content()) })
            .build()
            .unwrap()
    }

    // ==================== Routing ====================

    #[tokio::test]
    async fn test_dispatches_to_contract() {
        let service = users_service();
        let mut ctx = MiddlewareContext::new();

        let response = service
            .handle_with_context(&mut ctx, request(Method::GET, "/users/1"))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(ctx.operation_id(), Some("getUser"));
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        assert_eq!(body_json(response).await["name"], "Alice");
    }

    #[tokio::test]
    async fn test_not_found_envelope() {
        let service = users_service();
        let response = service.handle(request(Method::GET, "/orders")).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let request_id = response.headers()[REQUEST_ID_HEADER].to_str().unwrap().to_string();
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert_eq!(body["request_id"], request_id);
    }

    #[tokio::test]
    async fn test_method_not_allowed_sets_allow() {
        let service = users_service();
        let response = service.handle(request(Method::PATCH, "/users")).await;

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "GET, POST");
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "METHOD_NOT_ALLOWED");
    }

    // ==================== Registration ====================

    #[test]
    fn test_duplicate_contract_is_rejected_at_registration() {
        let result = ContractService::builder()
            .contract(ping("/ping/{a}", "pingA"))
            .unwrap()
            .contract(ping("/ping/{b}", "pingB"));

        assert!(matches!(result, Err(ServerError::DuplicateRoute { .. })));
    }

    #[test]
    fn test_contract_on_docs_path_is_rejected() {
        let result = ContractService::builder()
            .contract(ping("/openapi.json", "shadow"))
            .unwrap()
            .build();

        match result {
            Err(ServerError::DuplicateRoute { existing, .. }) => assert_eq!(existing, "shadow"),
            other => panic!("expected a duplicate route, got {other:?}"),
        }
    }

    // ==================== Docs endpoint ====================

    #[tokio::test]
    async fn test_serves_openapi_document() {
        let service = users_service();
        let mut ctx = MiddlewareContext::new();
        let response = service
            .handle_with_context(&mut ctx, request(Method::GET, "/openapi.json"))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], APPLICATION_JSON);
        assert_eq!(ctx.operation_id(), Some(DOCS_OPERATION));

        let document = body_json(response).await;
        assert_eq!(document["openapi"], "3.1.0");
        assert_eq!(document["info"]["title"], "Covenant API");
        assert!(document["paths"]["/users/{userId}"]["delete"].is_object());
    }

    #[tokio::test]
    async fn test_docs_path_and_disable() {
        let mut config = CovenantConfig::default();
        config.docs.path = "/spec".to_string();
        config.docs.title = "Users".to_string();
        let service = ContractService::builder()
            .config(config.clone())
            .contract(ping("/ping", "ping"))
            .unwrap()
            .build()
            .unwrap();

        let response = service.handle(request(Method::GET, "/spec")).await;
        assert_eq!(body_json(response).await["info"]["title"], "Users");

        config.docs.enabled = false;
        let service = ContractService::builder()
            .config(config)
            .contract(ping("/ping", "ping"))
            .unwrap()
            .build()
            .unwrap();
        assert!(service.openapi_json().is_none());
        let response = service.handle(request(Method::GET, "/spec")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    // ==================== Validation settings ====================

    #[tokio::test]
    async fn test_validation_settings_come_from_config() {
        let contract = Contract::builder(Method::GET, "/broken")
            .operation_id("broken")
            .response(
                StatusCode::OK,
                "Broken",
                covenant_core::Schema::object([("id", covenant_core::Schema::integer())]),
            )
            .handler(|_input: Input| async move { Reply::ok(&json!({ "id": "nope" })) })
            .build()
            .unwrap();

        let mut config = CovenantConfig::default();
        config.validation.expose_response_issues = true;
        let service = ContractService::builder()
            .config(config)
            .contract(contract)
            .unwrap()
            .build()
            .unwrap();

        let response = service.handle(request(Method::GET, "/broken")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "RESPONSE_VALIDATION_FAILED");
        assert_eq!(body["error"]["issues"][0]["path"], "body.id");
    }
}
