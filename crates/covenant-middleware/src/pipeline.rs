//! The validation-and-dispatch pipeline.
//!
//! [`ContractPipeline::execute`] runs one request through a matched
//! [`Contract`] in a single linear pass:
//!
//! 1. **Content negotiation** - a contract with a body only accepts JSON (415)
//! 2. **Request validation** - body, headers, query and params; every issue
//!    from every part is collected into one 400
//! 3. **Middleware contracts** - in declaration order; each validates its
//!    own request shape, then either contributes context or answers
//! 4. **Dispatch** - the handler receives the parsed parts and the merged
//!    context
//! 5. **Response validation** - the reply must match the schema declared
//!    for its status; unknown keys are stripped before sending
//!
//! Handler and middleware failures are mapped through their error
//! category. Panics become 500 responses.

use crate::extract::{is_json_content_type, validate_shape, RequestParts};
use crate::stages::REQUEST_ID_HEADER;
use crate::types::{Request, Response, ResponseExt};
use covenant_core::{
    Context, Contract, ContractError, Issue, IssuePath, Issues, MiddlewareInput, Outcome,
    RawInput, Reply, RequestContext,
};
use covenant_telemetry::record_validation_failure;
use futures_util::FutureExt;
use http::header::CONTENT_TYPE;
use http::HeaderValue;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;

/// Switches for response validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationSettings {
    /// Check replies against their declared schemas.
    pub validate_responses: bool,
    /// Include response validation issues in the 500 body.
    pub expose_response_issues: bool,
    /// Treat a reply with an undeclared status as a validation failure.
    pub reject_undeclared_status: bool,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            validate_responses: true,
            expose_response_issues: false,
            reject_undeclared_status: false,
        }
    }
}

/// Executes matched contracts.
///
/// # Example
///
/// ```
/// use covenant_core::{fixtures, RequestContext};
/// use covenant_middleware::{ContractPipeline, Request};
/// use bytes::Bytes;
/// use http_body_util::Full;
/// use std::collections::HashMap;
///
/// # tokio_test::block_on(async {
/// let contracts = fixtures::user_service_contracts().unwrap();
/// let get_user = &contracts[1];
///
/// let request: Request = http::Request::get("/users/1")
///     .body(Full::new(Bytes::new()))
///     .unwrap();
/// let params = HashMap::from([("userId".to_string(), "1".to_string())]);
///
/// let response = ContractPipeline::default()
///     .execute(get_user, request, params, RequestContext::new())
///     .await;
/// assert_eq!(response.status(), 200);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct ContractPipeline {
    settings: ValidationSettings,
}

impl ContractPipeline {
    /// Creates a pipeline with the given settings.
    #[must_use]
    pub fn new(settings: ValidationSettings) -> Self {
        Self { settings }
    }

    /// The active settings.
    #[must_use]
    pub fn settings(&self) -> &ValidationSettings {
        &self.settings
    }

    /// Runs `request` through `contract`.
    ///
    /// `params` are the raw path parameters from the route match. The
    /// response always carries `x-request-id`.
    pub async fn execute(
        &self,
        contract: &Contract,
        request: Request,
        params: HashMap<String, String>,
        request_ctx: RequestContext,
    ) -> Response {
        let request_id = request_ctx.request_id().to_string();

        let mut response = match self.run(contract, request, &params, request_ctx).await {
            Ok(reply) => Response::from_reply(reply),
            Err(error) => {
                log_failure(contract.operation_id(), &request_id, &error);
                Response::from_error(
                    &error,
                    Some(&request_id),
                    self.settings.expose_response_issues,
                )
            }
        };

        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }

    async fn run(
        &self,
        contract: &Contract,
        request: Request,
        params: &HashMap<String, String>,
        request_ctx: RequestContext,
    ) -> Result<Reply, ContractError> {
        let operation_id = contract.operation_id();

        if contract.request().body.is_some() && !is_json_content_type(request.headers()) {
            let content_type = request
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("<binary>")
                .to_string();
            return Err(ContractError::unsupported_media_type(content_type));
        }

        let parts = RequestParts::read(request, params).await;

        let parsed = validate_shape(contract.request(), &parts).map_err(|issues| {
            record_validation_failure(operation_id, "request");
            ContractError::validation(issues)
        })?;

        let mut context = Context::new();
        for middleware in contract.middlewares() {
            let own = validate_shape(middleware.request(), &parts).map_err(|issues| {
                record_validation_failure(operation_id, "middleware");
                ContractError::validation(issues)
            })?;

            let input = MiddlewareInput {
                body: own.body,
                query: own.query,
                params: own.params,
                headers: own.headers,
                context: context.clone(),
                request: request_ctx.clone(),
            };

            let outcome = AssertUnwindSafe(async { middleware.run(input).await })
                .catch_unwind()
                .await
                .map_err(|panic| {
                    ContractError::internal(format!(
                        "middleware '{}' panicked: {}",
                        middleware.name(),
                        panic_message(panic.as_ref())
                    ))
                })??;

            match outcome {
                Outcome::Continue(fields) => {
                    tracing::debug!(
                        operation_id,
                        middleware = middleware.name(),
                        fields = fields.len(),
                        "middleware contributed context"
                    );
                    context.merge(fields);
                }
                Outcome::Respond(reply) => {
                    tracing::debug!(
                        operation_id,
                        middleware = middleware.name(),
                        status = reply.status().as_u16(),
                        "middleware answered the request"
                    );
                    return Ok(reply);
                }
            }
        }

        let raw = RawInput {
            body: parsed.body,
            query: parsed.query,
            params: parsed.params,
            headers: parsed.headers,
            context,
            request: request_ctx,
        };

        let handler = contract.handler();
        let reply = AssertUnwindSafe(async { handler(raw).await })
            .catch_unwind()
            .await
            .map_err(|panic| {
                ContractError::internal(format!(
                    "handler panicked: {}",
                    panic_message(panic.as_ref())
                ))
            })??;

        self.check_reply(contract, reply)
    }

    /// Validates a handler reply against the contract's declared responses.
    fn check_reply(&self, contract: &Contract, mut reply: Reply) -> Result<Reply, ContractError> {
        if !self.settings.validate_responses {
            return Ok(reply);
        }

        let operation_id = contract.operation_id();
        let status = reply.status();

        let Some(spec) = contract.response_for(status) else {
            if self.settings.reject_undeclared_status {
                record_validation_failure(operation_id, "response");
                return Err(ContractError::response_validation(
                    operation_id,
                    Issues::from(vec![Issue::new(
                        IssuePath::root().key("status"),
                        format!("Status {} is not declared", status.as_u16()),
                    )]),
                ));
            }
            tracing::warn!(
                operation_id,
                status = status.as_u16(),
                "handler returned an undeclared status"
            );
            return Ok(reply);
        };

        let body_path = IssuePath::root().key("body");
        match &spec.schema {
            Some(schema) => match schema.parse_at(reply.body(), &body_path) {
                Ok(parsed) => {
                    if reply.body().is_some() || !parsed.is_null() {
                        reply.set_body(Some(parsed));
                    }
                    Ok(reply)
                }
                Err(issues) => {
                    record_validation_failure(operation_id, "response");
                    Err(ContractError::response_validation(operation_id, issues))
                }
            },
            None if reply.body().is_some() => {
                record_validation_failure(operation_id, "response");
                Err(ContractError::response_validation(
                    operation_id,
                    Issues::from(vec![Issue::new(body_path, "Expected empty body")]),
                ))
            }
            None => Ok(reply),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

fn log_failure(operation_id: &str, request_id: &str, error: &ContractError) {
    match error {
        ContractError::ResponseValidation { issues, .. } => {
            let details: Vec<String> = issues.iter().map(ToString::to_string).collect();
            tracing::error!(
                operation_id,
                request_id,
                issue_count = issues.len(),
                issues = ?details,
                "response validation failed"
            );
        }
        ContractError::Validation { issues, .. } => {
            tracing::debug!(
                operation_id,
                request_id,
                issue_count = issues.len(),
                "request validation failed"
            );
        }
        other if other.status_code().is_server_error() => {
            tracing::error!(operation_id, request_id, error = %other, "request failed");
        }
        other => {
            tracing::debug!(operation_id, request_id, error = %other, "request rejected");
        }
    }
}
