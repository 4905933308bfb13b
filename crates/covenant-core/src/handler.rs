//! Handlers and replies.
//!
//! A contract handler receives an [`Input`] holding the already validated
//! body, query, params and headers (deserialized into the types the handler
//! asks for) together with the context built by middleware contracts. It
//! returns a [`Reply`], which is checked against the contract's declared
//! responses before it is sent.

use crate::context::{Context, RequestContext};
use crate::error::ContractError;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Type-erased contract handler stored inside a [`Contract`](crate::Contract).
pub type ErasedHandler =
    Arc<dyn Fn(RawInput) -> BoxFuture<'static, Result<Reply, ContractError>> + Send + Sync>;

/// Validated request parts as JSON, before they are decoded for a handler.
#[derive(Debug, Clone)]
pub struct RawInput {
    /// Parsed body (`null` when the contract declares none).
    pub body: Value,
    /// Parsed query object.
    pub query: Value,
    /// Parsed path parameters.
    pub params: Value,
    /// Parsed headers.
    pub headers: Value,
    /// Context contributed by middleware contracts.
    pub context: Context,
    /// Request metadata.
    pub request: RequestContext,
}

impl RawInput {
    /// Decodes the parts into the handler's types.
    ///
    /// The values were already validated, so a failure here means the
    /// handler's types disagree with its schemas. That is a server bug and
    /// is reported as an internal error.
    pub fn decode<B, Q, P, H>(self) -> Result<Input<B, Q, P, H>, ContractError>
    where
        B: DeserializeOwned,
        Q: DeserializeOwned,
        P: DeserializeOwned,
        H: DeserializeOwned,
    {
        Ok(Input {
            body: decode_part("body", self.body)?,
            query: decode_part("query", self.query)?,
            params: decode_part("params", self.params)?,
            headers: decode_part("headers", self.headers)?,
            context: self.context,
            request: self.request,
        })
    }
}

fn decode_part<T: DeserializeOwned>(part: &str, value: Value) -> Result<T, ContractError> {
    serde_json::from_value(value).map_err(|e| {
        ContractError::internal_with_source(
            format!("validated {part} does not match the handler's type"),
            e,
        )
    })
}

/// Typed input handed to a contract handler.
///
/// Every part defaults to [`serde_json::Value`], so handlers only name the
/// types they care about:
///
/// ```
/// use covenant_core::Input;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct CreateUser {
///     name: String,
/// }
///
/// fn greeting(input: &Input<CreateUser>) -> String {
///     format!("hello {}", input.body.name)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Input<B = Value, Q = Value, P = Value, H = Value> {
    /// Request body.
    pub body: B,
    /// Query parameters.
    pub query: Q,
    /// Path parameters.
    pub params: P,
    /// Request headers declared by the contract.
    pub headers: H,
    /// Context contributed by middleware contracts.
    pub context: Context,
    /// Request metadata.
    pub request: RequestContext,
}

/// A handler's reply: status, optional JSON body and extra headers.
#[derive(Debug, Clone)]
pub struct Reply {
    status: StatusCode,
    body: Option<Value>,
    headers: HeaderMap,
}

impl Reply {
    /// A reply with the given status and JSON body.
    #[must_use]
    pub fn json(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            body: Some(body),
            headers: HeaderMap::new(),
        }
    }

    /// Serializes `body` into a reply with the given status.
    pub fn with_status<T: Serialize>(status: StatusCode, body: &T) -> Result<Self, ContractError> {
        Ok(Self::json(status, serde_json::to_value(body)?))
    }

    /// `200 OK` with a serialized body.
    pub fn ok<T: Serialize>(body: &T) -> Result<Self, ContractError> {
        Self::with_status(StatusCode::OK, body)
    }

    /// `201 Created` with a serialized body.
    pub fn created<T: Serialize>(body: &T) -> Result<Self, ContractError> {
        Self::with_status(StatusCode::CREATED, body)
    }

    /// A reply with no body.
    #[must_use]
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            body: None,
            headers: HeaderMap::new(),
        }
    }

    /// `204 No Content`.
    #[must_use]
    pub fn no_content() -> Self {
        Self::empty(StatusCode::NO_CONTENT)
    }

    /// Adds a response header.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// The status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The body, if any.
    #[must_use]
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Replaces the body.
    pub fn set_body(&mut self, body: Option<Value>) {
        self.body = body;
    }

    /// Extra headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Splits the reply into its parts.
    #[must_use]
    pub fn into_parts(self) -> (StatusCode, Option<Value>, HeaderMap) {
        (self.status, self.body, self.headers)
    }
}

/// A contract handler.
///
/// Implemented for every `Fn(Input<B, Q, P, H>) -> impl Future<Output =
/// Result<Reply, ContractError>>`, and can be implemented by hand for
/// handlers that carry state.
///
/// # Example
///
/// ```
/// use covenant_core::{ContractError, Handler, Input, Reply};
/// use serde_json::{json, Value};
///
/// struct Echo;
///
/// impl Handler<Value> for Echo {
///     async fn handle(&self, input: Input<Value>) -> Result<Reply, ContractError> {
///         Reply::ok(&json!({ "echo": input.body }))
///     }
/// }
/// ```
pub trait Handler<B = Value, Q = Value, P = Value, H = Value>: Send + Sync + 'static {
    /// Handles one validated request.
    fn handle(
        &self,
        input: Input<B, Q, P, H>,
    ) -> impl Future<Output = Result<Reply, ContractError>> + Send;
}

impl<F, Fut, B, Q, P, H> Handler<B, Q, P, H> for F
where
    F: Fn(Input<B, Q, P, H>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply, ContractError>> + Send,
{
    fn handle(
        &self,
        input: Input<B, Q, P, H>,
    ) -> impl Future<Output = Result<Reply, ContractError>> + Send {
        self(input)
    }
}

/// Erases a typed handler into an [`ErasedHandler`].
pub fn erase<T, B, Q, P, H>(handler: T) -> ErasedHandler
where
    T: Handler<B, Q, P, H>,
    B: DeserializeOwned + Send + 'static,
    Q: DeserializeOwned + Send + 'static,
    P: DeserializeOwned + Send + 'static,
    H: DeserializeOwned + Send + 'static,
{
    let handler = Arc::new(handler);
    Arc::new(move |raw: RawInput| -> BoxFuture<'static, Result<Reply, ContractError>> {
        let handler = Arc::clone(&handler);
        Box::pin(async move {
            let input = raw.decode::<B, Q, P, H>()?;
            handler.handle(input).await
        })
    })
}
