//! Ordered HTTP middleware stack.
//!
//! Layers run in the order they were added; the endpoint runs last.
//!
//! ```text
//! Request → layer 1 → layer 2 → ... → endpoint
//! Response ← layer 1 ← layer 2 ← ... ←──┘
//! ```
//!
//! The stack is immutable once built.

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};

/// An immutable, ordered list of HTTP middleware.
///
/// # Example
///
/// ```
/// use covenant_middleware::stages::RequestIdMiddleware;
/// use covenant_middleware::MiddlewareStack;
///
/// let stack = MiddlewareStack::builder()
///     .layer(RequestIdMiddleware::new())
///     .build();
///
/// assert_eq!(stack.names(), ["request_id"]);
/// ```
#[derive(Default)]
pub struct MiddlewareStack {
    layers: Vec<Box<dyn Middleware>>,
}

impl std::fmt::Debug for MiddlewareStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareStack")
            .field("layers", &self.names())
            .finish()
    }
}

impl MiddlewareStack {
    /// Creates a new stack builder.
    #[must_use]
    pub fn builder() -> MiddlewareStackBuilder {
        MiddlewareStackBuilder::default()
    }

    /// Runs `request` through every layer and then `endpoint`.
    pub async fn process<H>(&self, ctx: &mut MiddlewareContext, request: Request, endpoint: H) -> Response
    where
        H: FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send,
    {
        self.build_chain(endpoint).run(ctx, request).await
    }

    /// Builds the chain from back to front.
    fn build_chain<'a, H>(&'a self, endpoint: H) -> Next<'a>
    where
        H: FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'a,
    {
        let mut next = Next::handler(endpoint);
        for middleware in self.layers.iter().rev() {
            next = Next::new(middleware.as_ref(), next);
        }
        next
    }

    /// Names of the layers, in execution order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.layers.iter().map(|m| m.name()).collect()
    }

    /// Number of layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns `true` if the stack has no layers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// Builder for [`MiddlewareStack`].
#[derive(Default)]
pub struct MiddlewareStackBuilder {
    layers: Vec<Box<dyn Middleware>>,
}

impl MiddlewareStackBuilder {
    /// Appends a layer.
    #[must_use]
    pub fn layer<M: Middleware>(mut self, middleware: M) -> Self {
        self.layers.push(Box::new(middleware));
        self
    }

    /// Appends an already boxed layer.
    #[must_use]
    pub fn layer_boxed(mut self, middleware: Box<dyn Middleware>) -> Self {
        self.layers.push(middleware);
        self
    }

    /// Builds the stack.
    #[must_use]
    pub fn build(self) -> MiddlewareStack {
        MiddlewareStack {
            layers: self.layers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{Request as HttpRequest, Response as HttpResponse, StatusCode};
    use http_body_util::Full;
    use std::sync::{Arc, Mutex};

    struct OrderTracking {
        name: &'static str,
        order: Arc<Mutex<Vec<String>>>,
    }

    impl Middleware for OrderTracking {
        fn name(&self) -> &'static str {
            self.name
        }

        fn process<'a>(
            &'a self,
            ctx: &'a mut MiddlewareContext,
            request: Request,
            next: Next<'a>,
        ) -> BoxFuture<'a, Response> {
            Box::pin(async move {
                self.order.lock().unwrap().push(format!("{}:in", self.name));
                let response = next.run(ctx, request).await;
                self.order.lock().unwrap().push(format!("{}:out", self.name));
                response
            })
        }
    }

    struct Deny;

    impl Middleware for Deny {
        fn name(&self) -> &'static str {
            "deny"
        }

        fn process<'a>(
            &'a self,
            _ctx: &'a mut MiddlewareContext,
            _request: Request,
            _next: Next<'a>,
        ) -> BoxFuture<'a, Response> {
            Box::pin(async {
                HttpResponse::builder()
                    .status(StatusCode::FORBIDDEN)
                    .body(Full::new(Bytes::new()))
                    .unwrap()
            })
        }
    }

    fn request() -> Request {
        HttpRequest::builder()
            .uri("/test")
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    fn endpoint(
        order: Arc<Mutex<Vec<String>>>,
    ) -> impl FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send {
        move |_ctx, _req| {
            Box::pin(async move {
                order.lock().unwrap().push("endpoint".to_string());
                HttpResponse::builder()
                    .status(StatusCode::OK)
                    .body(Full::new(Bytes::from("OK")))
                    .unwrap()
            })
        }
    }

    #[tokio::test]
    async fn test_stack_executes_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let stack = MiddlewareStack::builder()
            .layer(OrderTracking {
                name: "outer",
                order: Arc::clone(&order),
            })
            .layer(OrderTracking {
                name: "inner",
                order: Arc::clone(&order),
            })
            .build();

        let mut ctx = MiddlewareContext::new();
        let response = stack
            .process(&mut ctx, request(), endpoint(Arc::clone(&order)))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            *order.lock().unwrap(),
            ["outer:in", "inner:in", "endpoint", "inner:out", "outer:out"]
        );
        assert_eq!(stack.names(), ["outer", "inner"]);
    }

    #[tokio::test]
    async fn test_short_circuit_skips_endpoint() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let stack = MiddlewareStack::builder().layer(Deny).build();

        let mut ctx = MiddlewareContext::new();
        let response = stack
            .process(&mut ctx, request(), endpoint(Arc::clone(&order)))
            .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(order.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_stack() {
        let stack = MiddlewareStack::builder().build();
        assert!(stack.is_empty());

        let order = Arc::new(Mutex::new(Vec::new()));
        let mut ctx = MiddlewareContext::new();
        let response = stack
            .process(&mut ctx, request(), endpoint(Arc::clone(&order)))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*order.lock().unwrap(), ["endpoint"]);
    }
}
