//! Mutable per-request state shared by HTTP middleware.
//!
//! [`MiddlewareContext`] lives for one request. HTTP middleware fills it in
//! (the request id, the matched operation) and the contract pipeline turns
//! it into the immutable [`RequestContext`] handed to middleware contracts
//! and handlers.

use covenant_core::{RequestContext, RequestId};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::time::Instant;

/// Context passed through the HTTP middleware chain.
///
/// # Example
///
/// ```
/// use covenant_middleware::MiddlewareContext;
///
/// let mut ctx = MiddlewareContext::new();
/// ctx.set_operation_id("getUser");
/// assert_eq!(ctx.operation_id(), Some("getUser"));
/// ```
pub struct MiddlewareContext {
    request_id: RequestId,
    operation_id: Option<String>,
    trace_id: Option<String>,
    started_at: Instant,
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl std::fmt::Debug for MiddlewareContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareContext")
            .field("request_id", &self.request_id)
            .field("operation_id", &self.operation_id)
            .field("trace_id", &self.trace_id)
            .field("extensions", &self.extensions.len())
            .finish_non_exhaustive()
    }
}

impl MiddlewareContext {
    /// Creates a context with a fresh request id.
    #[must_use]
    pub fn new() -> Self {
        Self::with_request_id(RequestId::new())
    }

    /// Creates a context with the given request id.
    #[must_use]
    pub fn with_request_id(request_id: RequestId) -> Self {
        Self {
            request_id,
            operation_id: None,
            trace_id: None,
            started_at: Instant::now(),
            extensions: HashMap::new(),
        }
    }

    /// Returns the request id.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Replaces the request id.
    pub fn set_request_id(&mut self, request_id: RequestId) {
        self.request_id = request_id;
    }

    /// Returns the matched operation id, if routing has happened.
    #[must_use]
    pub fn operation_id(&self) -> Option<&str> {
        self.operation_id.as_deref()
    }

    /// Records the matched operation id.
    pub fn set_operation_id(&mut self, operation_id: impl Into<String>) {
        self.operation_id = Some(operation_id.into());
    }

    /// Returns the propagated trace id.
    #[must_use]
    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// Records a trace id received from the caller.
    pub fn set_trace_id(&mut self, trace_id: impl Into<String>) {
        self.trace_id = Some(trace_id.into());
    }

    /// Time since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Stores a typed extension value, replacing any previous one.
    pub fn set_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Returns a typed extension value.
    #[must_use]
    pub fn get_extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    /// Removes and returns a typed extension value.
    pub fn remove_extension<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast().ok())
            .map(|b| *b)
    }

    /// Converts this context into the [`RequestContext`] seen by contracts.
    #[must_use]
    pub fn to_request_context(&self) -> RequestContext {
        let mut ctx = RequestContext::with_request_id(self.request_id);
        if let Some(trace_id) = &self.trace_id {
            ctx = ctx.with_trace_id(trace_id.clone());
        }
        if let Some(op_id) = &self.operation_id {
            ctx = ctx.with_operation_id(op_id.clone());
        }
        ctx
    }
}

impl Default for MiddlewareContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_operation_id() {
        let mut ctx = MiddlewareContext::new();
        assert!(ctx.operation_id().is_none());

        ctx.set_operation_id("getUser");
        assert_eq!(ctx.operation_id(), Some("getUser"));
    }

    #[test]
    fn test_extensions() {
        #[derive(Debug, Clone, PartialEq)]
        struct Tenant(&'static str);

        let mut ctx = MiddlewareContext::new();
        assert!(ctx.get_extension::<Tenant>().is_none());

        ctx.set_extension(Tenant("acme"));
        assert_eq!(ctx.get_extension::<Tenant>(), Some(&Tenant("acme")));

        assert_eq!(ctx.remove_extension::<Tenant>(), Some(Tenant("acme")));
        assert!(ctx.get_extension::<Tenant>().is_none());
    }

    #[test]
    fn test_elapsed_time() {
        let ctx = MiddlewareContext::new();
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(ctx.elapsed() >= std::time::Duration::from_millis(10));
    }

    #[test]
    fn test_to_request_context() {
        let mut ctx = MiddlewareContext::new();
        ctx.set_trace_id("trace-123");
        ctx.set_operation_id("createUser");

        let req_ctx = ctx.to_request_context();
        assert_eq!(req_ctx.request_id(), ctx.request_id());
        assert_eq!(req_ctx.trace_id(), Some("trace-123"));
        assert_eq!(req_ctx.operation_id(), Some("createUser"));
    }
}
