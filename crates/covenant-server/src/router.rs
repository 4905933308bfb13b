//! Request routing and duplicate detection.
//!
//! The router maps an incoming method and path to the [`Contract`] that
//! owns it. Routes are keyed by method plus normalized path, so
//! `/users/{id}` and `/users/{userId}` on the same method collide at
//! registration instead of shadowing each other at request time.
//!
//! Registration takes `&mut self`; [`Router::freeze`] then moves the table
//! behind an `Arc` so request handling only ever reads it.
//!
//! # Example
//!
//! ```rust
//! use covenant_core::fixtures;
//! use covenant_server::{RouteMatch, Router};
//! use http::Method;
//!
//! let mut router = Router::new();
//! for contract in fixtures::user_service_contracts().unwrap() {
//!     router.register(contract).unwrap();
//! }
//!
//! match router.match_route(&Method::GET, "/users/42") {
//!     RouteMatch::Found { contract, params } => {
//!         assert_eq!(contract.operation_id(), "getUser");
//!         assert_eq!(params["userId"], "42");
//!     }
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use covenant_core::contract::Segment;
use covenant_core::{Contract, RouteKey};
use http::Method;

use crate::error::ServerError;

/// Outcome of matching a request against the router.
pub enum RouteMatch<'a> {
    /// A contract owns this method and path.
    Found {
        /// The matched contract.
        contract: &'a Arc<Contract>,
        /// Raw path parameters.
        params: HashMap<String, String>,
    },
    /// The path exists, but not for this method.
    MethodNotAllowed(Vec<Method>),
    /// No contract matches the path.
    NotFound,
}

impl fmt::Debug for RouteMatch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found { contract, params } => f
                .debug_struct("Found")
                .field("operation_id", &contract.operation_id())
                .field("params", params)
                .finish(),
            Self::MethodNotAllowed(allowed) => {
                f.debug_tuple("MethodNotAllowed").field(allowed).finish()
            }
            Self::NotFound => f.write_str("NotFound"),
        }
    }
}

/// Contract router.
#[derive(Default)]
pub struct Router {
    routes: Vec<Arc<Contract>>,
    keys: HashMap<RouteKey, String>,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.routes.iter().map(|c| c.route_key().to_string()))
            .finish()
    }
}

impl Router {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a contract.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::DuplicateRoute`] if another contract already
    /// owns the same method and normalized path, and
    /// [`ServerError::DuplicateOperationId`] if its operation id is taken.
    pub fn register(&mut self, contract: impl Into<Arc<Contract>>) -> Result<(), ServerError> {
        let contract = contract.into();
        let key = contract.route_key();

        if let Some(existing) = self.keys.get(&key) {
            return Err(ServerError::DuplicateRoute {
                method: key.method,
                path: key.path,
                existing: existing.clone(),
            });
        }

        if self.has_operation(contract.operation_id()) {
            return Err(ServerError::DuplicateOperationId {
                operation_id: contract.operation_id().to_string(),
            });
        }

        tracing::debug!(
            operation_id = contract.operation_id(),
            route = %key,
            "Registered contract"
        );
        self.keys.insert(key, contract.operation_id().to_string());
        self.routes.push(contract);
        Ok(())
    }

    /// Freezes the router for sharing across requests.
    #[must_use]
    pub fn freeze(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Matches a request.
    ///
    /// When several templates match the path, the one with more literal
    /// segments wins, so `/users/me` beats `/users/{id}`.
    #[must_use]
    pub fn match_route(&self, method: &Method, path: &str) -> RouteMatch<'_> {
        let mut best: Option<(usize, &Arc<Contract>, HashMap<String, String>)> = None;
        let mut allowed: Vec<Method> = Vec::new();

        for contract in &self.routes {
            let Some(params) = contract.match_path(path) else {
                continue;
            };

            if contract.method() != method {
                if !allowed.contains(contract.method()) {
                    allowed.push(contract.method().clone());
                }
                continue;
            }

            let score = literal_segments(contract);
            if best.as_ref().map_or(true, |(current, _, _)| score > *current) {
                best = Some((score, contract, params));
            }
        }

        match best {
            Some((_, contract, params)) => RouteMatch::Found { contract, params },
            None if !allowed.is_empty() => RouteMatch::MethodNotAllowed(allowed),
            None => RouteMatch::NotFound,
        }
    }

    /// Returns `true` if a contract with this operation id is registered.
    #[must_use]
    pub fn has_operation(&self, operation_id: &str) -> bool {
        self.routes.iter().any(|c| c.operation_id() == operation_id)
    }

    /// Registered contracts, in registration order.
    pub fn contracts(&self) -> impl Iterator<Item = &Contract> {
        self.routes.iter().map(AsRef::as_ref)
    }

    /// Number of registered routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn literal_segments(contract: &Contract) -> usize {
    contract
        .path()
        .segments()
        .iter()
        .filter(|s| matches!(s, Segment::Literal(_)))
        .count()
}
