//! Contracts: declarative route definitions.
//!
//! A [`Contract`] binds an HTTP method and path template to the schemas of
//! every request part, the schemas of every response status, an ordered list
//! of middleware contracts, and the handler.
//!
//! # Example
//!
//! ```
//! use covenant_core::{Contract, ContractError, Input, Reply, Schema};
//! use http::{Method, StatusCode};
//! use serde_json::{json, Value};
//!
//! let contract = Contract::builder(Method::POST, "/users")
//!     .operation_id("createUser")
//!     .body(Schema::object([
//!         ("name", Schema::string().min_length(1)),
//!         ("email", Schema::string().format("email")),
//!     ]))
//!     .response(
//!         StatusCode::CREATED,
//!         "user created",
//!         Schema::object([("id", Schema::integer())]),
//!     )
//!     .handler(|_input: Input<Value>| async move { Reply::created(&json!({ "id": 1 })) })
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(contract.operation_id(), "createUser");
//! assert!(contract.response_for(StatusCode::CREATED).is_some());
//! ```

use crate::error::ContractError;
use crate::guard::MiddlewareContract;
use crate::handler::{erase, ErasedHandler, Handler};
use crate::schema::Schema;
use http::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Schemas for the four request parts.
///
/// `headers`, `query` and `params` must be object schemas. Header property
/// names are matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct RequestShape {
    /// Request body schema.
    pub body: Option<Schema>,
    /// Header schema.
    pub headers: Option<Schema>,
    /// Query string schema.
    pub query: Option<Schema>,
    /// Path parameter schema.
    pub params: Option<Schema>,
}

impl RequestShape {
    /// Returns `true` if no part is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.body.is_none() && self.headers.is_none() && self.query.is_none() && self.params.is_none()
    }

    /// Checks that the string-sourced parts are object schemas.
    pub(crate) fn check(&self, owner: &str) -> Result<(), ContractError> {
        for (part, schema) in [
            ("headers", &self.headers),
            ("query", &self.query),
            ("params", &self.params),
        ] {
            if let Some(schema) = schema {
                if schema.object_properties().is_none() {
                    return Err(ContractError::definition(format!(
                        "{owner}: {part} schema must be an object"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A declared response.
#[derive(Debug, Clone)]
pub struct ResponseSpec {
    /// Human-readable description.
    pub description: String,
    /// Body schema; `None` for empty responses.
    pub schema: Option<Schema>,
}

/// One segment of a [`PathTemplate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A literal segment (e.g., `users`).
    Literal(String),
    /// A parameter segment (e.g., `{id}` or `:id`).
    Param(String),
}

/// A parsed route path such as `/users/{id}/posts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Parses a template. Both `{id}` and `:id` parameter syntaxes are accepted.
    pub fn parse(raw: &str) -> Result<Self, ContractError> {
        if !raw.starts_with('/') {
            return Err(ContractError::definition(format!(
                "path '{raw}' must start with '/'"
            )));
        }

        let mut seen = HashSet::new();
        let mut segments = Vec::new();
        for part in raw.split('/').filter(|s| !s.is_empty()) {
            let segment = if let Some(inner) = part.strip_prefix('{') {
                let name = inner.strip_suffix('}').ok_or_else(|| {
                    ContractError::definition(format!("unclosed parameter in path '{raw}'"))
                })?;
                Segment::Param(name.to_string())
            } else if let Some(name) = part.strip_prefix(':') {
                Segment::Param(name.to_string())
            } else if part.contains('{') || part.contains('}') {
                return Err(ContractError::definition(format!(
                    "parameters must span a whole segment in path '{raw}'"
                )));
            } else {
                Segment::Literal(part.to_string())
            };

            if let Segment::Param(name) = &segment {
                if name.is_empty() {
                    return Err(ContractError::definition(format!(
                        "empty parameter name in path '{raw}'"
                    )));
                }
                if !seen.insert(name.clone()) {
                    return Err(ContractError::definition(format!(
                        "parameter '{name}' appears twice in path '{raw}'"
                    )));
                }
            }
            segments.push(segment);
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The template as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The parsed segments.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Parameter names in order of appearance.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// The template in `{name}` form.
    #[must_use]
    pub fn openapi_path(&self) -> String {
        self.render(|name| format!("{{{name}}}"))
    }

    /// The template with parameter names erased, used to detect collisions.
    #[must_use]
    pub fn normalized(&self) -> String {
        self.render(|_| "{}".to_string())
    }

    fn render(&self, param: impl Fn(&str) -> String) -> String {
        if self.segments.is_empty() {
            return "/".to_string();
        }
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Literal(lit) => format!("/{lit}"),
                Segment::Param(name) => format!("/{}", param(name)),
            })
            .collect()
    }

    /// Matches a request path, returning percent-decoded parameters.
    #[must_use]
    pub fn matches(&self, request_path: &str) -> Option<HashMap<String, String>> {
        let request_segments: Vec<&str> = request_path
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        if request_segments.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (pattern, actual) in self.segments.iter().zip(request_segments) {
            match pattern {
                Segment::Literal(lit) => {
                    if lit != actual {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = urlencoding::decode(actual)
                        .map_or_else(|_| actual.to_string(), |v| v.into_owned());
                    params.insert(name.clone(), value);
                }
            }
        }
        Some(params)
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Identity of a route for duplicate detection: method plus normalized path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    /// HTTP method.
    pub method: Method,
    /// Path with parameter names erased.
    pub path: String,
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// A declarative route definition with its handler.
#[derive(Clone)]
pub struct Contract {
    operation_id: String,
    method: Method,
    path: PathTemplate,
    summary: Option<String>,
    description: Option<String>,
    tags: Vec<String>,
    deprecated: bool,
    request: RequestShape,
    responses: BTreeMap<u16, ResponseSpec>,
    middlewares: Vec<Arc<MiddlewareContract>>,
    handler: ErasedHandler,
}

impl fmt::Debug for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contract")
            .field("operation_id", &self.operation_id)
            .field("method", &self.method)
            .field("path", &self.path.as_str())
            .field("request", &self.request)
            .field("responses", &self.responses.keys().collect::<Vec<_>>())
            .field(
                "middlewares",
                &self.middlewares.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl Contract {
    /// Starts a contract for `method` and `path`.
    #[must_use]
    pub fn builder(method: Method, path: impl Into<String>) -> ContractBuilder {
        ContractBuilder::new(method, path)
    }

    /// The operation ID.
    #[must_use]
    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    /// The HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The path template.
    #[must_use]
    pub fn path(&self) -> &PathTemplate {
        &self.path
    }

    /// One-line summary.
    #[must_use]
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Longer description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Grouping tags.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Whether the route is deprecated.
    #[must_use]
    pub fn is_deprecated(&self) -> bool {
        self.deprecated
    }

    /// The declared request parts.
    #[must_use]
    pub fn request(&self) -> &RequestShape {
        &self.request
    }

    /// Declared responses keyed by status code.
    #[must_use]
    pub fn responses(&self) -> &BTreeMap<u16, ResponseSpec> {
        &self.responses
    }

    /// The declared response for `status`.
    #[must_use]
    pub fn response_for(&self, status: StatusCode) -> Option<&ResponseSpec> {
        self.responses.get(&status.as_u16())
    }

    /// Middleware contracts in execution order.
    #[must_use]
    pub fn middlewares(&self) -> &[Arc<MiddlewareContract>] {
        &self.middlewares
    }

    /// The erased handler.
    #[must_use]
    pub fn handler(&self) -> &ErasedHandler {
        &self.handler
    }

    /// Matches a request path against this contract's template.
    #[must_use]
    pub fn match_path(&self, request_path: &str) -> Option<HashMap<String, String>> {
        self.path.matches(request_path)
    }

    /// The key used to detect duplicate registrations.
    #[must_use]
    pub fn route_key(&self) -> RouteKey {
        RouteKey {
            method: self.method.clone(),
            path: self.path.normalized(),
        }
    }
}

/// Builder for [`Contract`].
pub struct ContractBuilder {
    method: Method,
    path: String,
    operation_id: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    tags: Vec<String>,
    deprecated: bool,
    request: RequestShape,
    responses: BTreeMap<u16, ResponseSpec>,
    middlewares: Vec<Arc<MiddlewareContract>>,
    handler: Option<ErasedHandler>,
}

impl ContractBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            operation_id: None,
            summary: None,
            description: None,
            tags: Vec::new(),
            deprecated: false,
            request: RequestShape::default(),
            responses: BTreeMap::new(),
            middlewares: Vec::new(),
            handler: None,
        }
    }

    /// Sets the operation ID. Defaults to `<method>_<path segments>`.
    #[must_use]
    pub fn operation_id(mut self, operation_id: impl Into<String>) -> Self {
        self.operation_id = Some(operation_id.into());
        self
    }

    /// Sets the summary.
    #[must_use]
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds a tag.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Marks the route as deprecated.
    #[must_use]
    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
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
    ///
    /// When omitted, every template parameter is a required string.
    #[must_use]
    pub fn params(mut self, schema: Schema) -> Self {
        self.request.params = Some(schema);
        self
    }

    /// Declares a response with a body.
    #[must_use]
    pub fn response(
        mut self,
        status: StatusCode,
        description: impl Into<String>,
        schema: Schema,
    ) -> Self {
        self.responses.insert(
            status.as_u16(),
            ResponseSpec {
                description: description.into(),
                schema: Some(schema),
            },
        );
        self
    }

    /// Declares a response without a body.
    #[must_use]
    pub fn response_empty(mut self, status: StatusCode, description: impl Into<String>) -> Self {
        self.responses.insert(
            status.as_u16(),
            ResponseSpec {
                description: description.into(),
                schema: None,
            },
        );
        self
    }

    /// Appends a middleware contract. Middlewares run in the order added.
    #[must_use]
    pub fn middleware(mut self, middleware: Arc<MiddlewareContract>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Sets the handler.
    #[must_use]
    pub fn handler<T, B, Q, P, H>(mut self, handler: T) -> Self
    where
        T: Handler<B, Q, P, H>,
        B: DeserializeOwned + Send + 'static,
        Q: DeserializeOwned + Send + 'static,
        P: DeserializeOwned + Send + 'static,
        H: DeserializeOwned + Send + 'static,
    {
        self.handler = Some(erase(handler));
        self
    }

    /// Builds the contract, checking that its parts agree with each other.
    pub fn build(self) -> Result<Contract, ContractError> {
        let path = PathTemplate::parse(&self.path)?;
        let operation_id = self
            .operation_id
            .unwrap_or_else(|| default_operation_id(&self.method, &path));

        let handler = self.handler.ok_or_else(|| {
            ContractError::definition(format!("{operation_id}: no handler was provided"))
        })?;

        let mut request = self.request;
        request.check(&operation_id)?;

        let template_params: Vec<&str> = path.param_names().collect();
        match &request.params {
            Some(schema) => {
                let declared: HashSet<&str> = schema
                    .object_properties()
                    .map(|props| props.keys().map(String::as_str).collect())
                    .unwrap_or_default();
                let expected: HashSet<&str> = template_params.iter().copied().collect();
                if declared != expected {
                    return Err(ContractError::definition(format!(
                        "{operation_id}: params schema declares {:?} but path '{path}' has {:?}",
                        sorted(&declared),
                        sorted(&expected),
                    )));
                }
            }
            None if !template_params.is_empty() => {
                request.params = Some(Schema::object(
                    template_params.iter().map(|name| (*name, Schema::string())),
                ));
            }
            None => {}
        }

        Ok(Contract {
            operation_id,
            method: self.method,
            path,
            summary: self.summary,
            description: self.description,
            tags: self.tags,
            deprecated: self.deprecated,
            request,
            responses: self.responses,
            middlewares: self.middlewares,
            handler,
        })
    }
}

fn sorted<'a>(set: &HashSet<&'a str>) -> Vec<&'a str> {
    let mut names: Vec<&str> = set.iter().copied().collect();
    names.sort_unstable();
    names
}

fn default_operation_id(method: &Method, path: &PathTemplate) -> String {
    let mut id = method.as_str().to_ascii_lowercase();
    for segment in path.segments() {
        let name = match segment {
            Segment::Literal(lit) | Segment::Param(lit) => lit,
        };
        id.push('_');
        id.extend(
            name.chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }),
        );
    }
    id
}
