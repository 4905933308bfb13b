//! OpenAPI specification types and generation.
//!
//! This module provides types that represent the OpenAPI 3.1 specification
//! and a generator that converts contracts into an OpenAPI document.
//!
//! ## OpenAPI 3.1 Compliance
//!
//! The types in this module follow the OpenAPI 3.1 specification:
//! <https://spec.openapis.org/oas/v3.1.0>
//!
//! Nullable schemas use 3.1 type arrays (`["string", "null"]`) rather than
//! the 3.0 `nullable` keyword.

use covenant_core::guard::ApiKeyLocation;
use covenant_core::schema::{SchemaKind, UnknownKeys};
use covenant_core::{Contract, Schema as ContractSchema, SecurityScheme as ContractSecurity};
use http::Method;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::{BTreeMap, HashSet};

use crate::error::{DocsError, DocsResult};

/// OpenAPI version emitted by the generator.
pub const OPENAPI_VERSION: &str = "3.1.0";

/// Name of the shared validation error schema in `components.schemas`.
pub const VALIDATION_ERROR_SCHEMA: &str = "ValidationError";

const APPLICATION_JSON: &str = "application/json";

/// OpenAPI document root object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenApi {
    /// OpenAPI version (always "3.1.0").
    pub openapi: String,
    /// API metadata.
    pub info: Info,
    /// Available servers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Server>,
    /// API paths and operations.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub paths: IndexMap<String, PathItem>,
    /// Reusable components (schemas, security schemes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
    /// Tags for API grouping.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

impl OpenApi {
    /// Looks up an operation by path and method.
    #[must_use]
    pub fn operation(&self, path: &str, method: &Method) -> Option<&Operation> {
        self.paths.get(path)?.operation(method)
    }
}

/// API metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Info {
    /// API title.
    pub title: String,
    /// API version.
    pub version: String,
    /// API description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Contact information.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
    /// License information.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,
}

/// Contact information.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Contact {
    /// Contact name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Contact URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Contact email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// License information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct License {
    /// License name.
    pub name: String,
    /// License URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Server information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    /// Server URL.
    pub url: String,
    /// Server description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A path item containing operations for a single path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathItem {
    /// GET operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    /// PUT operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    /// POST operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    /// DELETE operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    /// OPTIONS operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
    /// HEAD operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
    /// PATCH operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
    /// TRACE operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<Operation>,
}

impl PathItem {
    /// The operation for `method`, if any.
    #[must_use]
    pub fn operation(&self, method: &Method) -> Option<&Operation> {
        match *method {
            Method::GET => self.get.as_ref(),
            Method::PUT => self.put.as_ref(),
            Method::POST => self.post.as_ref(),
            Method::DELETE => self.delete.as_ref(),
            Method::OPTIONS => self.options.as_ref(),
            Method::HEAD => self.head.as_ref(),
            Method::PATCH => self.patch.as_ref(),
            Method::TRACE => self.trace.as_ref(),
            _ => None,
        }
    }

    fn slot(&mut self, method: &Method) -> Option<&mut Option<Operation>> {
        match *method {
            Method::GET => Some(&mut self.get),
            Method::PUT => Some(&mut self.put),
            Method::POST => Some(&mut self.post),
            Method::DELETE => Some(&mut self.delete),
            Method::OPTIONS => Some(&mut self.options),
            Method::HEAD => Some(&mut self.head),
            Method::PATCH => Some(&mut self.patch),
            Method::TRACE => Some(&mut self.trace),
            _ => None,
        }
    }
}

/// An API operation (endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    /// Unique operation identifier.
    #[serde(rename = "operationId")]
    pub operation_id: String,
    /// Short summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Full description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Tags for grouping.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Whether deprecated.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
    /// Parameters.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    /// Request body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "requestBody")]
    pub request_body: Option<RequestBody>,
    /// Responses keyed by status code.
    pub responses: IndexMap<String, Response>,
    /// Security requirements.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security: Vec<SecurityRequirement>,
}

/// Parameter location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterIn {
    /// Query string parameter.
    Query,
    /// URL path parameter.
    Path,
    /// HTTP header.
    Header,
}

/// An operation parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name.
    pub name: String,
    /// Parameter location.
    #[serde(rename = "in")]
    pub location: ParameterIn,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether required.
    #[serde(default)]
    pub required: bool,
    /// Parameter schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

/// Request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestBody {
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether required.
    #[serde(default)]
    pub required: bool,
    /// Content by media type.
    pub content: IndexMap<String, MediaType>,
}

/// Media type content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaType {
    /// Schema for this media type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

/// Response definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Description (required).
    pub description: String,
    /// Response content by media type.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub content: IndexMap<String, MediaType>,
}

impl Response {
    fn json(description: impl Into<String>, schema: Option<Schema>) -> Self {
        let content = schema.map(json_content).unwrap_or_default();
        Self {
            description: description.into(),
            content,
        }
    }
}

fn json_content(schema: Schema) -> IndexMap<String, MediaType> {
    IndexMap::from([(
        APPLICATION_JSON.to_string(),
        MediaType {
            schema: Some(schema),
        },
    )])
}

/// Reusable components.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Components {
    /// Reusable schemas.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub schemas: IndexMap<String, Schema>,
    /// Security schemes.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    #[serde(rename = "securitySchemes")]
    pub security_schemes: IndexMap<String, SecurityScheme>,
}

impl Components {
    fn is_empty(&self) -> bool {
        self.schemas.is_empty() && self.security_schemes.is_empty()
    }
}

/// Security scheme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityScheme {
    /// Security scheme type.
    #[serde(rename = "type")]
    pub scheme_type: String,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// HTTP auth scheme name (for type=http).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    /// Bearer token format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "bearerFormat")]
    pub bearer_format: Option<String>,
    /// API key location (for type=apiKey).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "in")]
    pub location: Option<String>,
    /// API key name (for type=apiKey).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl SecurityScheme {
    fn from_contract(scheme: &ContractSecurity, description: Option<&str>) -> Self {
        let description = description.map(ToString::to_string);
        match scheme {
            ContractSecurity::Bearer { format } => Self {
                scheme_type: "http".to_string(),
                description,
                scheme: Some("bearer".to_string()),
                bearer_format: format.clone(),
                location: None,
                name: None,
            },
            ContractSecurity::ApiKey { name, location } => Self {
                scheme_type: "apiKey".to_string(),
                description,
                scheme: None,
                bearer_format: None,
                location: Some(
                    match location {
                        ApiKeyLocation::Header => "header",
                        ApiKeyLocation::Query => "query",
                    }
                    .to_string(),
                ),
                name: Some(name.clone()),
            },
        }
    }
}

/// Security requirement: scheme name to scopes.
pub type SecurityRequirement = BTreeMap<String, Vec<String>>;

/// API tag for grouping operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    /// Tag name.
    pub name: String,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// JSON Schema primitive type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    /// String type.
    String,
    /// Number type.
    Number,
    /// Integer type.
    Integer,
    /// Boolean type.
    Boolean,
    /// Array type.
    Array,
    /// Object type.
    Object,
    /// Null type.
    Null,
}

/// The `type` keyword: one type, or several for nullable schemas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaTypes {
    /// A single type.
    Single(SchemaType),
    /// A type union, e.g. `["string", "null"]`.
    Multiple(Vec<SchemaType>),
}

/// JSON Schema definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    /// Schema type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "type")]
    pub schema_type: Option<SchemaTypes>,
    /// Schema format (e.g., "date-time", "email").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Reference to another schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "$ref")]
    pub reference: Option<String>,
    /// Object properties.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, Schema>,
    /// Required properties.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    /// Whether undeclared properties are allowed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "additionalProperties")]
    pub additional_properties: Option<bool>,
    /// Array item schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    /// Minimum number of array items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "minItems")]
    pub min_items: Option<u64>,
    /// Maximum number of array items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "maxItems")]
    pub max_items: Option<u64>,
    /// Enum values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[serde(rename = "enum")]
    pub enum_values: Vec<Value>,
    /// Minimum value (for numbers).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<Number>,
    /// Maximum value (for numbers).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<Number>,
    /// Minimum length (for strings).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "minLength")]
    pub min_length: Option<u64>,
    /// Maximum length (for strings).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "maxLength")]
    pub max_length: Option<u64>,
    /// Pattern regex (for strings).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Default value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl Schema {
    fn typed(schema_type: SchemaType) -> Self {
        Self {
            schema_type: Some(SchemaTypes::Single(schema_type)),
            ..Default::default()
        }
    }

    /// Create a string schema.
    #[must_use]
    pub fn string() -> Self {
        Self::typed(SchemaType::String)
    }

    /// Create an integer schema.
    #[must_use]
    pub fn integer() -> Self {
        Self::typed(SchemaType::Integer)
    }

    /// Create an array schema with the given item schema.
    #[must_use]
    pub fn array(items: Schema) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::typed(SchemaType::Array)
        }
    }

    /// Create an object schema.
    #[must_use]
    pub fn object() -> Self {
        Self::typed(SchemaType::Object)
    }

    /// Create a reference schema.
    #[must_use]
    pub fn reference(ref_path: impl Into<String>) -> Self {
        Self {
            reference: Some(ref_path.into()),
            ..Default::default()
        }
    }

    /// Add a required property to an object schema.
    #[must_use]
    pub fn property(mut self, name: impl Into<String>, schema: Schema) -> Self {
        let name = name.into();
        self.required.push(name.clone());
        self.properties.insert(name, schema);
        self
    }

    /// Add an optional property to an object schema.
    #[must_use]
    pub fn optional_property(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    /// Widens the type to also accept `null`.
    fn or_null(mut self) -> Self {
        self.schema_type = match self.schema_type {
            Some(SchemaTypes::Single(SchemaType::Null)) | None => self.schema_type,
            Some(SchemaTypes::Single(t)) => Some(SchemaTypes::Multiple(vec![t, SchemaType::Null])),
            Some(SchemaTypes::Multiple(mut types)) => {
                if !types.contains(&SchemaType::Null) {
                    types.push(SchemaType::Null);
                }
                Some(SchemaTypes::Multiple(types))
            }
        };
        if !self.enum_values.is_empty() && !self.enum_values.contains(&Value::Null) {
            self.enum_values.push(Value::Null);
        }
        self
    }
}

/// Converts a contract schema to an OpenAPI schema.
#[must_use]
pub fn convert_schema(schema: &ContractSchema) -> Schema {
    let mut result = match schema.kind() {
        SchemaKind::String {
            min_length,
            max_length,
            pattern,
            format,
        } => Schema {
            min_length: min_length.map(|v| v as u64),
            max_length: max_length.map(|v| v as u64),
            pattern: pattern.as_ref().map(|p| p.as_str().to_string()),
            format: format.as_ref().map(|f| f.as_str().to_string()),
            ..Schema::string()
        },
        SchemaKind::Integer { minimum, maximum } => Schema {
            minimum: minimum.map(Number::from),
            maximum: maximum.map(Number::from),
            ..Schema::integer()
        },
        SchemaKind::Number { minimum, maximum } => Schema {
            minimum: minimum.and_then(Number::from_f64),
            maximum: maximum.and_then(Number::from_f64),
            ..Schema::typed(SchemaType::Number)
        },
        SchemaKind::Boolean => Schema::typed(SchemaType::Boolean),
        SchemaKind::Array {
            items,
            min_items,
            max_items,
        } => Schema {
            min_items: min_items.map(|v| v as u64),
            max_items: max_items.map(|v| v as u64),
            ..Schema::array(convert_schema(items))
        },
        SchemaKind::Object {
            properties,
            unknown_keys,
        } => {
            let mut object = Schema::object();
            for (name, property) in properties {
                if property.is_required() {
                    object.required.push(name.clone());
                }
                object.properties.insert(name.clone(), convert_schema(property));
            }
            if *unknown_keys == UnknownKeys::Strict {
                object.additional_properties = Some(false);
            }
            object
        }
        SchemaKind::Enum { values } => Schema {
            enum_values: values.iter().cloned().map(Value::String).collect(),
            ..Schema::string()
        },
        SchemaKind::Any => Schema::default(),
        SchemaKind::Null => Schema::typed(SchemaType::Null),
    };

    result.description = schema.description().map(ToString::to_string);
    result.default = schema.default().cloned();

    if schema.is_nullable() {
        result = result.or_null();
    }
    result
}

/// Schema of the 400 error envelope.
#[must_use]
pub fn validation_error_schema() -> Schema {
    let issue = Schema::object()
        .property("path", Schema::string())
        .property("message", Schema::string());

    let error = Schema::object()
        .property("code", Schema::string())
        .property("message", Schema::string())
        .property("issues", Schema::array(issue));

    Schema::object()
        .property("error", error)
        .optional_property("request_id", Schema::string())
}

/// Generator for converting contracts to an OpenAPI document.
///
/// # Example
///
/// ```
/// use covenant_core::fixtures;
/// use covenant_docs::OpenApiGenerator;
///
/// let contracts = fixtures::user_service_contracts().unwrap();
/// let spec = OpenApiGenerator::new()
///     .title("Users")
///     .version("1.0.0")
///     .contracts(&contracts)
///     .generate()
///     .unwrap();
///
/// assert_eq!(spec.openapi, "3.1.0");
/// assert!(spec.paths.contains_key("/users/{userId}"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct OpenApiGenerator<'a> {
    title: Option<String>,
    version: Option<String>,
    description: Option<String>,
    servers: Vec<Server>,
    contact: Option<Contact>,
    license: Option<License>,
    contracts: Vec<&'a Contract>,
}

impl<'a> OpenApiGenerator<'a> {
    /// Create a new generator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the API title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the API version.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set the API description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a server.
    #[must_use]
    pub fn server(mut self, url: impl Into<String>, description: Option<String>) -> Self {
        self.servers.push(Server {
            url: url.into(),
            description,
        });
        self
    }

    /// Set contact information.
    #[must_use]
    pub fn contact(mut self, contact: Contact) -> Self {
        self.contact = Some(contact);
        self
    }

    /// Set license information.
    #[must_use]
    pub fn license(mut self, name: impl Into<String>, url: Option<String>) -> Self {
        self.license = Some(License {
            name: name.into(),
            url,
        });
        self
    }

    /// Add one contract.
    #[must_use]
    pub fn contract(mut self, contract: &'a Contract) -> Self {
        self.contracts.push(contract);
        self
    }

    /// Add several contracts, in order.
    #[must_use]
    pub fn contracts<I>(mut self, contracts: I) -> Self
    where
        I: IntoIterator<Item = &'a Contract>,
    {
        self.contracts.extend(contracts);
        self
    }

    /// Generate the OpenAPI document.
    ///
    /// # Errors
    ///
    /// Returns [`DocsError::DuplicateOperationId`] when two contracts share an
    /// operation id, and [`DocsError::InvalidOperation`] for methods OpenAPI
    /// cannot describe or two contracts on the same path and method.
    pub fn generate(&self) -> DocsResult<OpenApi> {
        let info = Info {
            title: self.title.clone().unwrap_or_else(|| "Covenant API".to_string()),
            version: self.version.clone().unwrap_or_else(|| "0.1.0".to_string()),
            description: self.description.clone(),
            contact: self.contact.clone(),
            license: self.license.clone(),
        };

        let mut paths: IndexMap<String, PathItem> = IndexMap::new();
        let mut tags: IndexSet<String> = IndexSet::new();
        let mut components = Components::default();
        let mut operation_ids: HashSet<&str> = HashSet::new();

        for contract in &self.contracts {
            let operation_id = contract.operation_id();
            if !operation_ids.insert(operation_id) {
                return Err(DocsError::DuplicateOperationId {
                    operation_id: operation_id.to_string(),
                });
            }

            let operation = convert_operation(contract, &mut components);
            tags.extend(operation.tags.iter().cloned());

            let path_item = paths.entry(contract.path().openapi_path()).or_default();
            let slot = path_item
                .slot(contract.method())
                .ok_or_else(|| DocsError::InvalidOperation {
                    operation_id: operation_id.to_string(),
                    reason: format!("unsupported HTTP method: {}", contract.method()),
                })?;
            if slot.is_some() {
                return Err(DocsError::InvalidOperation {
                    operation_id: operation_id.to_string(),
                    reason: format!(
                        "another operation is already documented at {} {}",
                        contract.method(),
                        contract.path().openapi_path()
                    ),
                });
            }
            *slot = Some(operation);
        }

        Ok(OpenApi {
            openapi: OPENAPI_VERSION.to_string(),
            info,
            servers: self.servers.clone(),
            paths,
            components: (!components.is_empty()).then_some(components),
            tags: tags
                .into_iter()
                .map(|name| Tag {
                    name,
                    description: None,
                })
                .collect(),
        })
    }

    /// Generate the OpenAPI document as pretty-printed JSON.
    pub fn generate_json(&self) -> DocsResult<String> {
        let spec = self.generate()?;
        serde_json::to_string_pretty(&spec).map_err(DocsError::from)
    }
}

fn convert_operation(contract: &Contract, components: &mut Components) -> Operation {
    let shape = contract.request();
    let mut parameters = Vec::new();
    let mut seen: HashSet<(ParameterIn, String)> = HashSet::new();
    let mut has_request_schema = !shape.is_empty();

    push_parameters(&mut parameters, &mut seen, shape.params.as_ref(), ParameterIn::Path, false);
    push_parameters(&mut parameters, &mut seen, shape.query.as_ref(), ParameterIn::Query, false);
    push_parameters(&mut parameters, &mut seen, shape.headers.as_ref(), ParameterIn::Header, false);

    let mut security = Vec::new();
    for middleware in contract.middlewares() {
        let own = middleware.request();
        has_request_schema |= !own.is_empty();

        let bearer = matches!(middleware.security(), Some(ContractSecurity::Bearer { .. }));
        push_parameters(&mut parameters, &mut seen, own.query.as_ref(), ParameterIn::Query, false);
        push_parameters(&mut parameters, &mut seen, own.headers.as_ref(), ParameterIn::Header, bearer);

        if let Some(scheme) = middleware.security() {
            components.security_schemes.insert(
                middleware.name().to_string(),
                SecurityScheme::from_contract(scheme, middleware.description()),
            );
            security.push(BTreeMap::from([(middleware.name().to_string(), Vec::new())]));
        }
    }

    let request_body = shape.body.as_ref().map(|body| RequestBody {
        description: body.description().map(ToString::to_string),
        required: !body.is_optional(),
        content: json_content(convert_schema(body)),
    });

    let mut responses: IndexMap<String, Response> = contract
        .responses()
        .iter()
        .map(|(status, spec)| {
            (
                status.to_string(),
                Response::json(spec.description.clone(), spec.schema.as_ref().map(convert_schema)),
            )
        })
        .collect();

    if has_request_schema && !responses.contains_key("400") {
        components
            .schemas
            .entry(VALIDATION_ERROR_SCHEMA.to_string())
            .or_insert_with(validation_error_schema);
        responses.insert(
            "400".to_string(),
            Response::json(
                "Request validation failed",
                Some(Schema::reference(format!(
                    "#/components/schemas/{VALIDATION_ERROR_SCHEMA}"
                ))),
            ),
        );
    }

    Operation {
        operation_id: contract.operation_id().to_string(),
        summary: contract.summary().map(ToString::to_string),
        description: contract.description().map(ToString::to_string),
        tags: contract.tags().to_vec(),
        deprecated: contract.is_deprecated(),
        parameters,
        request_body,
        responses,
        security,
    }
}

/// Adds one parameter per property of an object schema.
///
/// Path parameters are always required. With `skip_authorization`, an
/// `authorization` header is left to the security scheme.
fn push_parameters(
    parameters: &mut Vec<Parameter>,
    seen: &mut HashSet<(ParameterIn, String)>,
    schema: Option<&ContractSchema>,
    location: ParameterIn,
    skip_authorization: bool,
) {
    let Some(properties) = schema.and_then(ContractSchema::object_properties) else {
        return;
    };

    for (name, property) in properties {
        if skip_authorization && name.eq_ignore_ascii_case("authorization") {
            continue;
        }
        let key = match location {
            ParameterIn::Header => (location, name.to_ascii_lowercase()),
            _ => (location, name.clone()),
        };
        if !seen.insert(key) {
            continue;
        }
        parameters.push(Parameter {
            name: name.clone(),
            location,
            description: property.description().map(ToString::to_string),
            required: location == ParameterIn::Path || property.is_required(),
            schema: Some(convert_schema(property)),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_core::{fixtures, ContractError, Input, MiddlewareContract, Outcome, Reply};
    use http::StatusCode;
    use serde_json::json;
    use std::sync::Arc;

    fn to_json(schema: &ContractSchema) -> Value {
        serde_json::to_value(convert_schema(schema)).unwrap()
    }

    fn users_spec() -> OpenApi {
        let contracts = fixtures::user_service_contracts().unwrap();
        OpenApiGenerator::new()
            .title("Users")
            .version("1.0.0")
            .contracts(&contracts)
            .generate()
            .unwrap()
    }

    fn noop(method: Method, path: &str, operation_id: &str) -> Contract {
        Contract::builder(method, path)
            .operation_id(operation_id)
            .response_empty(StatusCode::NO_CONTENT, "Done")
            .handler(|_input: Input| async move { Ok::<_, ContractError>(Reply::no_content()) })
            .build()
            .unwrap()
    }

    // ==================== Schema conversion ====================

    #[test]
    fn test_convert_string_constraints() {
        let schema = ContractSchema::string()
            .min_length(1)
            .max_length(64)
            .format("email")
            .describe("Contact address");

        assert_eq!(
            to_json(&schema),
            json!({
                "type": "string",
                "format": "email",
                "description": "Contact address",
                "minLength": 1,
                "maxLength": 64
            })
        );
    }

    #[test]
    fn test_convert_nullable_uses_type_array() {
        let schema = ContractSchema::string().nullable();
        assert_eq!(to_json(&schema)["type"], json!(["string", "null"]));

        let schema = ContractSchema::enumeration(["a", "b"]).nullable();
        let value = to_json(&schema);
        assert_eq!(value["type"], json!(["string", "null"]));
        assert_eq!(value["enum"], json!(["a", "b", null]));
    }

    #[test]
    fn test_convert_integer_bounds_and_default() {
        let schema = ContractSchema::integer()
            .minimum(1)
            .maximum(100)
            .default_value(20);
        assert_eq!(
            to_json(&schema),
            json!({ "type": "integer", "minimum": 1, "maximum": 100, "default": 20 })
        );
    }

    #[test]
    fn test_convert_object_required_and_strict() {
        let schema = ContractSchema::object([
            ("id", ContractSchema::integer()),
            ("nickname", ContractSchema::string().optional()),
            ("role", ContractSchema::string().default_value("member")),
        ])
        .strict();

        let value = to_json(&schema);
        assert_eq!(value["required"], json!(["id"]));
        assert_eq!(value["additionalProperties"], json!(false));
        assert_eq!(value["properties"]["role"]["default"], "member");
    }

    #[test]
    fn test_convert_array_and_any() {
        let schema = ContractSchema::array(ContractSchema::any()).min_items(1);
        assert_eq!(
            to_json(&schema),
            json!({ "type": "array", "items": {}, "minItems": 1 })
        );
    }

    // ==================== Document generation ====================

    #[test]
    fn test_paths_and_methods() {
        let spec = users_spec();
        assert_eq!(spec.paths.keys().collect::<Vec<_>>(), ["/users", "/users/{userId}"]);

        let users = &spec.paths["/users"];
        assert_eq!(users.get.as_ref().unwrap().operation_id, "listUsers");
        assert_eq!(users.post.as_ref().unwrap().operation_id, "createUser");
        assert!(spec.operation("/users/{userId}", &Method::DELETE).is_some());
    }

    #[test]
    fn test_parameters() {
        let spec = users_spec();

        let list = spec.operation("/users", &Method::GET).unwrap();
        assert_eq!(list.parameters.len(), 1);
        assert_eq!(list.parameters[0].name, "limit");
        assert_eq!(list.parameters[0].location, ParameterIn::Query);
        assert!(!list.parameters[0].required);

        let get = spec.operation("/users/{userId}", &Method::GET).unwrap();
        assert_eq!(get.parameters[0].name, "userId");
        assert_eq!(get.parameters[0].location, ParameterIn::Path);
        assert!(get.parameters[0].required);
    }

    #[test]
    fn test_request_body_and_responses() {
        let spec = users_spec();
        let create = spec.operation("/users", &Method::POST).unwrap();

        let body = create.request_body.as_ref().unwrap();
        assert!(body.required);
        assert!(body.content.contains_key("application/json"));

        assert_eq!(
            create.responses.keys().collect::<Vec<_>>(),
            ["201", "400"]
        );
        let created = &create.responses["201"];
        assert_eq!(created.description, "The created user");
    }

    #[test]
    fn test_automatic_validation_error_response() {
        let spec = users_spec();
        let get = spec.operation("/users/{userId}", &Method::GET).unwrap();

        let bad_request = &get.responses["400"];
        let schema = bad_request.content["application/json"].schema.as_ref().unwrap();
        assert_eq!(
            schema.reference.as_deref(),
            Some("#/components/schemas/ValidationError")
        );

        let components = spec.components.as_ref().unwrap();
        assert!(components.schemas.contains_key(VALIDATION_ERROR_SCHEMA));
    }

    #[test]
    fn test_no_validation_response_without_request_schemas() {
        let contract = noop(Method::POST, "/ping", "ping");
        let spec = OpenApiGenerator::new().contract(&contract).generate().unwrap();
        let op = spec.operation("/ping", &Method::POST).unwrap();
        assert_eq!(op.responses.keys().collect::<Vec<_>>(), ["204"]);
        assert!(spec.components.is_none());
    }

    #[test]
    fn test_security_from_middleware() {
        let spec = users_spec();
        let create = spec.operation("/users", &Method::POST).unwrap();

        assert_eq!(create.security.len(), 1);
        assert!(create.security[0].contains_key("auth"));
        // The bearer header is described by the scheme, not as a parameter.
        assert!(create.parameters.is_empty());

        let scheme = &spec.components.as_ref().unwrap().security_schemes["auth"];
        assert_eq!(scheme.scheme_type, "http");
        assert_eq!(scheme.scheme.as_deref(), Some("bearer"));
    }

    #[test]
    fn test_api_key_middleware() {
        let api_key = MiddlewareContract::builder("apiKey")
            .headers(ContractSchema::object([("x-api-key", ContractSchema::string())]))
            .security(ContractSecurity::api_key_header("x-api-key"))
            .handler(|_input| async move { Ok::<_, ContractError>(Outcome::proceed()) })
            .build()
            .unwrap();

        let contract = Contract::builder(Method::GET, "/reports")
            .middleware(Arc::new(api_key))
            .response_empty(StatusCode::NO_CONTENT, "Done")
            .handler(|_input: Input| async move { Ok::<_, ContractError>(Reply::no_content()) })
            .build()
            .unwrap();

        let spec = OpenApiGenerator::new().contract(&contract).generate().unwrap();
        let op = spec.operation("/reports", &Method::GET).unwrap();
        assert_eq!(op.parameters[0].name, "x-api-key");
        assert_eq!(op.parameters[0].location, ParameterIn::Header);

        let scheme = &spec.components.as_ref().unwrap().security_schemes["apiKey"];
        assert_eq!(scheme.scheme_type, "apiKey");
        assert_eq!(scheme.location.as_deref(), Some("header"));
        assert_eq!(scheme.name.as_deref(), Some("x-api-key"));
    }

    #[test]
    fn test_tags_collected_once() {
        let spec = users_spec();
        let names: Vec<&str> = spec.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["users"]);
    }

    #[test]
    fn test_duplicate_operation_id() {
        let first = noop(Method::GET, "/a", "same");
        let second = noop(Method::GET, "/b", "same");

        let err = OpenApiGenerator::new()
            .contract(&first)
            .contract(&second)
            .generate()
            .unwrap_err();
        assert!(matches!(
            err,
            DocsError::DuplicateOperationId { ref operation_id } if operation_id == "same"
        ));
    }

    #[test]
    fn test_info_defaults_and_json() {
        let contract = noop(Method::GET, "/health", "health");
        let json = OpenApiGenerator::new()
            .description("Health checks")
            .server("https://api.example.com", Some("Production".to_string()))
            .contract(&contract)
            .generate_json()
            .unwrap();

        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["openapi"], "3.1.0");
        assert_eq!(value["info"]["title"], "Covenant API");
        assert_eq!(value["info"]["description"], "Health checks");
        assert_eq!(value["servers"][0]["url"], "https://api.example.com");
        assert_eq!(
            value["paths"]["/health"]["get"]["operationId"],
            "health"
        );
    }

    #[test]
    fn test_parameter_in_serialization() {
        let param = Parameter {
            name: "id".to_string(),
            location: ParameterIn::Query,
            description: None,
            required: false,
            schema: None,
        };

        let json = serde_json::to_string(&param).unwrap();
        assert!(json.contains("\"in\":\"query\""));
    }
}
