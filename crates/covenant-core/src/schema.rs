//! Schema values for validating and cleaning JSON.
//!
//! A [`Schema`] describes the accepted shape of one JSON value. Parsing a value
//! returns a *cleaned* copy (unknown keys stripped, defaults filled in) or the
//! complete list of [`Issue`]s found. Validation never stops at the first
//! problem: every failing field in an object is reported.
//!
//! # Example
//!
//! ```
//! use covenant_core::schema::Schema;
//! use serde_json::json;
//!
//! let schema = Schema::object([
//!     ("name", Schema::string().min_length(1)),
//!     ("age", Schema::integer().minimum(0).optional()),
//! ]);
//!
//! let issues = schema.parse(&json!({ "name": "", "age": -1 })).unwrap_err();
//! assert_eq!(issues.len(), 2);
//! assert_eq!(issues.as_slice()[0].path.to_string(), "name");
//! ```

use crate::error::ContractError;
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One segment of an [`IssuePath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// An object key.
    Key(String),
    /// An array index.
    Index(usize),
}

/// Location of an issue inside a validated value.
///
/// Renders as `body.items[0].name`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct IssuePath(Vec<PathSegment>);

impl IssuePath {
    /// The empty path, pointing at the value itself.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Returns a new path extended with an object key.
    #[must_use]
    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Key(key.into()));
        Self(segments)
    }

    /// Returns a new path extended with an array index.
    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        Self(segments)
    }

    /// Returns the segments of this path.
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Returns `true` for the root path.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for IssuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i == 0 => write!(f, "{key}")?,
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

impl FromStr for IssuePath {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut segments = Vec::new();
        for part in s.split('.').filter(|p| !p.is_empty()) {
            match parse_part(part) {
                Some(parsed) => segments.extend(parsed),
                None => segments.push(PathSegment::Key(part.to_string())),
            }
        }
        Ok(Self(segments))
    }
}

/// Splits `key[0][1]` into segments. `None` when the brackets are not a
/// clean run of `[index]` groups, in which case the part is a literal key.
fn parse_part(part: &str) -> Option<Vec<PathSegment>> {
    let (key, mut rest) = match part.find('[') {
        Some(pos) => part.split_at(pos),
        None => (part, ""),
    };
    let mut segments = Vec::new();
    if !key.is_empty() {
        segments.push(PathSegment::Key(key.to_string()));
    }
    while !rest.is_empty() {
        let inner = rest.strip_prefix('[')?;
        let end = inner.find(']')?;
        segments.push(PathSegment::Index(inner[..end].parse().ok()?));
        rest = &inner[end + 1..];
    }
    Some(segments)
}

impl Serialize for IssuePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IssuePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or_default())
    }
}

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Where the failure occurred.
    pub path: IssuePath,
    /// Human-readable description.
    pub message: String,
}

impl Issue {
    /// Creates a new issue.
    #[must_use]
    pub fn new(path: IssuePath, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_root() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// An ordered collection of issues.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(transparent)]
#[error("{} validation issue(s)", .0.len())]
pub struct Issues(Vec<Issue>);

impl Issues {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an issue.
    pub fn push(&mut self, issue: Issue) {
        self.0.push(issue);
    }

    /// Appends every issue from `other`.
    pub fn extend(&mut self, other: Issues) {
        self.0.extend(other.0);
    }

    /// Returns `true` if no issue was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of recorded issues.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Borrows the issues as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Issue] {
        &self.0
    }

    /// Iterates over the issues.
    pub fn iter(&self) -> std::slice::Iter<'_, Issue> {
        self.0.iter()
    }

    /// Consumes the collection.
    #[must_use]
    pub fn into_vec(self) -> Vec<Issue> {
        self.0
    }
}

impl From<Vec<Issue>> for Issues {
    fn from(issues: Vec<Issue>) -> Self {
        Self(issues)
    }
}

impl IntoIterator for Issues {
    type Item = Issue;
    type IntoIter = std::vec::IntoIter<Issue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Issues {
    type Item = &'a Issue;
    type IntoIter = std::slice::Iter<'a, Issue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// How an object schema treats keys it does not declare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownKeys {
    /// Drop undeclared keys from the parsed output.
    #[default]
    Strip,
    /// Keep undeclared keys unchanged.
    Passthrough,
    /// Report every undeclared key as an issue.
    Strict,
}

/// Well-known string formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Format {
    /// An e-mail address.
    Email,
    /// A UUID in hyphenated form.
    Uuid,
    /// An RFC 3339 timestamp.
    DateTime,
    /// An absolute URI with a scheme.
    Uri,
    /// Any other format name; documented but not enforced.
    Other(String),
}

impl Format {
    /// Returns the OpenAPI format name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Email => "email",
            Self::Uuid => "uuid",
            Self::DateTime => "date-time",
            Self::Uri => "uri",
            Self::Other(name) => name,
        }
    }

    fn check(&self, s: &str) -> Result<(), &'static str> {
        let ok = match self {
            Self::Email => is_email(s),
            Self::Uuid => uuid::Uuid::parse_str(s).is_ok(),
            Self::DateTime => chrono::DateTime::parse_from_rfc3339(s).is_ok(),
            Self::Uri => s
                .parse::<http::Uri>()
                .is_ok_and(|uri| uri.scheme().is_some()),
            Self::Other(_) => true,
        };
        if ok {
            return Ok(());
        }
        Err(match self {
            Self::Email => "Invalid email",
            Self::Uuid => "Invalid uuid",
            Self::DateTime => "Invalid datetime",
            Self::Uri => "Invalid url",
            Self::Other(_) => "Invalid format",
        })
    }
}

impl From<&str> for Format {
    fn from(name: &str) -> Self {
        match name {
            "email" => Self::Email,
            "uuid" => Self::Uuid,
            "date-time" => Self::DateTime,
            "uri" | "url" => Self::Uri,
            other => Self::Other(other.to_string()),
        }
    }
}

fn is_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !s.chars().any(char::is_whitespace)
}

/// A compiled regular expression together with its source.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compiles a pattern.
    pub fn new(source: impl Into<String>) -> Result<Self, ContractError> {
        let source = source.into();
        let regex = Regex::new(&source)
            .map_err(|e| ContractError::definition(format!("invalid pattern '{source}': {e}")))?;
        Ok(Self { source, regex })
    }

    /// The original pattern text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Tests a string against the pattern.
    #[must_use]
    pub fn is_match(&self, s: &str) -> bool {
        self.regex.is_match(s)
    }
}

/// A numeric bound passed to [`Schema::minimum`] or [`Schema::maximum`].
///
/// Integer bounds keep full `i64` precision; `u64` values above `i64::MAX`
/// saturate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumberBound {
    /// A whole bound.
    Int(i64),
    /// A possibly fractional bound.
    Float(f64),
}

impl NumberBound {
    fn as_f64(self) -> f64 {
        match self {
            Self::Int(n) => n as f64,
            Self::Float(f) => f,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn ceil(self) -> i64 {
        match self {
            Self::Int(n) => n,
            Self::Float(f) => f.ceil() as i64,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn floor(self) -> i64 {
        match self {
            Self::Int(n) => n,
            Self::Float(f) => f.floor() as i64,
        }
    }
}

macro_rules! int_bound {
    ($($ty:ty),*) => {
        $(impl From<$ty> for NumberBound {
            fn from(n: $ty) -> Self {
                Self::Int(i64::from(n))
            }
        })*
    };
}

int_bound!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for NumberBound {
    fn from(n: u64) -> Self {
        Self::Int(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<usize> for NumberBound {
    fn from(n: usize) -> Self {
        Self::Int(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<f32> for NumberBound {
    fn from(f: f32) -> Self {
        Self::Float(f64::from(f))
    }
}

impl From<f64> for NumberBound {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

/// The type-specific part of a [`Schema`].
#[derive(Debug, Clone)]
pub enum SchemaKind {
    /// A JSON string.
    String {
        /// Minimum length in characters.
        min_length: Option<usize>,
        /// Maximum length in characters.
        max_length: Option<usize>,
        /// Regex the whole value must match.
        pattern: Option<Pattern>,
        /// Well-known format.
        format: Option<Format>,
    },
    /// A whole JSON number.
    Integer {
        /// Inclusive lower bound.
        minimum: Option<i64>,
        /// Inclusive upper bound.
        maximum: Option<i64>,
    },
    /// Any JSON number.
    Number {
        /// Inclusive lower bound.
        minimum: Option<f64>,
        /// Inclusive upper bound.
        maximum: Option<f64>,
    },
    /// A JSON boolean.
    Boolean,
    /// A JSON array.
    Array {
        /// Schema for every element.
        items: Box<Schema>,
        /// Minimum number of elements.
        min_items: Option<usize>,
        /// Maximum number of elements.
        max_items: Option<usize>,
    },
    /// A JSON object with declared properties.
    Object {
        /// Declared properties in declaration order.
        properties: IndexMap<String, Schema>,
        /// Treatment of undeclared keys.
        unknown_keys: UnknownKeys,
    },
    /// One of a fixed set of strings.
    Enum {
        /// Accepted values.
        values: Vec<String>,
    },
    /// Any value.
    Any,
    /// Only `null`.
    Null,
}

impl SchemaKind {
    /// Name of the expected JSON type, used in messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String { .. } | Self::Enum { .. } => "string",
            Self::Integer { .. } => "integer",
            Self::Number { .. } => "number",
            Self::Boolean => "boolean",
            Self::Array { .. } => "array",
            Self::Object { .. } => "object",
            Self::Any => "any",
            Self::Null => "null",
        }
    }
}

/// Shape of a JSON value.
#[derive(Debug, Clone)]
pub struct Schema {
    kind: SchemaKind,
    optional: bool,
    nullable: bool,
    description: Option<String>,
    default: Option<Value>,
}

impl Schema {
    fn with_kind(kind: SchemaKind) -> Self {
        Self {
            kind,
            optional: false,
            nullable: false,
            description: None,
            default: None,
        }
    }

    /// A string schema.
    #[must_use]
    pub fn string() -> Self {
        Self::with_kind(SchemaKind::String {
            min_length: None,
            max_length: None,
            pattern: None,
            format: None,
        })
    }

    /// An integer schema.
    #[must_use]
    pub fn integer() -> Self {
        Self::with_kind(SchemaKind::Integer {
            minimum: None,
            maximum: None,
        })
    }

    /// A number schema.
    #[must_use]
    pub fn number() -> Self {
        Self::with_kind(SchemaKind::Number {
            minimum: None,
            maximum: None,
        })
    }

    /// A boolean schema.
    #[must_use]
    pub fn boolean() -> Self {
        Self::with_kind(SchemaKind::Boolean)
    }

    /// An array schema.
    #[must_use]
    pub fn array(items: Schema) -> Self {
        Self::with_kind(SchemaKind::Array {
            items: Box::new(items),
            min_items: None,
            max_items: None,
        })
    }

    /// An object schema. Properties are required unless marked optional.
    #[must_use]
    pub fn object<K, I>(properties: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Schema)>,
    {
        Self::with_kind(SchemaKind::Object {
            properties: properties
                .into_iter()
                .map(|(name, schema)| (name.into(), schema))
                .collect(),
            unknown_keys: UnknownKeys::Strip,
        })
    }

    /// A string enumeration.
    #[must_use]
    pub fn enumeration<S, I>(values: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = S>,
    {
        Self::with_kind(SchemaKind::Enum {
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    /// A schema accepting any value.
    #[must_use]
    pub fn any() -> Self {
        Self::with_kind(SchemaKind::Any)
    }

    /// A schema accepting only `null`.
    #[must_use]
    pub fn null() -> Self {
        Self::with_kind(SchemaKind::Null)
    }

    /// Allows the value to be absent.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Allows the value to be `null`.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Attaches a description, used in generated documentation.
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Value used when the input is absent.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Minimum string length.
    #[must_use]
    pub fn min_length(mut self, len: usize) -> Self {
        if let SchemaKind::String { min_length, .. } = &mut self.kind {
            *min_length = Some(len);
        }
        self
    }

    /// Maximum string length.
    #[must_use]
    pub fn max_length(mut self, len: usize) -> Self {
        if let SchemaKind::String { max_length, .. } = &mut self.kind {
            *max_length = Some(len);
        }
        self
    }

    /// Regex a string must match.
    pub fn pattern(mut self, source: &str) -> Result<Self, ContractError> {
        if let SchemaKind::String { pattern, .. } = &mut self.kind {
            *pattern = Some(Pattern::new(source)?);
        }
        Ok(self)
    }

    /// String format such as `email` or `uuid`.
    #[must_use]
    pub fn format(mut self, name: impl Into<Format>) -> Self {
        if let SchemaKind::String { format, .. } = &mut self.kind {
            *format = Some(name.into());
        }
        self
    }

    /// Inclusive lower bound for integers and numbers.
    ///
    /// A fractional bound on an integer schema is rounded up, so
    /// `Schema::integer().minimum(0.5)` rejects `0`.
    #[must_use]
    pub fn minimum(mut self, bound: impl Into<NumberBound>) -> Self {
        let bound = bound.into();
        match &mut self.kind {
            SchemaKind::Integer { minimum, .. } => *minimum = Some(bound.ceil()),
            SchemaKind::Number { minimum, .. } => *minimum = Some(bound.as_f64()),
            _ => {}
        }
        self
    }

    /// Inclusive upper bound for integers and numbers.
    ///
    /// A fractional bound on an integer schema is rounded down.
    #[must_use]
    pub fn maximum(mut self, bound: impl Into<NumberBound>) -> Self {
        let bound = bound.into();
        match &mut self.kind {
            SchemaKind::Integer { maximum, .. } => *maximum = Some(bound.floor()),
            SchemaKind::Number { maximum, .. } => *maximum = Some(bound.as_f64()),
            _ => {}
        }
        self
    }

    /// Minimum array length.
    #[must_use]
    pub fn min_items(mut self, min: usize) -> Self {
        if let SchemaKind::Array { min_items, .. } = &mut self.kind {
            *min_items = Some(min);
        }
        self
    }

    /// Maximum array length.
    #[must_use]
    pub fn max_items(mut self, max: usize) -> Self {
        if let SchemaKind::Array { max_items, .. } = &mut self.kind {
            *max_items = Some(max);
        }
        self
    }

    /// Rejects undeclared object keys.
    #[must_use]
    pub fn strict(self) -> Self {
        self.unknown_keys(UnknownKeys::Strict)
    }

    /// Keeps undeclared object keys in the output.
    #[must_use]
    pub fn passthrough(self) -> Self {
        self.unknown_keys(UnknownKeys::Passthrough)
    }

    fn unknown_keys(mut self, policy: UnknownKeys) -> Self {
        if let SchemaKind::Object { unknown_keys, .. } = &mut self.kind {
            *unknown_keys = policy;
        }
        self
    }

    /// The type-specific part.
    #[must_use]
    pub fn kind(&self) -> &SchemaKind {
        &self.kind
    }

    /// Whether the value may be absent.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Whether the value may be `null`.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Whether an absent value is an issue.
    #[must_use]
    pub fn is_required(&self) -> bool {
        !self.optional && self.default.is_none()
    }

    /// The description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The default value, if any.
    #[must_use]
    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Declared properties when this is an object schema.
    #[must_use]
    pub fn object_properties(&self) -> Option<&IndexMap<String, Schema>> {
        match &self.kind {
            SchemaKind::Object { properties, .. } => Some(properties),
            _ => None,
        }
    }

    /// Lowercases the declared property names of an object schema.
    #[must_use]
    pub(crate) fn with_lowercase_keys(mut self) -> Self {
        if let SchemaKind::Object { properties, .. } = &mut self.kind {
            *properties = std::mem::take(properties)
                .into_iter()
                .map(|(name, schema)| (name.to_ascii_lowercase(), schema))
                .collect();
        }
        self
    }

    /// Validates a value and returns its cleaned form.
    pub fn parse(&self, value: &Value) -> Result<Value, Issues> {
        self.parse_at(Some(value), &IssuePath::root())
    }

    /// Validates a possibly absent value rooted at `path`.
    ///
    /// An absent value that is allowed to be absent parses to `null`.
    pub fn parse_at(&self, value: Option<&Value>, path: &IssuePath) -> Result<Value, Issues> {
        let mut issues = Issues::new();
        let parsed = self.check(value, path, &mut issues);
        if issues.is_empty() {
            Ok(parsed.unwrap_or(Value::Null))
        } else {
            Err(issues)
        }
    }

    /// Converts string inputs into the scalar types this schema expects.
    ///
    /// Used for values that arrive as text: headers, query strings and
    /// path parameters. Values that cannot be converted are returned
    /// unchanged so that validation reports them.
    #[must_use]
    pub fn coerce(&self, value: &Value) -> Value {
        match (&self.kind, value) {
            (SchemaKind::Integer { .. }, Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map_or_else(|_| value.clone(), Value::from),
            (SchemaKind::Number { .. }, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map_or_else(|| value.clone(), Value::Number),
            (SchemaKind::Boolean, Value::String(s)) => match s.trim() {
                "true" | "1" => Value::Bool(true),
                "false" | "0" => Value::Bool(false),
                _ => value.clone(),
            },
            (SchemaKind::Array { items, .. }, Value::Array(values)) => {
                Value::Array(values.iter().map(|v| items.coerce(v)).collect())
            }
            (SchemaKind::Array { items, .. }, other) if !other.is_null() => {
                Value::Array(vec![items.coerce(other)])
            }
            (SchemaKind::Object { properties, .. }, Value::Object(map)) => {
                let mut coerced = map.clone();
                for (name, schema) in properties {
                    if let Some(v) = map.get(name) {
                        coerced.insert(name.clone(), schema.coerce(v));
                    }
                }
                Value::Object(coerced)
            }
            _ => value.clone(),
        }
    }

    fn check(&self, value: Option<&Value>, path: &IssuePath, issues: &mut Issues) -> Option<Value> {
        let Some(value) = value else {
            if let Some(default) = &self.default {
                return Some(default.clone());
            }
            if !self.optional {
                issues.push(Issue::new(path.clone(), "Required"));
            }
            return None;
        };

        if value.is_null() && !matches!(self.kind, SchemaKind::Null | SchemaKind::Any) {
            if self.nullable {
                return Some(Value::Null);
            }
            issues.push(Issue::new(
                path.clone(),
                format!("Expected {}, received null", self.kind.type_name()),
            ));
            return None;
        }

        match &self.kind {
            SchemaKind::String {
                min_length,
                max_length,
                pattern,
                format,
            } => {
                let Some(s) = value.as_str() else {
                    issues.push(type_mismatch(path, "string", value));
                    return None;
                };
                let len = s.chars().count();
                let before = issues.len();
                if let Some(min) = min_length {
                    if len < *min {
                        issues.push(Issue::new(
                            path.clone(),
                            format!("String must contain at least {min} character(s)"),
                        ));
                    }
                }
                if let Some(max) = max_length {
                    if len > *max {
                        issues.push(Issue::new(
                            path.clone(),
                            format!("String must contain at most {max} character(s)"),
                        ));
                    }
                }
                if let Some(pattern) = pattern {
                    if !pattern.is_match(s) {
                        issues.push(Issue::new(
                            path.clone(),
                            format!("String does not match pattern {}", pattern.as_str()),
                        ));
                    }
                }
                if let Some(format) = format {
                    if let Err(message) = format.check(s) {
                        issues.push(Issue::new(path.clone(), message));
                    }
                }
                (issues.len() == before).then(|| value.clone())
            }

            SchemaKind::Integer { minimum, maximum } => {
                let n = match integer_value(value) {
                    Ok(n) => n,
                    Err(message) => {
                        issues.push(Issue::new(path.clone(), message));
                        return None;
                    }
                };
                let before = issues.len();
                if let Some(min) = minimum {
                    if n < *min {
                        issues.push(too_small(path, *min));
                    }
                }
                if let Some(max) = maximum {
                    if n > *max {
                        issues.push(too_big(path, *max));
                    }
                }
                (issues.len() == before).then(|| Value::from(n))
            }

            SchemaKind::Number { minimum, maximum } => {
                let Some(n) = value.as_f64() else {
                    issues.push(type_mismatch(path, "number", value));
                    return None;
                };
                let before = issues.len();
                if let Some(min) = minimum {
                    if n < *min {
                        issues.push(too_small(path, min));
                    }
                }
                if let Some(max) = maximum {
                    if n > *max {
                        issues.push(too_big(path, max));
                    }
                }
                (issues.len() == before).then(|| value.clone())
            }

            SchemaKind::Boolean => {
                if value.is_boolean() {
                    Some(value.clone())
                } else {
                    issues.push(type_mismatch(path, "boolean", value));
                    None
                }
            }

            SchemaKind::Array {
                items,
                min_items,
                max_items,
            } => {
                let Some(values) = value.as_array() else {
                    issues.push(type_mismatch(path, "array", value));
                    return None;
                };
                let before = issues.len();
                if let Some(min) = min_items {
                    if values.len() < *min {
                        issues.push(Issue::new(
                            path.clone(),
                            format!("Array must contain at least {min} element(s)"),
                        ));
                    }
                }
                if let Some(max) = max_items {
                    if values.len() > *max {
                        issues.push(Issue::new(
                            path.clone(),
                            format!("Array must contain at most {max} element(s)"),
                        ));
                    }
                }
                let parsed: Vec<Value> = values
                    .iter()
                    .enumerate()
                    .filter_map(|(idx, item)| items.check(Some(item), &path.index(idx), issues))
                    .collect();
                (issues.len() == before).then_some(Value::Array(parsed))
            }

            SchemaKind::Object {
                properties,
                unknown_keys,
            } => {
                let Some(map) = value.as_object() else {
                    issues.push(type_mismatch(path, "object", value));
                    return None;
                };
                let before = issues.len();
                let mut parsed = Map::new();
                for (name, schema) in properties {
                    if let Some(v) = schema.check(map.get(name), &path.key(name.as_str()), issues)
                    {
                        parsed.insert(name.clone(), v);
                    }
                }
                for (key, v) in map {
                    if properties.contains_key(key) {
                        continue;
                    }
                    match unknown_keys {
                        UnknownKeys::Strip => {}
                        UnknownKeys::Passthrough => {
                            parsed.insert(key.clone(), v.clone());
                        }
                        UnknownKeys::Strict => issues.push(Issue::new(
                            path.key(key.as_str()),
                            format!("Unrecognized key '{key}'"),
                        )),
                    }
                }
                (issues.len() == before).then_some(Value::Object(parsed))
            }

            SchemaKind::Enum { values } => match value.as_str() {
                Some(s) if values.iter().any(|v| v == s) => Some(value.clone()),
                Some(s) => {
                    let expected = values
                        .iter()
                        .map(|v| format!("'{v}'"))
                        .collect::<Vec<_>>()
                        .join(" | ");
                    issues.push(Issue::new(
                        path.clone(),
                        format!("Invalid enum value. Expected {expected}, received '{s}'"),
                    ));
                    None
                }
                None => {
                    issues.push(type_mismatch(path, "string", value));
                    None
                }
            },

            SchemaKind::Any => Some(value.clone()),

            SchemaKind::Null => {
                if value.is_null() {
                    Some(Value::Null)
                } else {
                    issues.push(type_mismatch(path, "null", value));
                    None
                }
            }
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn integer_value(value: &Value) -> Result<i64, String> {
    if let Some(n) = value.as_i64() {
        return Ok(n);
    }
    match value.as_f64() {
        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => Ok(f as i64),
        Some(_) => Err("Expected integer, received float".to_string()),
        None => Err(format!(
            "Expected integer, received {}",
            value_type_name(value)
        )),
    }
}

fn type_mismatch(path: &IssuePath, expected: &str, value: &Value) -> Issue {
    Issue::new(
        path.clone(),
        format!("Expected {expected}, received {}", value_type_name(value)),
    )
}

fn too_small(path: &IssuePath, min: impl fmt::Display) -> Issue {
    Issue::new(
        path.clone(),
        format!("Number must be greater than or equal to {min}"),
    )
}

fn too_big(path: &IssuePath, max: impl fmt::Display) -> Issue {
    Issue::new(
        path.clone(),
        format!("Number must be less than or equal to {max}"),
    )
}

/// Returns a human-readable name for a JSON value type.
fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn messages(issues: &Issues) -> Vec<(String, String)> {
        issues
            .iter()
            .map(|i| (i.path.to_string(), i.message.clone()))
            .collect()
    }

    // ==================== Scalar Tests ====================

    #[test]
    fn test_string_bounds() {
        let schema = Schema::string().min_length(2).max_length(4);
        assert_eq!(schema.parse(&json!("abc")).unwrap(), json!("abc"));

        let issues = schema.parse(&json!("a")).unwrap_err();
        assert_eq!(
            issues.as_slice()[0].message,
            "String must contain at least 2 character(s)"
        );
        assert!(schema.parse(&json!("abcde")).is_err());
    }

    #[test]
    fn test_string_length_counts_characters() {
        let schema = Schema::string().max_length(2);
        assert!(schema.parse(&json!("éé")).is_ok());
    }

    #[test]
    fn test_string_pattern() {
        let schema = Schema::string().pattern("^[a-z]+$").unwrap();
        assert!(schema.parse(&json!("abc")).is_ok());
        let issues = schema.parse(&json!("ABC")).unwrap_err();
        assert_eq!(
            issues.as_slice()[0].message,
            "String does not match pattern ^[a-z]+$"
        );
    }

    #[test]
    fn test_invalid_pattern_is_definition_error() {
        let err = Schema::string().pattern("(").unwrap_err();
        assert!(err.to_string().contains("invalid pattern"));
    }

    #[test]
    fn test_formats() {
        let email = Schema::string().format("email");
        assert!(email.parse(&json!("a@example.com")).is_ok());
        assert!(email.parse(&json!("not-an-email")).is_err());

        let uuid = Schema::string().format("uuid");
        assert!(uuid
            .parse(&json!("0190a6f2-7b8c-7d3e-9f00-123456789abc"))
            .is_ok());
        assert!(uuid.parse(&json!("123")).is_err());

        let ts = Schema::string().format("date-time");
        assert!(ts.parse(&json!("2024-01-02T03:04:05Z")).is_ok());
        assert!(ts.parse(&json!("yesterday")).is_err());

        let uri = Schema::string().format("uri");
        assert!(uri.parse(&json!("https://example.com/a")).is_ok());
        assert!(uri.parse(&json!("/relative")).is_err());
    }

    #[test]
    fn test_integer_rejects_fraction() {
        let schema = Schema::integer().minimum(1).maximum(10);
        assert_eq!(schema.parse(&json!(5)).unwrap(), json!(5));
        assert_eq!(schema.parse(&json!(5.0)).unwrap(), json!(5));

        let issues = schema.parse(&json!(1.5)).unwrap_err();
        assert_eq!(issues.as_slice()[0].message, "Expected integer, received float");

        let issues = schema.parse(&json!(0)).unwrap_err();
        assert_eq!(
            issues.as_slice()[0].message,
            "Number must be greater than or equal to 1"
        );
    }

    #[test]
    fn test_fractional_integer_bounds_round_inward() {
        let schema = Schema::integer().minimum(0.5).maximum(9.5);
        assert!(schema.parse(&json!(0)).is_err());
        assert_eq!(schema.parse(&json!(1)).unwrap(), json!(1));
        assert_eq!(schema.parse(&json!(9)).unwrap(), json!(9));
        assert!(schema.parse(&json!(10)).is_err());

        let negative = Schema::integer().minimum(-1.5).maximum(-0.5);
        assert!(negative.parse(&json!(-2)).is_err());
        assert!(negative.parse(&json!(-1)).is_ok());
        assert!(negative.parse(&json!(0)).is_err());
    }

    #[test]
    fn test_wide_integer_bounds() {
        let schema = Schema::integer().minimum(i64::MAX - 1);
        assert!(schema.parse(&json!(i64::MAX)).is_ok());
        assert!(schema.parse(&json!(i64::MAX - 2)).is_err());

        let capped = Schema::integer().maximum(u64::MAX);
        assert!(matches!(
            capped.kind(),
            SchemaKind::Integer {
                minimum: None,
                maximum: Some(i64::MAX)
            }
        ));
        assert!(Schema::number().minimum(3_u64).parse(&json!(2.5)).is_err());
        assert!(Schema::number().minimum(3_u64).parse(&json!(3)).is_ok());
    }

    #[test]
    fn test_number_bounds() {
        let schema = Schema::number().minimum(0.5).maximum(1.5);
        assert!(schema.parse(&json!(1.0)).is_ok());
        assert!(schema.parse(&json!(2)).is_err());
        assert!(schema.parse(&json!("1")).is_err());
    }

    #[test]
    fn test_enum() {
        let schema = Schema::enumeration(["asc", "desc"]);
        assert!(schema.parse(&json!("asc")).is_ok());
        let issues = schema.parse(&json!("up")).unwrap_err();
        assert_eq!(
            issues.as_slice()[0].message,
            "Invalid enum value. Expected 'asc' | 'desc', received 'up'"
        );
    }

    #[test]
    fn test_null_handling() {
        assert!(Schema::string().parse(&Value::Null).is_err());
        assert_eq!(
            Schema::string().nullable().parse(&Value::Null).unwrap(),
            Value::Null
        );
        assert!(Schema::null().parse(&Value::Null).is_ok());
        assert!(Schema::null().parse(&json!(1)).is_err());
        assert!(Schema::any().parse(&Value::Null).is_ok());
    }

    // ==================== Object Tests ====================

    #[test]
    fn test_object_collects_all_issues() {
        let schema = Schema::object([
            ("name", Schema::string()),
            ("email", Schema::string().format("email")),
            ("age", Schema::integer().minimum(0)),
        ]);

        let issues = schema
            .parse(&json!({ "email": "nope", "age": -3 }))
            .unwrap_err();

        assert_eq!(
            messages(&issues),
            vec![
                ("name".to_string(), "Required".to_string()),
                ("email".to_string(), "Invalid email".to_string()),
                (
                    "age".to_string(),
                    "Number must be greater than or equal to 0".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_object_strips_unknown_keys() {
        let schema = Schema::object([("id", Schema::integer())]);
        let parsed = schema.parse(&json!({ "id": 1, "secret": "x" })).unwrap();
        assert_eq!(parsed, json!({ "id": 1 }));
    }

    #[test]
    fn test_object_passthrough_and_strict() {
        let passthrough = Schema::object([("id", Schema::integer())]).passthrough();
        assert_eq!(
            passthrough.parse(&json!({ "id": 1, "x": 2 })).unwrap(),
            json!({ "id": 1, "x": 2 })
        );

        let strict = Schema::object([("id", Schema::integer())]).strict();
        let issues = strict.parse(&json!({ "id": 1, "x": 2 })).unwrap_err();
        assert_eq!(issues.as_slice()[0].path.to_string(), "x");
        assert_eq!(issues.as_slice()[0].message, "Unrecognized key 'x'");
    }

    #[test]
    fn test_optional_and_default() {
        let schema = Schema::object([
            ("limit", Schema::integer().default_value(20)),
            ("cursor", Schema::string().optional()),
        ]);
        assert_eq!(schema.parse(&json!({})).unwrap(), json!({ "limit": 20 }));
        assert!(!schema.object_properties().unwrap()["limit"].is_required());
    }

    #[test]
    fn test_nested_paths() {
        let schema = Schema::object([(
            "items",
            Schema::array(Schema::object([("sku", Schema::string())])).min_items(1),
        )]);

        let issues = schema
            .parse(&json!({ "items": [{ "sku": "a" }, { "sku": 3 }] }))
            .unwrap_err();
        assert_eq!(issues.as_slice()[0].path.to_string(), "items[1].sku");
        assert_eq!(
            issues.as_slice()[0].message,
            "Expected string, received number"
        );
    }

    #[test]
    fn test_parse_at_prefixes_path() {
        let schema = Schema::object([("name", Schema::string())]);
        let issues = schema
            .parse_at(Some(&json!({})), &IssuePath::root().key("body"))
            .unwrap_err();
        assert_eq!(issues.as_slice()[0].path.to_string(), "body.name");

        let issues = schema
            .parse_at(None, &IssuePath::root().key("body"))
            .unwrap_err();
        assert_eq!(issues.as_slice()[0].path.to_string(), "body");
        assert_eq!(issues.as_slice()[0].message, "Required");
    }

    #[test]
    fn test_absent_optional_parses_to_null() {
        let schema = Schema::object([("a", Schema::string())]).optional();
        assert_eq!(schema.parse_at(None, &IssuePath::root()).unwrap(), Value::Null);
    }

    // ==================== Coercion Tests ====================

    #[test]
    fn test_coerce_scalars_from_strings() {
        let schema = Schema::object([
            ("page", Schema::integer()),
            ("ratio", Schema::number()),
            ("active", Schema::boolean()),
            ("tags", Schema::array(Schema::string())),
            ("name", Schema::string()),
        ]);

        let coerced = schema.coerce(&json!({
            "page": "2",
            "ratio": "0.5",
            "active": "true",
            "tags": "red",
            "name": "42",
        }));

        assert_eq!(
            coerced,
            json!({
                "page": 2,
                "ratio": 0.5,
                "active": true,
                "tags": ["red"],
                "name": "42",
            })
        );
    }

    #[test]
    fn test_coerce_leaves_invalid_values_for_validation() {
        let schema = Schema::object([("page", Schema::integer())]);
        let coerced = schema.coerce(&json!({ "page": "two" }));
        let issues = schema.parse(&coerced).unwrap_err();
        assert_eq!(
            issues.as_slice()[0].message,
            "Expected integer, received string"
        );
    }

    // ==================== Path Tests ====================

    #[test]
    fn test_issue_path_display_and_parse() {
        let path = IssuePath::root().key("body").key("items").index(2).key("id");
        assert_eq!(path.to_string(), "body.items[2].id");
        assert_eq!("body.items[2].id".parse::<IssuePath>().unwrap(), path);
    }

    #[test]
    fn test_issue_path_with_bracketed_key() {
        for raw in ["tags[0]]", "body.tags[0]]", "body.[x]", "body.a[]", "body.a]b"] {
            let path: IssuePath = raw.parse().unwrap();
            assert_eq!(path.to_string(), raw);
        }
        assert_eq!(
            "body.tags[0]]".parse::<IssuePath>().unwrap(),
            IssuePath::root().key("body").key("tags[0]]")
        );

        let issue: Issue =
            serde_json::from_value(json!({ "path": "body.tags[0]]", "message": "Unrecognized key" }))
                .unwrap();
        assert_eq!(issue.path.to_string(), "body.tags[0]]");
    }

    #[test]
    fn test_strict_unknown_bracket_key_round_trips() {
        let schema = Schema::object([("tags", Schema::array(Schema::string()))]).strict();
        let issues = schema
            .parse_at(
                Some(&json!({ "tags": [], "tags[0]]": 1 })),
                &IssuePath::root().key("body"),
            )
            .unwrap_err();
        let rendered = serde_json::to_value(issues.as_slice()).unwrap();
        let back: Vec<Issue> = serde_json::from_value(rendered).unwrap();
        assert_eq!(back, issues.as_slice());
    }

    proptest::proptest! {
        #[test]
        fn prop_coerced_integer_strings_validate(n in proptest::num::i64::ANY) {
            let schema = Schema::integer();
            let coerced = schema.coerce(&Value::String(n.to_string()));
            proptest::prop_assert_eq!(schema.parse(&coerced).unwrap(), json!(n));
        }

        #[test]
        fn prop_strip_never_adds_keys(keys in proptest::collection::btree_set("[a-z]{1,6}", 0..8)) {
            let schema = Schema::object([("id", Schema::integer().optional())]);
            let input: Map<String, Value> = keys.iter().map(|k| (k.clone(), json!(1))).collect();
            let parsed = schema.parse(&Value::Object(input)).unwrap();
            let parsed = parsed.as_object().unwrap();
            proptest::prop_assert!(parsed.keys().all(|k| k == "id"));
            proptest::prop_assert_eq!(parsed.contains_key("id"), keys.contains("id"));
        }
    }

    #[test]
    fn test_issue_serialization() {
        let issue = Issue::new(IssuePath::root().key("query").key("limit"), "Required");
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json, json!({ "path": "query.limit", "message": "Required" }));
    }
}
