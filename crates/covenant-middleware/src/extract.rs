//! Reading request parts as JSON and validating them against a shape.
//!
//! Headers, the query string and path parameters arrive as text. They are
//! collected into JSON objects of strings here and coerced by the schema
//! during validation.

use bytes::Bytes;
use covenant_core::{Issue, IssuePath, Issues, RequestShape, Schema};
use http::header::CONTENT_TYPE;
use http::HeaderMap;
use http_body_util::BodyExt;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::types::Request;

/// The four request parts, read but not yet validated.
#[derive(Debug, Clone)]
pub struct RequestParts {
    /// Parsed body; `Ok(None)` for an empty body, `Err` for invalid JSON.
    /// See [`validate_shape`] for how an empty body meets the schema.
    pub body: Result<Option<Value>, String>,
    /// Headers as an object of strings.
    pub headers: Value,
    /// Query as an object of strings (arrays for repeated keys).
    pub query: Result<Value, String>,
    /// Path parameters as an object of strings.
    pub params: Value,
}

impl RequestParts {
    /// Reads every part of `request`.
    pub async fn read(request: Request, params: &HashMap<String, String>) -> Self {
        let (head, body) = request.into_parts();
        let bytes = body
            .collect()
            .await
            .map(http_body_util::Collected::to_bytes)
            .unwrap_or_default();

        Self {
            body: body_to_json(&bytes).map_err(|e| e.to_string()),
            headers: headers_to_json(&head.headers),
            query: query_to_json(head.uri.query()).map_err(|e| e.to_string()),
            params: params_to_json(params),
        }
    }
}

/// Validated request parts. Undeclared parts are `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedParts {
    /// Parsed body.
    pub body: Value,
    /// Parsed headers.
    pub headers: Value,
    /// Parsed query.
    pub query: Value,
    /// Parsed path parameters.
    pub params: Value,
}

/// Validates `parts` against `shape`, in order body, headers, query, params.
///
/// Every issue from every part is collected before returning. An empty
/// body is `null` when the body schema is nullable and required, and
/// absent otherwise.
pub fn validate_shape(shape: &RequestShape, parts: &RequestParts) -> Result<ParsedParts, Issues> {
    let mut issues = Issues::new();
    let root = IssuePath::root();

    let body = match (&shape.body, &parts.body) {
        (None, _) => Value::Null,
        (Some(_), Err(message)) => {
            issues.push(Issue::new(
                root.key("body"),
                format!("Invalid JSON: {message}"),
            ));
            Value::Null
        }
        (Some(schema), Ok(value)) => {
            let null = Value::Null;
            let value = value.as_ref().or_else(|| empty_body(schema, &null));
            collect(schema.parse_at(value, &root.key("body")), &mut issues)
        }
    };

    let headers = text_part(shape.headers.as_ref(), Ok(&parts.headers), "headers", &mut issues);
    let query = text_part(shape.query.as_ref(), parts.query.as_ref(), "query", &mut issues);
    let params = text_part(shape.params.as_ref(), Ok(&parts.params), "params", &mut issues);

    if issues.is_empty() {
        Ok(ParsedParts {
            body,
            headers,
            query,
            params,
        })
    } else {
        Err(issues)
    }
}

/// An empty body reads as `null` for a required nullable body schema.
/// Otherwise it is absent, so optional schemas accept it, defaults apply
/// and required schemas report `Required`.
fn empty_body<'v>(schema: &Schema, null: &'v Value) -> Option<&'v Value> {
    (schema.is_nullable() && schema.is_required()).then_some(null)
}

fn text_part(
    schema: Option<&Schema>,
    value: Result<&Value, &String>,
    part: &str,
    issues: &mut Issues,
) -> Value {
    let Some(schema) = schema else {
        return Value::Null;
    };
    let path = IssuePath::root().key(part);
    match value {
        Ok(value) => collect(schema.parse_at(Some(&schema.coerce(value)), &path), issues),
        Err(message) => {
            issues.push(Issue::new(path, format!("Malformed {part}: {message}")));
            Value::Null
        }
    }
}

fn collect(result: Result<Value, Issues>, issues: &mut Issues) -> Value {
    match result {
        Ok(value) => value,
        Err(found) => {
            issues.extend(found);
            Value::Null
        }
    }
}

/// Parses a request body. Empty or whitespace-only bodies are `None`.
pub fn body_to_json(bytes: &Bytes) -> Result<Option<Value>, serde_json::Error> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(bytes).map(Some)
}

/// Collects headers into an object. Names are lowercase and the first value wins.
///
/// Values that are not valid UTF-8 are skipped.
pub fn headers_to_json(headers: &HeaderMap) -> Value {
    let mut map = Map::new();
    for (name, value) in headers {
        if map.contains_key(name.as_str()) {
            continue;
        }
        if let Ok(value) = value.to_str() {
            map.insert(name.as_str().to_string(), Value::String(value.to_string()));
        }
    }
    Value::Object(map)
}

/// Parses a query string into an object. Repeated keys become arrays.
pub fn query_to_json(query: Option<&str>) -> Result<Value, serde_urlencoded::de::Error> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query.unwrap_or_default())?;

    let mut map = Map::new();
    for (key, value) in pairs {
        let value = Value::String(value);
        match map.get_mut(&key) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(key, value);
            }
        }
    }
    Ok(Value::Object(map))
}

/// Converts matched path parameters into an object.
pub fn params_to_json(params: &HashMap<String, String>) -> Value {
    Value::Object(
        params
            .iter()
            .map(|(name, value)| (name.clone(), Value::String(value.clone())))
            .collect(),
    )
}

/// Returns `true` if the request declares a JSON body or no content type at all.
pub fn is_json_content_type(headers: &HeaderMap) -> bool {
    let Some(value) = headers.get(CONTENT_TYPE) else {
        return true;
    };
    let Ok(value) = value.to_str() else {
        return false;
    };
    let essence = value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || (essence.starts_with("application/") && essence.ends_with("+json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use serde_json::json;

    fn parts(body: &str, query: Option<&str>, params: &[(&str, &str)]) -> RequestParts {
        let mut headers = HeaderMap::new();
        headers.insert("x-tenant", HeaderValue::from_static("acme"));
        RequestParts {
            body: body_to_json(&Bytes::from(body.to_string())).map_err(|e| e.to_string()),
            headers: headers_to_json(&headers),
            query: query_to_json(query).map_err(|e| e.to_string()),
            params: params_to_json(
                &params
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
            ),
        }
    }

    fn messages(issues: &Issues) -> Vec<(String, String)> {
        issues
            .iter()
            .map(|i| (i.path.to_string(), i.message.clone()))
            .collect()
    }

    #[test]
    fn test_query_repeated_keys_become_arrays() {
        let query = query_to_json(Some("tag=a&limit=5&tag=b&tag=c")).unwrap();
        assert_eq!(query, json!({ "tag": ["a", "b", "c"], "limit": "5" }));
    }

    #[test]
    fn test_query_percent_decoding() {
        let query = query_to_json(Some("q=hello%20world&name=J%C3%BCrgen")).unwrap();
        assert_eq!(query, json!({ "q": "hello world", "name": "Jürgen" }));
        assert_eq!(query_to_json(None).unwrap(), json!({}));
    }

    #[test]
    fn test_headers_first_value_wins() {
        let mut headers = HeaderMap::new();
        headers.append("X-Trace", HeaderValue::from_static("one"));
        headers.append("x-trace", HeaderValue::from_static("two"));
        assert_eq!(headers_to_json(&headers), json!({ "x-trace": "one" }));
    }

    #[test]
    fn test_empty_body_is_none() {
        assert_eq!(body_to_json(&Bytes::from_static(b"  \n")).unwrap(), None);
        assert_eq!(
            body_to_json(&Bytes::from_static(b"{\"a\":1}")).unwrap(),
            Some(json!({ "a": 1 }))
        );
        assert!(body_to_json(&Bytes::from_static(b"{oops")).is_err());
    }

    #[test]
    fn test_json_content_types() {
        let mut headers = HeaderMap::new();
        assert!(is_json_content_type(&headers));

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json; charset=utf-8"));
        assert!(is_json_content_type(&headers));

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/problem+json"));
        assert!(is_json_content_type(&headers));

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        assert!(!is_json_content_type(&headers));
    }

    #[test]
    fn test_validate_shape_collects_every_part() {
        let shape = RequestShape {
            body: Some(Schema::object([
                ("name", Schema::string()),
                ("age", Schema::integer()),
            ])),
            headers: None,
            query: Some(Schema::object([("limit", Schema::integer().maximum(10))])),
            params: Some(Schema::object([("id", Schema::integer())])),
        };

        let issues = validate_shape(
            &shape,
            &parts(r#"{"age":"x"}"#, Some("limit=50"), &[("id", "abc")]),
        )
        .unwrap_err();

        assert_eq!(
            messages(&issues),
            [
                ("body.name".to_string(), "Required".to_string()),
                (
                    "body.age".to_string(),
                    "Expected integer, received string".to_string()
                ),
                (
                    "query.limit".to_string(),
                    "Number must be less than or equal to 10".to_string()
                ),
                (
                    "params.id".to_string(),
                    "Expected integer, received string".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_validate_shape_coerces_text_parts() {
        let shape = RequestShape {
            body: None,
            headers: Some(Schema::object([("x-tenant", Schema::string())])),
            query: Some(Schema::object([
                ("limit", Schema::integer().default_value(20)),
                ("active", Schema::boolean().optional()),
            ])),
            params: Some(Schema::object([("id", Schema::integer())])),
        };

        let parsed = validate_shape(&shape, &parts("", Some("active=true"), &[("id", "7")])).unwrap();
        assert_eq!(parsed.body, Value::Null);
        assert_eq!(parsed.headers, json!({ "x-tenant": "acme" }));
        assert_eq!(parsed.query, json!({ "limit": 20, "active": true }));
        assert_eq!(parsed.params, json!({ "id": 7 }));
    }

    #[test]
    fn test_invalid_json_is_one_issue() {
        let shape = RequestShape {
            body: Some(Schema::object([("name", Schema::string())])),
            ..RequestShape::default()
        };
        let issues = validate_shape(&shape, &parts("{not json", None, &[])).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues.as_slice()[0].path.to_string(), "body");
        assert!(issues.as_slice()[0].message.starts_with("Invalid JSON"));
    }

    #[test]
    fn test_empty_body_is_null_for_nullable_schema() {
        let shape = RequestShape {
            body: Some(Schema::object([("a", Schema::string())]).nullable()),
            ..RequestShape::default()
        };
        let parsed = validate_shape(&shape, &parts("", None, &[])).unwrap();
        assert_eq!(parsed.body, Value::Null);

        let parsed = validate_shape(&shape, &parts("null", None, &[])).unwrap();
        assert_eq!(parsed.body, Value::Null);
    }

    #[test]
    fn test_empty_body_is_absent_for_optional_schema() {
        let shape = RequestShape {
            body: Some(
                Schema::object([("a", Schema::string())])
                    .optional()
                    .default_value(json!({ "a": "x" })),
            ),
            ..RequestShape::default()
        };
        let parsed = validate_shape(&shape, &parts("", None, &[])).unwrap();
        assert_eq!(parsed.body, json!({ "a": "x" }));
    }

    #[test]
    fn test_missing_required_body() {
        let shape = RequestShape {
            body: Some(Schema::object([("name", Schema::string())])),
            ..RequestShape::default()
        };
        let issues = validate_shape(&shape, &parts("", None, &[])).unwrap_err();
        assert_eq!(messages(&issues), [("body".to_string(), "Required".to_string())]);
    }
}
