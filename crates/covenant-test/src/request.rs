//! Request builder for the test client.

use crate::error::TestError;
use crate::response::TestResponse;
use bytes::Bytes;
use covenant_middleware::types::Request;
use covenant_server::ContractService;
use http::header::{HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, Method};
use http_body_util::Full;
use serde::Serialize;

/// A request under construction, bound to a [`TestClient`](crate::TestClient).
///
/// Builder errors (a bad header, a body that fails to serialize) are held
/// until [`send`](Self::send) or [`try_send`](Self::try_send).
#[must_use]
pub struct TestRequest<'a> {
    service: &'a ContractService,
    method: Method,
    path: String,
    query: Vec<String>,
    headers: HeaderMap,
    body: Bytes,
    error: Option<TestError>,
}

impl<'a> TestRequest<'a> {
    pub(crate) fn new(service: &'a ContractService, method: Method, path: impl Into<String>) -> Self {
        Self {
            service,
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            error: None,
        }
    }

    /// Adds a header. Repeated names are appended, not replaced.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        let parsed = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| e.to_string())
            .and_then(|n| {
                HeaderValue::from_str(value.as_ref())
                    .map(|v| (n, v))
                    .map_err(|e| e.to_string())
            });

        match parsed {
            Ok((name, value)) => {
                self.headers.append(name, value);
            }
            Err(reason) => self.fail(TestError::InvalidHeader {
                name: name.to_string(),
                reason,
            }),
        }
        self
    }

    /// Sets `Authorization: Bearer <token>`.
    pub fn bearer_token(mut self, token: impl AsRef<str>) -> Self {
        self.headers.remove(AUTHORIZATION);
        self.header(AUTHORIZATION.as_str(), format!("Bearer {}", token.as_ref()))
    }

    /// Sets the `Content-Type` header.
    pub fn content_type(mut self, content_type: impl AsRef<str>) -> Self {
        self.headers.remove(CONTENT_TYPE);
        self.header(CONTENT_TYPE.as_str(), content_type)
    }

    /// Appends a percent-encoded query pair.
    pub fn query(mut self, key: impl AsRef<str>, value: impl ToString) -> Self {
        self.query.push(format!(
            "{}={}",
            urlencoding::encode(key.as_ref()),
            urlencoding::encode(&value.to_string())
        ));
        self
    }

    /// Sets a raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Serializes `value` as the JSON body and sets `Content-Type`.
    pub fn json<T: Serialize>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => {
                self.body = Bytes::from(bytes);
                self.content_type("application/json")
            }
            Err(err) => {
                self.fail(err.into());
                self
            }
        }
    }

    /// The request URI, path plus encoded query.
    #[must_use]
    pub fn uri(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let separator = if self.path.contains('?') { '&' } else { '?' };
        format!("{}{}{}", self.path, separator, self.query.join("&"))
    }

    /// Sends the request through the service.
    ///
    /// # Panics
    ///
    /// Panics if the request could not be built; use
    /// [`try_send`](Self::try_send) to get the error instead.
    pub async fn send(self) -> TestResponse {
        match self.try_send().await {
            Ok(response) => response,
            Err(err) => panic!("test request failed: {err}"),
        }
    }

    /// Sends the request through the service, returning builder errors.
    pub async fn try_send(self) -> Result<TestResponse, TestError> {
        let service = self.service;
        let request = self.build()?;
        let response = service.handle(request).await;
        TestResponse::from_http(response).await
    }

    fn build(self) -> Result<Request, TestError> {
        let uri = self.uri();
        if let Some(err) = self.error {
            return Err(err);
        }

        let mut builder = http::Request::builder().method(self.method).uri(uri);
        if let Some(headers) = builder.headers_mut() {
            *headers = self.headers;
        }
        builder
            .body(Full::new(self.body))
            .map_err(|e| TestError::RequestBuild(e.to_string()))
    }

    fn fail(&mut self, err: TestError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }
}

impl std::fmt::Debug for TestRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestRequest")
            .field("method", &self.method)
            .field("uri", &self.uri())
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TestClient;
    use covenant_core::fixtures;
    use http::StatusCode;
    use serde_json::json;

    fn client() -> TestClient {
        let service = ContractService::builder()
            .contracts(fixtures::user_service_contracts().unwrap())
            .unwrap()
            .build()
            .unwrap();
        TestClient::new(service)
    }

    #[test]
    fn test_query_is_encoded() {
        let client = client();
        let request = client
            .get("/users")
            .query("limit", 1)
            .query("name", "a b&c");
        assert_eq!(request.uri(), "/users?limit=1&name=a%20b%26c");

        let request = client.get("/users?sort=name").query("limit", 5);
        assert_eq!(request.uri(), "/users?sort=name&limit=5");
    }

    #[test]
    fn test_json_sets_content_type() {
        let client = client();
        let request = client.post("/users").json(&json!({ "name": "Ann" }));
        let built = request.build().unwrap();

        assert_eq!(built.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(built.method(), Method::POST);
    }

    #[tokio::test]
    async fn test_invalid_header_surfaces_on_send() {
        let client = client();
        let result = client
            .get("/users")
            .header("x-bad", "line\nbreak")
            .try_send()
            .await;

        match result {
            Err(TestError::InvalidHeader { name, .. }) => assert_eq!(name, "x-bad"),
            other => panic!("expected invalid header error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_query_reaches_contract() {
        let response = client().get("/users").query("limit", 1).send().await;

        response.assert_status(StatusCode::OK);
        let body: serde_json::Value = response.json().unwrap();
        assert_eq!(body["users"].as_array().unwrap().len(), 1);
        assert_eq!(body["total"], 2);
    }

    #[tokio::test]
    async fn test_raw_body_with_wrong_content_type_is_415() {
        let response = client()
            .post("/users")
            .bearer_token("alice")
            .content_type("text/plain")
            .body("name=Ann")
            .send()
            .await;

        response.assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }
}
