//! Test client for in-memory HTTP testing.

use crate::request::TestRequest;
use covenant_server::ContractService;
use http::Method;

/// A test client that drives a [`ContractService`] without a network.
///
/// Requests go through the full service: HTTP middleware, routing, the
/// contract pipeline and the OpenAPI endpoint.
///
/// # Example
///
/// ```
/// use covenant_core::fixtures;
/// use covenant_server::ContractService;
/// use covenant_test::TestClient;
/// use http::StatusCode;
///
/// # tokio_test::block_on(async {
/// let service = ContractService::builder()
///     .contracts(fixtures::user_service_contracts().unwrap())
///     .unwrap()
///     .build()
///     .unwrap();
/// let client = TestClient::new(service);
///
/// let response = client.get("/users/1").send().await;
/// response.assert_status(StatusCode::OK);
/// # });
/// ```
#[derive(Debug, Clone)]
#[must_use]
pub struct TestClient {
    service: ContractService,
    default_headers: Vec<(String, String)>,
}

impl TestClient {
    /// Creates a client for `service`.
    pub fn new(service: ContractService) -> Self {
        Self {
            service,
            default_headers: Vec::new(),
        }
    }

    /// Adds a header sent with every request.
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Sends every request with `Authorization: Bearer <token>`.
    pub fn with_bearer_token(self, token: impl AsRef<str>) -> Self {
        let value = format!("Bearer {}", token.as_ref());
        self.with_default_header("authorization", value)
    }

    /// The service under test.
    #[must_use]
    pub fn service(&self) -> &ContractService {
        &self.service
    }

    /// Starts a GET request.
    pub fn get(&self, path: impl Into<String>) -> TestRequest<'_> {
        self.request(Method::GET, path)
    }

    /// Starts a POST request.
    pub fn post(&self, path: impl Into<String>) -> TestRequest<'_> {
        self.request(Method::POST, path)
    }

    /// Starts a PUT request.
    pub fn put(&self, path: impl Into<String>) -> TestRequest<'_> {
        self.request(Method::PUT, path)
    }

    /// Starts a PATCH request.
    pub fn patch(&self, path: impl Into<String>) -> TestRequest<'_> {
        self.request(Method::PATCH, path)
    }

    /// Starts a DELETE request.
    pub fn delete(&self, path: impl Into<String>) -> TestRequest<'_> {
        self.request(Method::DELETE, path)
    }

    /// Starts a request with an arbitrary method.
    pub fn request(&self, method: Method, path: impl Into<String>) -> TestRequest<'_> {
        let mut request = TestRequest::new(&self.service, method, path);
        for (name, value) in &self.default_headers {
            request = request.header(name, value);
        }
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_core::fixtures;
    use http::StatusCode;
    use serde_json::{json, Value};

    fn client() -> TestClient {
        let service = ContractService::builder()
            .contracts(fixtures::user_service_contracts().unwrap())
            .unwrap()
            .build()
            .unwrap();
        TestClient::new(service)
    }

    #[tokio::test]
    async fn test_get_user() {
        let response = client().get("/users/2").send().await;

        response.assert_status(StatusCode::OK);
        let user: fixtures::User = response.json().unwrap();
        assert_eq!(user.name, "Bob");
    }

    #[tokio::test]
    async fn test_default_bearer_token() {
        let client = client().with_bearer_token("carol");

        let response = client
            .post("/users")
            .json(&json!({ "name": "Carol", "email": "carol@example.com" }))
            .send()
            .await;

        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json().unwrap();
        assert_eq!(body["id"], 3);
        assert!(body.get("created_by").is_none());
    }

    #[tokio::test]
    async fn test_all_methods_reach_router() {
        let client = client();

        client.get("/users").send().await.assert_status(StatusCode::OK);
        client.post("/users").send().await.assert_status(StatusCode::BAD_REQUEST);
        client
            .put("/users")
            .send()
            .await
            .assert_status(StatusCode::METHOD_NOT_ALLOWED);
        client
            .patch("/users/1")
            .send()
            .await
            .assert_status(StatusCode::METHOD_NOT_ALLOWED);
        client
            .delete("/users/1")
            .bearer_token("admin")
            .send()
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_unknown_path() {
        let response = client().get("/orders").send().await;

        response.assert_status(StatusCode::NOT_FOUND);
        let body: Value = response.json().unwrap();
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }
}
