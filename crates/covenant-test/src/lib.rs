//! # Covenant Test
//!
//! In-memory testing for Covenant services. Requests are handed straight
//! to [`ContractService::handle`](covenant_server::ContractService::handle),
//! so they pass through the HTTP middleware, the router and the contract
//! pipeline without binding a port.
//!
//! ## Example
//!
//! ```
//! use covenant_core::fixtures;
//! use covenant_server::ContractService;
//! use covenant_test::TestClient;
//! use http::StatusCode;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let service = ContractService::builder()
//!     .contracts(fixtures::user_service_contracts().unwrap())
//!     .unwrap()
//!     .build()
//!     .unwrap();
//! let client = TestClient::new(service);
//!
//! let response = client
//!     .post("/users")
//!     .bearer_token("alice")
//!     .json(&json!({ "name": "", "email": "not-an-email" }))
//!     .send()
//!     .await;
//!
//! response.assert_status(StatusCode::BAD_REQUEST);
//! assert_eq!(response.issue_paths().unwrap(), ["body.name", "body.email"]);
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/covenant-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod request;
mod response;

pub use client::TestClient;
pub use error::TestError;
pub use request::TestRequest;
pub use response::TestResponse;
