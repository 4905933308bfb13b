//! Ready-made contracts for tests and examples.
//!
//! The contracts describe a small user service backed by static data:
//!
//! - `listUsers` - GET /users
//! - `getUser` - GET /users/{userId}
//! - `createUser` - POST /users (requires [`auth_middleware`])
//! - `deleteUser` - DELETE /users/{userId} (requires [`auth_middleware`], admin only)
//!
//! # Example
//!
//! ```
//! use covenant_core::fixtures;
//!
//! let contracts = fixtures::user_service_contracts().unwrap();
//! assert_eq!(contracts.len(), 4);
//! ```

use crate::contract::Contract;
use crate::error::ContractError;
use crate::guard::{MiddlewareContract, Outcome, SecurityScheme};
use crate::handler::{Input, Reply};
use crate::schema::Schema;
use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// A user as returned by the fixture service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Identifier.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// E-mail address.
    pub email: String,
}

/// Body of `createUser`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    /// Display name.
    pub name: String,
    /// E-mail address.
    pub email: String,
}

/// Path parameters of `getUser` and `deleteUser`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserPath {
    /// Identifier.
    #[serde(rename = "userId")]
    pub user_id: i64,
}

/// Query of `listUsers`.
#[derive(Debug, Clone, Deserialize)]
pub struct ListQuery {
    /// Page size.
    pub limit: usize,
}

/// Context contributed by [`auth_middleware`].
#[derive(Debug, Clone, Deserialize)]
pub struct AuthContext {
    /// Authenticated user name.
    pub user: String,
    /// `admin` or `member`.
    pub role: String,
}

fn users() -> Vec<User> {
    vec![
        User {
            id: 1,
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
        },
        User {
            id: 2,
            name: "Bob".to_string(),
            email: "bob@example.com".to_string(),
        },
    ]
}

/// Schema of [`User`].
#[must_use]
pub fn user_schema() -> Schema {
    Schema::object([
        ("id", Schema::integer()),
        ("name", Schema::string()),
        ("email", Schema::string().format("email")),
    ])
}

/// Bearer-token middleware. The token is the user name; `admin` gets the admin role.
///
/// Contributes `{ "user": <name>, "role": "admin" | "member" }`.
pub fn auth_middleware() -> Result<Arc<MiddlewareContract>, ContractError> {
    let middleware = MiddlewareContract::builder("auth")
        .description("Authenticates the caller from a bearer token")
        .headers(Schema::object([(
            "authorization",
            Schema::string().pattern("^Bearer .+$")?,
        )]))
        .security(SecurityScheme::bearer())
        .handler(|input| async move {
            let header = input.headers["authorization"].as_str().unwrap_or_default();
            let user = header.trim_start_matches("Bearer ").to_string();
            let role = if user == "admin" { "admin" } else { "member" };
            Outcome::provide(&json!({ "user": user, "role": role }))
        })
        .build()?;
    Ok(Arc::new(middleware))
}

/// Middleware that rejects non-admin callers with 403. Must run after [`auth_middleware`].
pub fn admin_only_middleware() -> Result<Arc<MiddlewareContract>, ContractError> {
    let middleware = MiddlewareContract::builder("adminOnly")
        .handler(|input| async move {
            let outcome = if input.context.get::<String>("role").as_deref() == Some("admin") {
                Outcome::proceed()
            } else {
                Outcome::respond(Reply::json(
                    StatusCode::FORBIDDEN,
                    json!({ "error": { "code": "FORBIDDEN", "message": "admin role required" } }),
                ))
            };
            Ok::<_, ContractError>(outcome)
        })
        .build()?;
    Ok(Arc::new(middleware))
}

/// Builds the four user service contracts.
pub fn user_service_contracts() -> Result<Vec<Contract>, ContractError> {
    let auth = auth_middleware()?;
    let admin_only = admin_only_middleware()?;
    let error_schema = Schema::object([("error", Schema::any())]);

    let list = Contract::builder(Method::GET, "/users")
        .operation_id("listUsers")
        .summary("List users")
        .tag("users")
        .query(Schema::object([(
            "limit",
            Schema::integer().minimum(1).maximum(100).default_value(20),
        )]))
        .response(
            StatusCode::OK,
            "A page of users",
            Schema::object([
                ("users", Schema::array(user_schema())),
                ("total", Schema::integer()),
            ]),
        )
        .handler(|input: Input<Value, ListQuery>| async move {
            let all = users();
            let page: Vec<User> = all.iter().take(input.query.limit).cloned().collect();
            Reply::ok(&json!({ "users": page, "total": all.len() }))
        })
        .build()?;

    let get = Contract::builder(Method::GET, "/users/{userId}")
        .operation_id("getUser")
        .summary("Get a user")
        .tag("users")
        .params(Schema::object([("userId", Schema::integer().minimum(1))]))
        .response(StatusCode::OK, "The user", user_schema())
        .response(StatusCode::NOT_FOUND, "No such user", error_schema)
        .handler(|input: Input<Value, Value, UserPath>| async move {
            let user_id = input.params.user_id;
            match users().into_iter().find(|u| u.id == user_id) {
                Some(user) => Reply::ok(&user),
                None => Err(ContractError::not_found(format!("user {user_id} not found"))),
            }
        })
        .build()?;

    let create = Contract::builder(Method::POST, "/users")
        .operation_id("createUser")
        .summary("Create a user")
        .tag("users")
        .middleware(Arc::clone(&auth))
        .body(Schema::object([
            ("name", Schema::string().min_length(1).max_length(64)),
            ("email", Schema::string().format("email")),
        ]))
        .response(StatusCode::CREATED, "The created user", user_schema())
        .handler(|input: Input<CreateUser>| async move {
            let created_by = input.context.get::<String>("user").unwrap_or_default();
            // Extra fields are stripped by response validation.
            Reply::created(&json!({
                "id": 3,
                "name": input.body.name,
                "email": input.body.email,
                "created_by": created_by,
            }))
        })
        .build()?;

    let delete = Contract::builder(Method::DELETE, "/users/{userId}")
        .operation_id("deleteUser")
        .summary("Delete a user")
        .tag("users")
        .middleware(auth)
        .middleware(admin_only)
        .params(Schema::object([("userId", Schema::integer().minimum(1))]))
        .response_empty(StatusCode::NO_CONTENT, "Deleted")
        .handler(|_input: Input<Value, Value, UserPath>| async move {
            Ok::<_, ContractError>(Reply::no_content())
        })
        .build()?;

    Ok(vec![list, get, create, delete])
}
