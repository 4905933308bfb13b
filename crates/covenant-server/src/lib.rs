//! # Covenant Server
//!
//! Serving infrastructure for Covenant contracts:
//!
//! - [`Router`]: method and path matching with duplicate route detection
//! - [`ContractService`]: HTTP middleware, routing, the contract pipeline
//!   and the OpenAPI endpoint behind one `handle` call
//! - [`Server`]: HTTP/1.1 via Hyper, with body limits, timeouts and
//!   graceful shutdown
//!
//! ## Example
//!
//! ```rust,no_run
//! use covenant_config::ConfigLoader;
//! use covenant_core::fixtures;
//! use covenant_server::{init_telemetry, ContractService, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new()
//!         .with_optional_file("covenant.toml")?
//!         .load()?;
//!     init_telemetry(&config)?;
//!
//!     let service = ContractService::builder()
//!         .config(config)
//!         .service_name("users")
//!         .contracts(fixtures::user_service_contracts()?)?
//!         .build()?;
//!
//!     Server::new(service).run().await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/covenant-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod router;
mod server;
mod service;
pub mod shutdown;
mod telemetry;

pub use error::{ServerError, ServerResult};
pub use router::{RouteMatch, Router};
pub use server::Server;
pub use service::{ContractService, ContractServiceBuilder, DOCS_OPERATION};
pub use shutdown::ShutdownSignal;
pub use telemetry::{init_telemetry, telemetry_config};
