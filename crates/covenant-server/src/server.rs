//! HTTP server.
//!
//! Serves a [`ContractService`] over HTTP/1.1 with Hyper and Tokio:
//!
//! - one task per accepted connection,
//! - request bodies read up to `server.max_body_bytes` (larger ones get 413),
//! - each request bounded by `server.request_timeout_ms` (slower ones get 408),
//! - graceful shutdown that drains open connections for up to
//!   `server.shutdown_timeout_secs`.
//!
//! # Example
//!
//! ```rust,no_run
//! use covenant_core::fixtures;
//! use covenant_server::{ContractService, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = ContractService::builder()
//!         .contracts(fixtures::user_service_contracts()?)?
//!         .build()?;
//!
//!     Server::new(service).run().await?;
//!     Ok(())
//! }
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use covenant_config::ServerConfig;
use covenant_core::{ContractError, RequestId};
use covenant_middleware::stages::{REQUEST_ID_HEADER, UNMATCHED_OPERATION};
use covenant_middleware::{Request, Response, ResponseExt};
use http::header::{HeaderValue, CONTENT_LENGTH};
use http::HeaderMap;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};

use crate::error::{ServerError, ServerResult};
use crate::service::ContractService;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// The Covenant HTTP server.
#[derive(Debug)]
pub struct Server {
    service: ContractService,
    config: ServerConfig,
}

impl Server {
    /// Creates a server using the service's `server` configuration.
    #[must_use]
    pub fn new(service: ContractService) -> Self {
        let config = service.config().server.clone();
        Self { service, config }
    }

    /// Creates a server with explicit limits.
    #[must_use]
    pub fn with_config(service: ContractService, config: ServerConfig) -> Self {
        Self { service, config }
    }

    /// The server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Binds the configured address and serves until Ctrl+C or SIGTERM.
    pub async fn run(self) -> ServerResult<()> {
        let shutdown = ShutdownSignal::with_os_signals();
        self.run_with_shutdown(shutdown).await
    }

    /// Binds the configured address and serves until `shutdown` fires.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> ServerResult<()> {
        let addr = self.config.http_addr.clone();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        self.serve(listener, shutdown).await
    }

    /// Serves connections from an already bound listener until `shutdown` fires.
    pub async fn serve(self, listener: TcpListener, shutdown: ShutdownSignal) -> ServerResult<()> {
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, routes = self.service.router().len(), "Server listening");

        let drain_timeout = Duration::from_secs(self.config.shutdown_timeout_secs);
        let shared = Arc::new(Shared {
            service: self.service,
            max_body_bytes: self.config.max_body_bytes,
            request_timeout: Duration::from_millis(self.config.request_timeout_ms),
        });
        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote_addr)) => {
                        let shared = Arc::clone(&shared);
                        let token = tracker.acquire();
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            serve_connection(shared, stream, remote_addr, shutdown).await;
                            drop(token);
                        });
                    }
                    Err(e) => tracing::error!(error = %e, "Failed to accept connection"),
                },
                () = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting connections");
                    break;
                }
            }
        }

        let open = tracker.active_connections();
        if open > 0 {
            tracing::info!(connections = open, timeout = ?drain_timeout, "Draining connections");
        }
        if tracker.drain(drain_timeout).await {
            tracing::info!("Server stopped");
        } else {
            tracing::warn!(
                connections = tracker.active_connections(),
                "Drain timeout reached, closing remaining connections"
            );
        }
        Ok(())
    }
}

struct Shared {
    service: ContractService,
    max_body_bytes: usize,
    request_timeout: Duration,
}

async fn serve_connection(
    shared: Arc<Shared>,
    stream: TcpStream,
    remote_addr: SocketAddr,
    shutdown: ShutdownSignal,
) {
    let service = service_fn(move |request: hyper::Request<Incoming>| {
        let shared = Arc::clone(&shared);
        async move { Ok::<_, Infallible>(shared.handle(request).await) }
    });

    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    tokio::select! {
        result = conn.as_mut() => {
            if let Err(e) = result {
                tracing::debug!(remote = %remote_addr, error = %e, "Connection closed with error");
            }
        }
        () = shutdown.recv() => {
            conn.as_mut().graceful_shutdown();
            if let Err(e) = conn.as_mut().await {
                tracing::debug!(remote = %remote_addr, error = %e, "Connection closed with error during shutdown");
            }
        }
    }
}

impl Shared {
    async fn handle(&self, mut request: hyper::Request<Incoming>) -> Response {
        let started = Instant::now();
        let request_id = assign_request_id(request.headers_mut());

        match tokio::time::timeout(self.request_timeout, self.read_and_handle(request, request_id)).await {
            Ok(response) => response,
            Err(_) => {
                let error = ContractError::timeout(format!(
                    "request did not complete within {}ms",
                    self.request_timeout.as_millis()
                ));
                reject(&error, request_id, started)
            }
        }
    }

    async fn read_and_handle(&self, request: hyper::Request<Incoming>, request_id: RequestId) -> Response {
        let started = Instant::now();
        let (parts, body) = request.into_parts();

        let declared_length = parts
            .headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared_length.is_some_and(|len| len > self.max_body_bytes) {
            return reject(&ContractError::payload_too_large(self.max_body_bytes), request_id, started);
        }

        let bytes = match Limited::new(body, self.max_body_bytes).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                return reject(&ContractError::payload_too_large(self.max_body_bytes), request_id, started);
            }
            Err(e) => {
                tracing::debug!(error = %e, "Failed to read request body");
                return reject(
                    &ContractError::invalid(format!("failed to read request body: {e}")),
                    request_id,
                    started,
                );
            }
        };

        let request: Request = http::Request::from_parts(parts, Full::new(bytes));
        self.service.handle(request).await
    }
}

/// Keeps a valid caller id or generates one, and writes it back to the
/// headers so the pipeline logs the same id as the server's rejections.
fn assign_request_id(headers: &mut HeaderMap) -> RequestId {
    let request_id = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(RequestId::parse)
        .unwrap_or_default();
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        headers.insert(REQUEST_ID_HEADER, value);
    }
    request_id
}

/// Builds an error response for requests rejected before routing.
fn reject(error: &ContractError, request_id: RequestId, started: Instant) -> Response {
    let status = error.status_code();
    tracing::warn!(
        request_id = %request_id,
        http.status_code = status.as_u16(),
        error = %error,
        "Request rejected"
    );
    covenant_telemetry::record_request(UNMATCHED_OPERATION, status.as_u16(), started.elapsed());

    let request_id = request_id.to_string();
    let mut response = Response::from_error(error, Some(&request_id), false);
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use covenant_core::{fixtures, Contract, Input, Reply};
    use http::{Method, StatusCode};
    use hyper::client::conn::http1 as client;
    use serde_json::{json, Value};

    type Running = (SocketAddr, ShutdownSignal, tokio::task::JoinHandle<ServerResult<()>>);

    async fn start(config: ServerConfig) -> Running {
        let service = ContractService::builder()
            .contracts(fixtures::user_service_contracts().unwrap())
            .unwrap()
            .build()
            .unwrap();
        start_service(service, config).await
    }

    async fn start_service(service: ContractService, config: ServerConfig) -> Running {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = ShutdownSignal::new();
        let server = Server::with_config(service, config);
        let handle = tokio::spawn(server.serve(listener, shutdown.clone()));
        (addr, shutdown, handle)
    }

    async fn send(addr: SocketAddr, request: hyper::Request<Full<Bytes>>) -> (StatusCode, Value) {
        let (status, _, body) = send_with_headers(addr, request).await;
        (status, body)
    }

    async fn send_with_headers(
        addr: SocketAddr,
        request: hyper::Request<Full<Bytes>>,
    ) -> (StatusCode, HeaderMap, Value) {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (mut sender, conn) = client::handshake(TokioIo::new(stream)).await.unwrap();
        tokio::spawn(conn);

        let response = sender.send_request(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, headers, body)
    }

    fn request(method: Method, path: &str, body: Option<Value>) -> hyper::Request<Full<Bytes>> {
        let builder = hyper::Request::builder()
            .method(method)
            .uri(path)
            .header("host", "localhost")
            .header("authorization", "Bearer carol");
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Full::new(Bytes::from(body.to_string())))
                .unwrap(),
            None => builder.body(Full::new(Bytes::new())).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_serves_contracts_over_http() {
        let (addr, shutdown, handle) = start(ServerConfig::default()).await;

        let (status, body) = send(addr, request(Method::GET, "/users?limit=1", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["users"].as_array().unwrap().len(), 1);

        let (status, body) = send(
            addr,
            request(
                Method::POST,
                "/users",
                Some(json!({ "name": "Carol", "email": "carol@example.com" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["name"], "Carol");

        shutdown.trigger();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_body_over_limit_is_413() {
        let config = ServerConfig {
            max_body_bytes: 16,
            ..Default::default()
        };
        let (addr, shutdown, handle) = start(config).await;

        let (status, body) = send(
            addr,
            request(
                Method::POST,
                "/users",
                Some(json!({ "name": "A very long name indeed", "email": "a@example.com" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");

        shutdown.trigger();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_slow_request_is_408() {
        let slow = Contract::builder(Method::GET, "/slow")
            .operation_id("slow")
            .response_empty(StatusCode::NO_CONTENT, "Eventually")
            .handler(|_input: Input| async move {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok::<_, ContractError>(Reply::no_content())
            })
            .build()
            .unwrap();
        let service = ContractService::builder().contract(slow).unwrap().build().unwrap();
        let config = ServerConfig {
            request_timeout_ms: 50,
            ..Default::default()
        };
        let (addr, shutdown, handle) = start_service(service, config).await;

        let (status, headers, body) = send_with_headers(addr, request(Method::GET, "/slow", None)).await;
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(body["error"]["code"], "TIMEOUT");
        let request_id = headers[REQUEST_ID_HEADER].to_str().unwrap();
        assert!(RequestId::parse(request_id).is_some());
        assert_eq!(body["request_id"], request_id);

        shutdown.trigger();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_before_any_connection() {
        let (_addr, shutdown, handle) = start(ServerConfig {
            shutdown_timeout_secs: 1,
            ..Default::default()
        })
        .await;

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_bind_error() {
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = occupied.local_addr().unwrap();

        let service = ContractService::builder().build().unwrap();
        let server = Server::with_config(
            service,
            ServerConfig {
                http_addr: addr.to_string(),
                ..Default::default()
            },
        );

        let result = server.run_with_shutdown(ShutdownSignal::new()).await;
        assert!(matches!(result, Err(ServerError::Bind { .. })));
    }

    #[test]
    fn test_assign_request_id_writes_header() {
        let mut headers = HeaderMap::new();
        let generated = assign_request_id(&mut headers);
        assert_eq!(headers[REQUEST_ID_HEADER], generated.to_string().as_str());

        let incoming = "01234567-89ab-7def-8123-456789abcdef";
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static(incoming));
        assert_eq!(assign_request_id(&mut headers).to_string(), incoming);
        assert_eq!(headers[REQUEST_ID_HEADER], incoming);

        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("req-42"));
        let replaced = assign_request_id(&mut headers);
        assert_eq!(headers[REQUEST_ID_HEADER], replaced.to_string().as_str());
    }

    #[test]
    fn test_reject_carries_request_id() {
        let request_id = RequestId::new();
        let response = reject(&ContractError::timeout("slow"), request_id, Instant::now());

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(
            response.headers()[REQUEST_ID_HEADER],
            request_id.to_string().as_str()
        );
    }
}
