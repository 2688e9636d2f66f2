//! Session/transport manager.
//!
//! Each binding accepts connections, gives every session its own
//! [`McpServer`](crate::mcp::McpServer) and message channel, and tears the
//! session down when the client goes away:
//!
//! - [`stdio`]: one implicit session over stdin/stdout
//! - [`sse`]: `GET /sse` stream plus `POST /message`
//! - [`http`]: streamable HTTP on `/mcp` with the `mcp-session-id` header
//!
//! On SIGINT/SIGTERM (Ctrl+C on Windows) every live session of every binding
//! is closed before the HTTP server finishes its graceful shutdown.

pub mod http;
pub mod session;
pub mod sse;
pub mod stdio;

use std::io::{self, IsTerminal};
use std::sync::Arc;

use axum::extract::State;
use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::mcp::server::ServerInfo;
use crate::repo::Repository;
pub use session::{Session, SessionError, SessionGuard, SessionRegistry, TransportKind};
pub use stdio::StdioTransport;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 7424;
/// Default bind address.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Which bindings the process serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// stdin/stdout only.
    #[default]
    Stdio,
    /// SSE stream plus POST endpoint.
    Sse,
    /// Streamable HTTP.
    Http,
    /// Streamable HTTP plus stdio when stdin is piped.
    Dual,
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Stdio => "stdio",
            Self::Sse => "sse",
            Self::Http => "http",
            Self::Dual => "dual",
        };
        f.write_str(name)
    }
}

/// Transport failures that end the process.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The HTTP listener could not bind.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Serving failed.
    #[error("Transport I/O error: {0}")]
    Io(#[from] io::Error),
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpOptions {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins; empty allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cors_origins: Vec::new(),
        }
    }
}

/// State shared by the handlers of one HTTP binding.
#[derive(Debug, Clone)]
pub struct AppState {
    pub repository: Arc<Repository>,
    pub registry: Arc<SessionRegistry>,
}

impl AppState {
    /// Creates state with an empty session registry.
    #[must_use]
    pub fn new(repository: Arc<Repository>) -> Self {
        Self {
            repository,
            registry: Arc::new(SessionRegistry::new()),
        }
    }
}

/// Router for the streamable HTTP binding.
pub fn http_router(state: AppState, cors_origins: &[String]) -> Router {
    with_common_routes(http::routes(), state, cors_origins)
}

/// Router for the SSE binding.
pub fn sse_router(state: AppState, cors_origins: &[String]) -> Router {
    with_common_routes(sse::routes(), state, cors_origins)
}

fn with_common_routes(routes: Router<AppState>, state: AppState, cors_origins: &[String]) -> Router {
    routes
        .route("/health", get(health))
        .route("/connections", get(connections))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "activeConnections": state.registry.len(),
        "serverInfo": ServerInfo::default(),
    }))
}

async fn connections(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "total": state.registry.len(),
        "connections": state.registry.ids(),
    }))
}

/// CORS policy exposing the session header. An empty origin list mirrors
/// the request origin.
#[must_use]
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin.trim()).ok())
        .collect();
    let allow_origin = if allowed.is_empty() {
        AllowOrigin::mirror_request()
    } else {
        AllowOrigin::list(allowed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            ACCEPT,
            HeaderName::from_static(http::SESSION_HEADER),
            HeaderName::from_static(sse::SESSION_HEADER),
        ])
        .expose_headers([HeaderName::from_static(http::SESSION_HEADER)])
}

/// Runs the configured bindings until shutdown.
#[derive(Debug)]
pub struct TransportManager {
    mode: TransportMode,
    http: HttpOptions,
    state: AppState,
    cancel: CancellationToken,
}

impl TransportManager {
    /// Creates a manager for `mode`.
    #[must_use]
    pub fn new(mode: TransportMode, http: HttpOptions, repository: Arc<Repository>) -> Self {
        Self {
            mode,
            http,
            state: AppState::new(repository),
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops every binding when cancelled.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Sessions of the HTTP binding.
    #[must_use]
    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.state.registry)
    }

    /// Serves until stdin closes (stdio) or a shutdown signal arrives.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot bind or the pipe fails.
    pub async fn run(self) -> Result<(), TransportError> {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            match shutdown_signal().await {
                Ok(signal) => {
                    info!(signal, "Received signal, initiating graceful shutdown");
                    cancel.cancel();
                }
                Err(e) => error!(error = %e, "Failed to install signal handlers"),
            }
        });

        info!(mode = %self.mode, "Starting transport");
        match self.mode {
            TransportMode::Stdio => {
                StdioTransport::stdio()
                    .serve(Arc::clone(&self.state.repository), self.cancel.clone())
                    .await?;
            }
            TransportMode::Sse => {
                let router = sse_router(self.state.clone(), &self.http.cors_origins);
                self.serve_http("sse", router).await?;
            }
            TransportMode::Http => {
                let router = http_router(self.state.clone(), &self.http.cors_origins);
                self.serve_http("http", router).await?;
            }
            TransportMode::Dual => {
                if io::stdin().is_terminal() {
                    warn!("Dual transport mode: only HTTP active (no stdio pipe detected)");
                } else {
                    let repository = Arc::clone(&self.state.repository);
                    let cancel = self.cancel.clone();
                    tokio::spawn(async move {
                        if let Err(e) = StdioTransport::stdio().serve(repository, cancel).await {
                            error!(error = %e, "stdio binding failed");
                        }
                    });
                    info!("Dual transport mode: both HTTP and stdio active");
                }
                let router = http_router(self.state.clone(), &self.http.cors_origins);
                self.serve_http("http", router).await?;
            }
        }

        info!("All transports shut down");
        Ok(())
    }

    async fn serve_http(&self, binding: &'static str, router: Router) -> Result<(), TransportError> {
        let addr = format!("{}:{}", self.http.host, self.http.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: addr.clone(),
                source,
            })?;
        info!(%addr, binding, "HTTP server listening");
        info!("Health check available at http://{addr}/health");

        let cancel = self.cancel.clone();
        let registry = Arc::clone(&self.state.registry);
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                cancel.cancelled().await;
                let closed = registry.close_all();
                info!(closed, binding, "Closed active sessions");
            })
            .await?;
        Ok(())
    }
}

#[cfg(unix)]
async fn shutdown_signal() -> io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => Ok("SIGINT"),
        _ = sigterm.recv() => Ok("SIGTERM"),
    }
}

#[cfg(windows)]
async fn shutdown_signal() -> io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl+C")
}
