//! HTTP server for the Prometheus metrics endpoint.

use std::net::SocketAddr;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::exposition::CONTENT_TYPE;
use crate::registry::SharedRegistry;

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    registry: SharedRegistry,
}

/// Create the HTTP router.
fn create_router(registry: SharedRegistry, metrics_path: &str) -> Router {
    let state = AppState { registry };

    Router::new()
        .route(metrics_path, get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Handler for the metrics endpoint.
///
/// Collectors block on the Asterisk CLI, so the scrape runs on the blocking pool.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    let registry = state.registry.clone();

    match tokio::task::spawn_blocking(move || registry.render()).await {
        Ok(Ok(body)) => (StatusCode::OK, [("content-type", CONTENT_TYPE)], body).into_response(),
        Ok(Err(e)) => {
            error!(error = %e, "Failed to render metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to render metrics: {}\n", e),
            )
                .into_response()
        }
        Err(e) => {
            error!(error = %e, "Scrape task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "scrape task failed\n").into_response()
        }
    }
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "healthy\n").into_response()
}

/// Handler for the /ready endpoint.
async fn ready_handler(State(state): State<AppState>) -> Response {
    let stats = state.registry.stats();

    if stats.scrapes_total == 0 {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "not ready - no scrape yet\n",
        )
            .into_response()
    } else if !stats.last_failed.is_empty() {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            format!(
                "not ready - failed collectors: {}\n",
                stats.last_failed.join(", ")
            ),
        )
            .into_response()
    } else {
        (StatusCode::OK, "ready\n").into_response()
    }
}

/// HTTP server configuration.
pub struct HttpServer {
    registry: SharedRegistry,
    listen_addr: SocketAddr,
    metrics_path: String,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(registry: SharedRegistry, listen_addr: SocketAddr, metrics_path: String) -> Self {
        Self {
            registry,
            listen_addr,
            metrics_path,
        }
    }

    /// Run the HTTP server until the shutdown signal is received.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.listen_addr, e))?;

        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until the shutdown signal is received.
    pub async fn serve(
        self,
        listener: tokio::net::TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        let router = create_router(self.registry, &self.metrics_path);

        info!(
            addr = %listener.local_addr()?,
            path = %self.metrics_path,
            "HTTP server listening"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                loop {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}
