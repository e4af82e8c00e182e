//! HTTP front end for a remote MCP chart server.
//!
//! Each chart request opens its own MCP session, invokes the tool named by
//! the request's `type` and closes the session again.
//!
//! # Routes
//!
//! - `GET /health`, `GET {prefix}/health`
//! - `POST /chart`, `POST {prefix}/chart`, `POST /service/chart`
//!
//! # Example
//!
//! ```ignore
//! use mcp_chart::ClientConfig;
//! use mcp_chart_service::{ChartService, ServiceConfig};
//!
//! let config = ServiceConfig::new(
//!     ClientConfig::default().with_server("http://charts.internal:11121"),
//! );
//! ChartService::new(config).run(shutdown_signal()).await?;
//! ```

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::{Args, ConfigFile, ServiceConfig};
pub use error::{ConfigError, Result, ServiceError};
pub use routes::{ChartRequest, ChartResponse, HealthResponse, NotFoundResponse};
pub use state::AppState;

use std::future::Future;
use std::net::SocketAddr;

use axum::{
    Router,
    http::{Method, header},
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// The chart HTTP service.
pub struct ChartService {
    state: AppState,
}

impl ChartService {
    /// Create a service from resolved configuration.
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            state: AppState::new(config),
        }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        let mut router = Router::new();
        for path in self.state.health_paths() {
            router = router.route(&path, get(routes::health).fallback(routes::not_found));
        }
        for path in self.state.chart_paths() {
            router = router.route(&path, post(routes::chart).fallback(routes::not_found));
        }

        router
            .fallback(routes::not_found)
            .layer(cors_layer())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Listen on the configured port until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.port));
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.router();

        info!(addr = %listener.local_addr()?, "chart service listening");
        info!(paths = ?self.state.health_paths(), "health check paths");
        info!(paths = ?self.state.chart_paths(), "chart paths");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("chart service stopped");
        Ok(())
    }
}

/// Any origin may POST JSON.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}
