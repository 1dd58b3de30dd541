//! HTTP interface for the import service
//!
//! Handlers stay thin: they authenticate, read the request and hand the work
//! to the [`ImportPipeline`]. Errors are mapped to status codes in
//! [`responses::handle_error`].

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    config::Config,
    ingestor::ImportPipeline,
    repositories::{OperationStore, RosterStore},
    services::ImportRateLimiter,
};

pub mod auth;
pub mod handlers;
pub mod middleware;
pub mod responses;

pub use auth::{StaticTokenVerifier, TokenVerifier};
pub use responses::{handle_error, ApiResponse, ImportResponse};

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(config: &Config, state: AppState) -> Result<Self> {
        let app = Self::create_router(state, config.max_request_size());
        let addr: SocketAddr = format!("{}:{}", config.web.host, config.web.port).parse()?;

        Ok(Self { app, addr })
    }

    /// Create the router with all routes and middleware
    pub fn create_router(state: AppState, max_request_size: usize) -> Router {
        Router::new()
            .route("/health", get(handlers::health::health_check))
            .nest("/api/v1", Self::api_v1_routes())
            // Middleware (applied in reverse order)
            .layer(DefaultBodyLimit::max(max_request_size))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .layer(axum::middleware::from_fn(
                middleware::request_logging_middleware,
            ))
            .with_state(state)
    }

    fn api_v1_routes() -> Router<AppState> {
        Router::new()
            .route(
                "/operations/import",
                post(handlers::operations::import_operations),
            )
            .route("/operations", get(handlers::operations::list_operations))
    }

    pub async fn serve(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        info!("Web server listening on {}", self.addr);
        axum::serve(listener, self.app).await?;
        Ok(())
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub pipeline: ImportPipeline,
    pub roster_store: Arc<dyn RosterStore>,
    pub operation_store: Arc<dyn OperationStore>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub rate_limiter: ImportRateLimiter,
    /// Request body ceiling, reported back when a body is cut off
    pub max_request_size: usize,
}
