//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, a body limit sized for
//! audio uploads, and all endpoint handlers.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use parley_core::config::ServerConfig;
use parley_core::error::ParleyError;

use crate::handlers;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let server = &state.config.server;

    // Browser clients served from the same host and port.
    let origins: Vec<HeaderValue> = [
        format!("http://127.0.0.1:{}", server.port),
        format!("http://localhost:{}", server.port),
        format!("http://{}:{}", server.host, server.port),
    ]
    .iter()
    .filter_map(|origin| origin.parse::<HeaderValue>().ok())
    .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let body_limit = server.max_body_bytes;

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/chat", post(handlers::chat))
        .route("/api/transcribe", post(handlers::transcribe))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the configured address and serve until the
/// process is stopped.
pub async fn start_server(server: &ServerConfig, state: AppState) -> Result<(), ParleyError> {
    let addr = format!("{}:{}", server.host, server.port);

    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, router).await?;

    Ok(())
}
