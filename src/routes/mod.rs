//! Router assembly: WebSocket upgrade, HTTP endpoints, static presentation
//! files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::config::PlayerConfig;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws` (one player session per connection)
/// - Health + metadata under `/api/v1/...`
/// - The presentation layer from `./static` with index fallback
/// - CORS (allow any origin/method/headers) – hosts embed the player cross-origin
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(config: Arc<PlayerConfig>) -> Router {
    // Static files with SPA fallback
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/metadata", get(http::http_metadata))
        // State + CORS + HTTP tracing
        .with_state(config)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Presentation fallback
        .fallback_service(static_service)
}
