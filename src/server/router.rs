use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::server::handlers::{chat, health, ingest};
use crate::state::AppState;

/// Creates the application router.
///
/// The HTTP surface is deliberately narrow: one route per core operation
/// plus health. Everything else (rendering, history persistence, export)
/// belongs to the caller.
pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/api/chat", post(chat::chat))
        .route("/api/metrics", get(chat::metrics))
        .route("/api/ingest", post(ingest::ingest))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}
