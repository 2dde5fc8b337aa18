//! Axum router: maps the HTTP surface onto handlers and layers tracing,
//! compression, and CORS middleware around them.

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{chat::chat, health::health, session::{delete_session, get_session}};
use crate::sse::sse_handler;
use crate::state::{AppState, SharedState};

pub fn build_router(state: AppState) -> Router {
    let shared: SharedState = Arc::new(state);

    Router::new()
        .route("/chat", post(chat))
        .route("/session/{id}", get(get_session).delete(delete_session))
        .route("/health", get(health))
        .route("/events", get(sse_handler))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}
