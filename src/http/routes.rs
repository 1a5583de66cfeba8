use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Segment + final recording ingestion
        .route("/api/transcription/segment", post(handlers::ingest_segment))
        .route("/api/transcription/final", post(handlers::ingest_final))
        // Live progress stream
        .route(
            "/api/transcription/stream/:session_id",
            get(handlers::stream_session),
        )
        // The capture client runs in a browser shell
        .layer(CorsLayer::permissive())
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
