//! HTTP API server for the capture client
//!
//! This module provides the ingestion and event-stream boundary:
//! - POST /api/transcription/segment - Ingest one captured segment
//! - POST /api/transcription/final - Ingest the full recording
//! - GET /api/transcription/stream/:session_id - SSE progress stream
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
