use crate::session::SessionStore;
use crate::transcribe::Transcriber;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// In-memory session registry, shared with the eviction sweep task
    pub store: SessionStore,
    /// Injected transcription capability
    pub transcriber: Arc<dyn Transcriber>,
}

impl AppState {
    pub fn new(store: SessionStore, transcriber: Arc<dyn Transcriber>) -> Self {
        Self { store, transcriber }
    }
}
