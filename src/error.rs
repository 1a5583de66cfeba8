//! Error taxonomy shared across the ingestion and upload pipelines

use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure classification surfaced to clients.
///
/// These codes appear in session `error` events and in upload failure
/// callbacks, so their wire names are stable snake_case strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// No active session or a microphone-level capture failure
    CaptureError,
    /// Malformed WAV, wrong format or duration
    ValidationError,
    /// Transcription service failure (5xx/429 exhausted)
    ApiError,
    /// Ingestion pipeline failure unrelated to the above
    StorageError,
    /// Generic transport failure, not otherwise classified
    NetworkError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::CaptureError => "capture_error",
            ErrorCode::ValidationError => "validation_error",
            ErrorCode::ApiError => "api_error",
            ErrorCode::StorageError => "storage_error",
            ErrorCode::NetworkError => "network_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
