use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;

/// Lifecycle of one recording session.
///
/// `recording -> finalizing -> completed`, with `error` reachable from
/// any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Recording,
    Finalizing,
    Completed,
    Error,
}

/// Per-segment transcription result, keyed by sequence number in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentMetadata {
    pub seq_no: u64,
    pub start_ms: u64,
    pub end_ms: u64,
    pub duration_ms: u64,
    pub overlap_ms: u64,
    pub transcript: String,
}

/// One event on a session's subscriber stream.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum SessionEvent {
    Segment(SegmentEvent),
    Status(StatusEvent),
    Final(FinalEvent),
    Error(ErrorEvent),
}

impl SessionEvent {
    /// Wire name used as the SSE event field.
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Segment(_) => "segment",
            SessionEvent::Status(_) => "status",
            SessionEvent::Final(_) => "final",
            SessionEvent::Error(_) => "error",
        }
    }

    /// The event payload alone, for the SSE data field.
    pub fn payload_json(&self) -> serde_json::Value {
        let value = match self {
            SessionEvent::Segment(payload) => serde_json::to_value(payload),
            SessionEvent::Status(payload) => serde_json::to_value(payload),
            SessionEvent::Final(payload) => serde_json::to_value(payload),
            SessionEvent::Error(payload) => serde_json::to_value(payload),
        };
        value.unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SegmentEvent {
    pub session_id: String,
    pub seq_no: u64,
    pub start_ms: u64,
    pub end_ms: u64,
    pub duration_ms: u64,
    pub overlap_ms: u64,
    /// This segment's own transcript
    pub transcript: String,
    /// The freshly recomputed full stitched transcript
    pub stitched_text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusEvent {
    pub session_id: String,
    pub status: SessionStatus,
    pub stitched_text: String,
    pub final_transcript: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinalEvent {
    pub session_id: String,
    pub final_transcript: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEvent {
    pub session_id: String,
    pub code: ErrorCode,
    pub message: String,
}
