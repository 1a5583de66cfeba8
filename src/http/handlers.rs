use super::state::AppState;
use crate::audio::parse_wav_header;
use crate::error::ErrorCode;
use crate::session::{SegmentMetadata, SessionStatus};
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Json, Response},
};
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{error, info};

/// Segments must cover at least this much audio for the transcription
/// service to handle them reliably
const MIN_SEGMENT_DURATION_MS: f64 = 8_000.0;
const MAX_SEGMENT_DURATION_MS: f64 = 12_000.0;
const SSE_KEEPALIVE_SECS: u64 = 15;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub message: String,
}

fn json_error(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: ErrorDetail {
                code,
                message: message.into(),
            },
        }),
    )
        .into_response()
}

/// Parsed multipart body of a segment upload
struct SegmentForm {
    session_id: String,
    seq_no: u64,
    start_ms: u64,
    end_ms: u64,
    duration_ms: u64,
    overlap_ms: u64,
    file: Vec<u8>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/transcription/segment
/// Ingest one captured segment: validate the WAV, transcribe it, and fold
/// it into the session's stitched transcript
pub async fn ingest_segment(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Response {
    let form = match read_segment_form(multipart).await {
        Ok(form) => form,
        Err(response) => return response,
    };

    let wav_info = match parse_wav_header(&form.file) {
        Ok(info) => info,
        Err(e) => return json_error(StatusCode::BAD_REQUEST, ErrorCode::ValidationError, e.to_string()),
    };

    if wav_info.sample_rate != 16000 || wav_info.num_channels != 1 || wav_info.bit_depth != 16 {
        return json_error(
            StatusCode::BAD_REQUEST,
            ErrorCode::ValidationError,
            "Segments must be 16kHz mono 16-bit PCM WAV",
        );
    }

    if wav_info.duration_ms < MIN_SEGMENT_DURATION_MS || wav_info.duration_ms > MAX_SEGMENT_DURATION_MS
    {
        return json_error(
            StatusCode::BAD_REQUEST,
            ErrorCode::ValidationError,
            "Segment duration must be between 8s and 12s",
        );
    }

    let filename = format!("segment-{}.wav", form.seq_no);
    let transcript = match state.transcriber.transcribe(&form.file, &filename).await {
        Ok(text) => text,
        Err(e) => {
            error!("Segment transcription failed: {:#}", e);
            state
                .store
                .emit_error(&form.session_id, ErrorCode::ApiError, e.to_string());
            return json_error(
                StatusCode::BAD_GATEWAY,
                ErrorCode::ApiError,
                "Transcription API failed",
            );
        }
    };

    let accepted = state.store.add_segment(
        &form.session_id,
        SegmentMetadata {
            seq_no: form.seq_no,
            start_ms: form.start_ms,
            end_ms: form.end_ms,
            duration_ms: form.duration_ms,
            overlap_ms: form.overlap_ms,
            transcript,
        },
    );

    if !accepted {
        return json_error(
            StatusCode::CONFLICT,
            ErrorCode::ValidationError,
            format!("Session {} already completed", form.session_id),
        );
    }

    (StatusCode::OK, Json(OkResponse { ok: true })).into_response()
}

/// POST /api/transcription/final
/// Transcribe the full recording in one pass; its transcript supersedes
/// the segment-stitched text
pub async fn ingest_final(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Response {
    let (session_id, file) = match read_final_form(multipart).await {
        Ok(parts) => parts,
        Err(response) => return response,
    };

    info!("Finalizing session {}", session_id);
    state.store.set_status(&session_id, SessionStatus::Finalizing);

    let wav_info = match parse_wav_header(&file) {
        Ok(info) => info,
        Err(e) => return json_error(StatusCode::BAD_REQUEST, ErrorCode::ValidationError, e.to_string()),
    };

    if wav_info.sample_rate != 16000 || wav_info.num_channels != 1 || wav_info.bit_depth != 16 {
        return json_error(
            StatusCode::BAD_REQUEST,
            ErrorCode::ValidationError,
            "Final recording must be 16kHz mono 16-bit PCM WAV",
        );
    }

    let filename = format!("{}-final.wav", session_id);
    match state.transcriber.transcribe(&file, &filename).await {
        Ok(transcript) => {
            state.store.set_final_transcript(&session_id, transcript);
            (StatusCode::OK, Json(OkResponse { ok: true })).into_response()
        }
        Err(e) => {
            error!("Final transcription failed: {:#}", e);
            state
                .store
                .emit_error(&session_id, ErrorCode::ApiError, e.to_string());
            json_error(
                StatusCode::BAD_GATEWAY,
                ErrorCode::ApiError,
                "Transcription API failed",
            )
        }
    }
}

/// GET /api/transcription/stream/:session_id
/// Server-sent event stream of a session's progress. Subscribing delivers
/// an immediate status snapshot, then one event per store mutation.
pub async fn stream_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("Event stream opened for session {}", session_id);

    let subscription = state.store.subscribe(&session_id);
    let stream = subscription.map(|event| {
        Ok(Event::default()
            .event(event.name())
            .data(event.payload_json().to_string()))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(SSE_KEEPALIVE_SECS))
            .text("keepalive"),
    )
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

// ============================================================================
// Multipart parsing
// ============================================================================

async fn read_segment_form(mut multipart: Multipart) -> Result<SegmentForm, Response> {
    let mut session_id = None;
    let mut seq_no = None;
    let mut start_ms = None;
    let mut end_ms = None;
    let mut duration_ms = None;
    let mut overlap_ms = None;
    let mut file = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                error!("Segment ingestion failed reading multipart body: {}", e);
                return Err(json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::StorageError,
                    "Failed to process audio segment",
                ));
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "session_id" => session_id = Some(field_text(field).await?),
            "seq_no" => seq_no = Some(field_number(field).await?),
            "start_ms" => start_ms = Some(field_number(field).await?),
            "end_ms" => end_ms = Some(field_number(field).await?),
            "duration_ms" => duration_ms = Some(field_number(field).await?),
            "overlap_ms" => overlap_ms = Some(field_number(field).await?),
            "file" => file = Some(field_bytes(field).await?),
            _ => {}
        }
    }

    match (session_id, seq_no, start_ms, end_ms, duration_ms, overlap_ms, file) {
        (
            Some(session_id),
            Some(seq_no),
            Some(start_ms),
            Some(end_ms),
            Some(duration_ms),
            Some(overlap_ms),
            Some(file),
        ) => Ok(SegmentForm {
            session_id,
            seq_no,
            start_ms,
            end_ms,
            duration_ms,
            overlap_ms,
            file,
        }),
        _ => Err(json_error(
            StatusCode::BAD_REQUEST,
            ErrorCode::ValidationError,
            "Missing required metadata or file",
        )),
    }
}

async fn read_final_form(mut multipart: Multipart) -> Result<(String, Vec<u8>), Response> {
    let mut session_id = None;
    let mut file = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                error!("Final ingestion failed reading multipart body: {}", e);
                return Err(json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::StorageError,
                    "Failed to process final recording",
                ));
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "session_id" => session_id = Some(field_text(field).await?),
            "file" => file = Some(field_bytes(field).await?),
            _ => {}
        }
    }

    match (session_id, file) {
        (Some(session_id), Some(file)) => Ok((session_id, file)),
        _ => Err(json_error(
            StatusCode::BAD_REQUEST,
            ErrorCode::ValidationError,
            "Missing session_id or file",
        )),
    }
}

async fn field_text(field: axum::extract::multipart::Field<'_>) -> Result<String, Response> {
    field.text().await.map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            ErrorCode::ValidationError,
            "Missing required metadata or file",
        )
    })
}

async fn field_number(field: axum::extract::multipart::Field<'_>) -> Result<u64, Response> {
    let text = field_text(field).await?;
    text.parse().map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            ErrorCode::ValidationError,
            "Missing required metadata or file",
        )
    })
}

async fn field_bytes(field: axum::extract::multipart::Field<'_>) -> Result<Vec<u8>, Response> {
    Ok(field
        .bytes()
        .await
        .map_err(|_| {
            json_error(
                StatusCode::BAD_REQUEST,
                ErrorCode::ValidationError,
                "Missing required metadata or file",
            )
        })?
        .to_vec())
}
