//! Delivery seam for the upload controller
//!
//! The controller talks to the ingestion endpoint through the
//! `SegmentTransport` trait and waits through the `Sleeper` trait, so
//! retry and concurrency behavior can be tested against scripted
//! collaborators without a network or a real clock.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::audio::RecordedSegment;
use crate::error::ErrorCode;

/// One delivery attempt's failure, classified for retry decisions.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server answered with a non-success status. `code` carries the
    /// server-supplied taxonomy code when the body included one.
    #[error("upload failed with status {status}: {message}")]
    Status {
        status: u16,
        code: Option<ErrorCode>,
        message: String,
    },
    /// Transport-level failure before a response was received
    #[error("network error: {0}")]
    Network(String),
    /// Request cancelled (session teardown); never retried, never reported
    #[error("upload aborted")]
    Aborted,
}

#[async_trait::async_trait]
pub trait SegmentTransport: Send + Sync {
    async fn send_segment(
        &self,
        session_id: &str,
        segment: &RecordedSegment,
    ) -> Result<(), TransportError>;
}

/// Backoff delay seam.
#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    code: Option<ErrorCode>,
    message: Option<String>,
}

/// Multipart POST to the segment ingestion endpoint.
pub struct HttpSegmentTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSegmentTransport {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait::async_trait]
impl SegmentTransport for HttpSegmentTransport {
    async fn send_segment(
        &self,
        session_id: &str,
        segment: &RecordedSegment,
    ) -> Result<(), TransportError> {
        let file_part = reqwest::multipart::Part::bytes(segment.wav.clone())
            .file_name(format!("segment-{}.wav", segment.seq_no))
            .mime_str("audio/wav")
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .text("session_id", session_id.to_string())
            .text("seq_no", segment.seq_no.to_string())
            .text("start_ms", segment.start_ms.to_string())
            .text("end_ms", segment.end_ms.to_string())
            .text("duration_ms", segment.duration_ms.to_string())
            .text("overlap_ms", segment.overlap_ms.to_string())
            .part("file", file_part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        // Pull the typed error body if the server sent one
        let body: Option<ErrorBody> = response.json().await.ok();
        let detail = body.and_then(|b| b.error);
        let code = detail.as_ref().and_then(|d| d.code);
        let message = detail
            .and_then(|d| d.message)
            .unwrap_or_else(|| format!("Upload failed with status {}", status.as_u16()));

        Err(TransportError::Status {
            status: status.as_u16(),
            code,
            message,
        })
    }
}
