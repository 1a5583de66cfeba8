//! Transcription capability boundary
//!
//! The pipeline treats transcription as an opaque capability: bytes of
//! 16kHz mono 16-bit PCM WAV in, text out. Handlers receive it as an
//! injected trait object so tests can substitute a scripted transcriber.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

/// Opaque `transcribe(bytes) -> text` capability.
#[async_trait::async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, wav: &[u8], filename: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: Option<String>,
}

/// Hosted Whisper-compatible transcription endpoint.
pub struct WhisperTranscriber {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl WhisperTranscriber {
    pub fn new(endpoint: String, api_key: String, model: String) -> Self {
        info!("Transcriber configured: {} (model {})", endpoint, model);
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            model,
        }
    }
}

#[async_trait::async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, wav: &[u8], filename: &str) -> Result<String> {
        let file_part = reqwest::multipart::Part::bytes(wav.to_vec())
            .file_name(filename.to_string())
            .mime_str("audio/wav")
            .context("Failed to build multipart file part")?;
        let form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("model", self.model.clone());

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .context("Transcription request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Transcription failed: {} {}", status.as_u16(), body);
        }

        let result: TranscriptionResponse = response
            .json()
            .await
            .context("Failed to decode transcription response")?;

        let text = result.text.unwrap_or_default().trim().to_string();
        debug!("Transcribed {} ({} chars)", filename, text.len());
        Ok(text)
    }
}
