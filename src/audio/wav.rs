//! WAV container encoding and boundary validation
//!
//! Encoding uses `hound` to produce the canonical 44-byte mono 16-bit PCM
//! container the transcription service expects. Decoding is a manual chunk
//! walk: the ingestion boundary needs to reject anything that is not plain
//! PCM with a descriptive error before a byte is sent to the service.

use anyhow::{Context, Result};
use std::io::Cursor;
use thiserror::Error;

/// Header fields extracted from a RIFF/WAVE container.
#[derive(Debug, Clone, PartialEq)]
pub struct WavInfo {
    pub sample_rate: u32,
    pub num_channels: u16,
    pub bit_depth: u16,
    pub duration_ms: f64,
    pub data_bytes: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WavError {
    #[error("WAV buffer too small ({0} bytes)")]
    TooSmall(usize),
    #[error("invalid WAV header (missing RIFF/WAVE magic)")]
    InvalidHeader,
    #[error("only PCM WAV files are supported (audio format {0})")]
    UnsupportedFormat(u16),
    #[error("incomplete WAV data")]
    Incomplete,
}

/// Encode samples as a mono 16-bit PCM WAV container.
///
/// Samples are clamped to [-1, 1]; negatives scale by 0x8000 and
/// non-negatives by 0x7fff so the full signed 16-bit range round-trips.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .context("Failed to create WAV writer")?;
        for &sample in samples {
            let clamped = sample.clamp(-1.0, 1.0);
            let value = if clamped < 0.0 {
                (clamped * 0x8000 as f32) as i16
            } else {
                (clamped * 0x7fff as f32) as i16
            };
            writer
                .write_sample(value)
                .context("Failed to write sample to WAV")?;
        }
        writer.finalize().context("Failed to finalize WAV data")?;
    }

    Ok(cursor.into_inner())
}

fn read_u16_le(bytes: &[u8], offset: usize) -> Option<u16> {
    let slice = bytes.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([slice[0], slice[1]]))
}

fn read_u32_le(bytes: &[u8], offset: usize) -> Option<u32> {
    let slice = bytes.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

/// Parse and validate a RIFF/WAVE header.
///
/// Walks the chunk list for `fmt ` and `data`. Fails if the buffer is
/// smaller than the minimum header, the magic mismatches, the format is
/// not PCM, or any of sample rate / channels / bit depth / data size
/// resolves to zero.
pub fn parse_wav_header(bytes: &[u8]) -> Result<WavInfo, WavError> {
    if bytes.len() < 44 {
        return Err(WavError::TooSmall(bytes.len()));
    }

    if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(WavError::InvalidHeader);
    }

    let mut offset = 12usize;
    let mut sample_rate = 0u32;
    let mut num_channels = 0u16;
    let mut bit_depth = 0u16;
    let mut data_bytes = 0u32;

    while offset + 8 <= bytes.len() {
        let chunk_id = &bytes[offset..offset + 4];
        let chunk_size = read_u32_le(bytes, offset + 4).ok_or(WavError::Incomplete)? as usize;
        let chunk_start = offset + 8;

        if chunk_id == b"fmt " {
            let audio_format = read_u16_le(bytes, chunk_start).ok_or(WavError::Incomplete)?;
            if audio_format != 1 {
                return Err(WavError::UnsupportedFormat(audio_format));
            }
            num_channels = read_u16_le(bytes, chunk_start + 2).ok_or(WavError::Incomplete)?;
            sample_rate = read_u32_le(bytes, chunk_start + 4).ok_or(WavError::Incomplete)?;
            bit_depth = read_u16_le(bytes, chunk_start + 14).ok_or(WavError::Incomplete)?;
        } else if chunk_id == b"data" {
            data_bytes = chunk_size as u32;
            break;
        }

        offset = chunk_start + chunk_size;
    }

    if sample_rate == 0 || num_channels == 0 || bit_depth == 0 || data_bytes == 0 {
        return Err(WavError::Incomplete);
    }

    // Duration is derived, not stored in the container
    let bytes_per_sample = bit_depth as f64 / 8.0;
    let total_samples = data_bytes as f64 / bytes_per_sample / num_channels as f64;
    let duration_ms = total_samples / sample_rate as f64 * 1000.0;

    Ok(WavInfo {
        sample_rate,
        num_channels,
        bit_depth,
        duration_ms,
        data_bytes,
    })
}
