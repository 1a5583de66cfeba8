//! Segment cutting for live capture
//!
//! Turns a resampled 16kHz stream into fixed-length, overlap-bearing
//! segments ready for independent transcription. The trailing overlap of
//! each segment is re-injected into the buffer so the next segment starts
//! with the same audio, which is what lets the stitcher remove duplicated
//! wording at segment boundaries later.

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use super::buffer::SampleBuffer;
use super::resampler::StreamingResampler;
use super::wav::encode_wav;

/// Configuration for segment cutting
#[derive(Debug, Clone)]
pub struct SegmentConfig {
    /// Sample rate segments are emitted at (transcription expects 16kHz)
    pub target_sample_rate: u32,
    /// Duration of each segment in milliseconds
    pub segment_ms: u64,
    /// Trailing duration re-included at the start of the next segment
    pub overlap_ms: u64,
    /// Minimum trailing audio worth emitting as a padded final segment
    pub min_final_ms: u64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16000,
            segment_ms: 10_000,
            overlap_ms: 250,
            min_final_ms: 8_000,
        }
    }
}

/// A fixed-duration chunk of captured audio, encoded and ready to upload.
#[derive(Debug, Clone)]
pub struct RecordedSegment {
    /// Monotonic per-session sequence number, starting at 0
    pub seq_no: u64,
    /// Start time in milliseconds since capture began
    pub start_ms: u64,
    /// End time in milliseconds since capture began
    pub end_ms: u64,
    /// Segment duration in milliseconds
    pub duration_ms: u64,
    /// Overlap with the next segment in milliseconds
    pub overlap_ms: u64,
    /// Encoded mono 16-bit PCM WAV
    pub wav: Vec<u8>,
}

/// Result of finalizing a recording.
pub struct FinishedRecording {
    /// Trailing audio emitted as one zero-padded segment, if it was long
    /// enough for the transcription service to handle reliably
    pub final_segment: Option<RecordedSegment>,
    /// The whole session as one WAV, used for the final re-transcription
    /// pass. None when no audio was captured.
    pub full_recording: Option<Vec<u8>>,
}

/// Streaming segment recorder: resampler -> sample buffer -> segment cuts.
pub struct SegmentRecorder {
    config: SegmentConfig,
    resampler: StreamingResampler,
    buffer: SampleBuffer,
    /// Every resampled sample, kept for the full-session waveform
    all_samples: Vec<f32>,
    seq_no: u64,
    segment_samples: usize,
    overlap_samples: usize,
    advance_samples: usize,
}

impl SegmentRecorder {
    pub fn new(source_sample_rate: u32, mut config: SegmentConfig) -> Self {
        // The overlap must leave a positive advance per segment, or cutting
        // would never make progress through the buffer
        if config.overlap_ms >= config.segment_ms {
            warn!(
                "Overlap {}ms must be shorter than the {}ms segment; clamping",
                config.overlap_ms, config.segment_ms
            );
            config.overlap_ms = config.segment_ms.saturating_sub(1);
        }

        let rate = config.target_sample_rate;
        let segment_samples = ((config.segment_ms as usize * rate as usize) / 1000).max(1);
        let overlap_samples =
            ((config.overlap_ms as usize * rate as usize) / 1000).min(segment_samples - 1);

        info!(
            "Segment recorder initialized: {}Hz -> {}Hz, {}ms segments, {}ms overlap",
            source_sample_rate, rate, config.segment_ms, config.overlap_ms
        );

        Self {
            resampler: StreamingResampler::new(source_sample_rate, rate),
            buffer: SampleBuffer::new(),
            all_samples: Vec::new(),
            seq_no: 0,
            segment_samples,
            overlap_samples,
            advance_samples: segment_samples - overlap_samples,
            config,
        }
    }

    /// Feed one frame of source-rate samples, returning any segments that
    /// completed as a result.
    pub fn push_samples(&mut self, input: &[f32]) -> Result<Vec<RecordedSegment>> {
        let resampled = self.resampler.process(input);
        if resampled.is_empty() {
            return Ok(Vec::new());
        }
        self.all_samples.extend_from_slice(&resampled);
        self.buffer.push(resampled);
        self.cut_ready_segments()
    }

    fn cut_ready_segments(&mut self) -> Result<Vec<RecordedSegment>> {
        let mut segments = Vec::new();
        while self.buffer.len() >= self.segment_samples {
            let samples = self
                .buffer
                .consume(self.segment_samples)
                .context("Segment cut exceeded buffered samples")?;
            if self.overlap_samples > 0 {
                let overlap = samples[self.segment_samples - self.overlap_samples..].to_vec();
                self.buffer.prepend(overlap);
            }
            segments.push(self.emit_segment(&samples)?);
        }
        Ok(segments)
    }

    fn emit_segment(&mut self, samples: &[f32]) -> Result<RecordedSegment> {
        let seq_no = self.seq_no;
        // Consecutive segments advance by (segment - overlap) samples, so
        // segment n starts exactly where segment n-1's overlap began
        let start_samples = seq_no * self.advance_samples as u64;
        let start_ms = start_samples * 1000 / self.config.target_sample_rate as u64;
        let end_ms = start_ms + self.config.segment_ms;

        let wav = encode_wav(samples, self.config.target_sample_rate)
            .context("Failed to encode segment WAV")?;

        debug!(
            "Segment {} cut: {}ms - {}ms ({} samples)",
            seq_no,
            start_ms,
            end_ms,
            samples.len()
        );

        self.seq_no += 1;

        Ok(RecordedSegment {
            seq_no,
            start_ms,
            end_ms,
            duration_ms: self.config.segment_ms,
            overlap_ms: self.config.overlap_ms,
            wav,
        })
    }

    /// Finish the recording: flush the resampler, emit a zero-padded final
    /// segment if the remainder is long enough, and encode the full-session
    /// waveform.
    pub fn finish(mut self) -> Result<FinishedRecording> {
        let tail = self.resampler.flush();
        if !tail.is_empty() {
            self.all_samples.extend_from_slice(&tail);
            self.buffer.push(tail);
        }

        let remaining = self.buffer.drain();
        let min_samples =
            (self.config.min_final_ms as usize * self.config.target_sample_rate as usize) / 1000;

        let final_segment = if remaining.len() >= min_samples {
            let mut padded = vec![0.0f32; self.segment_samples];
            let copy_len = remaining.len().min(self.segment_samples);
            padded[..copy_len].copy_from_slice(&remaining[..copy_len]);
            Some(self.emit_segment(&padded)?)
        } else {
            if !remaining.is_empty() {
                debug!(
                    "Dropping {} trailing samples below the {}ms floor",
                    remaining.len(),
                    self.config.min_final_ms
                );
            }
            None
        };

        let full_recording = if self.all_samples.is_empty() {
            None
        } else {
            Some(
                encode_wav(&self.all_samples, self.config.target_sample_rate)
                    .context("Failed to encode full recording WAV")?,
            )
        };

        info!(
            "Recording finished: {} segments, {} total samples",
            self.seq_no,
            self.all_samples.len()
        );

        Ok(FinishedRecording {
            final_segment,
            full_recording,
        })
    }
}
