//! Streaming sample-rate conversion for live capture
//!
//! Capture hardware delivers audio at whatever rate the device runs at
//! (commonly 44.1kHz or 48kHz); the transcription service expects 16kHz.
//! The resampler converts incrementally as frames arrive, carrying the
//! fractional leftover across calls so no input sample is ever dropped
//! or duplicated at frame boundaries.

/// Linear-interpolation resampler with fractional carry-over.
///
/// Lives for one recording session; `process` each incoming frame, then
/// `flush` once at end of capture.
pub struct StreamingResampler {
    ratio: f64,
    leftover: Vec<f32>,
}

impl StreamingResampler {
    pub fn new(source_rate: u32, target_rate: u32) -> Self {
        let base_ratio = source_rate as f64 / target_rate as f64;
        Self {
            // Guard against a zero/invalid source rate from the device layer
            ratio: if base_ratio > 0.0 { base_ratio } else { 1.0 },
            leftover: Vec::new(),
        }
    }

    /// Resample one frame of input, returning the output samples that are
    /// fully determined so far. Unconsumed trailing input is retained for
    /// the next call.
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        if input.is_empty() {
            return Vec::new();
        }

        let mut combined = std::mem::take(&mut self.leftover);
        combined.extend_from_slice(input);

        let output_len = (combined.len() as f64 / self.ratio).floor() as usize;
        if output_len == 0 {
            self.leftover = combined;
            return Vec::new();
        }

        let mut output = Vec::with_capacity(output_len);
        for i in 0..output_len {
            let index = i as f64 * self.ratio;
            let left = index.floor() as usize;
            let right = (left + 1).min(combined.len() - 1);
            let frac = (index - left as f64) as f32;
            let sample = combined[left] + (combined[right] - combined[left]) * frac;
            output.push(sample);
        }

        let consumed = (output_len as f64 * self.ratio).floor() as usize;
        if consumed < combined.len() {
            self.leftover = combined.split_off(consumed);
        }

        output
    }

    /// Return and clear whatever input is still buffered. Used at
    /// end-of-capture so the tail is not lost.
    pub fn flush(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.leftover)
    }
}
