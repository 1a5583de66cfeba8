//! Sample accumulation between the resampler and the segment cutter

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("insufficient samples: requested {requested}, buffered {available}")]
pub struct InsufficientSamples {
    pub requested: usize,
    pub available: usize,
}

struct Chunk {
    data: Vec<f32>,
    offset: usize,
}

/// Append/consume accumulator of audio samples.
///
/// Holds samples as a queue of chunks so `push` never copies existing data.
/// `prepend` re-injects the overlap tail of a just-cut segment so it is
/// consumed again at the start of the next one; prepended data logically
/// precedes everything already queued.
#[derive(Default)]
pub struct SampleBuffer {
    chunks: std::collections::VecDeque<Chunk>,
    total_len: usize,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, data: Vec<f32>) {
        if data.is_empty() {
            return;
        }
        self.total_len += data.len();
        self.chunks.push_back(Chunk { data, offset: 0 });
    }

    pub fn prepend(&mut self, data: Vec<f32>) {
        if data.is_empty() {
            return;
        }
        self.total_len += data.len();
        self.chunks.push_front(Chunk { data, offset: 0 });
    }

    /// Remove and return exactly `count` samples from the front.
    pub fn consume(&mut self, count: usize) -> Result<Vec<f32>, InsufficientSamples> {
        if count > self.total_len {
            return Err(InsufficientSamples {
                requested: count,
                available: self.total_len,
            });
        }

        let mut result = Vec::with_capacity(count);
        while result.len() < count {
            let chunk = self
                .chunks
                .front_mut()
                .expect("total_len accounts for all queued chunks");
            let available = chunk.data.len() - chunk.offset;
            let to_copy = available.min(count - result.len());
            result.extend_from_slice(&chunk.data[chunk.offset..chunk.offset + to_copy]);
            chunk.offset += to_copy;
            if chunk.offset >= chunk.data.len() {
                self.chunks.pop_front();
            }
        }
        self.total_len -= count;
        Ok(result)
    }

    /// Remove and return all remaining samples.
    pub fn drain(&mut self) -> Vec<f32> {
        let mut result = Vec::with_capacity(self.total_len);
        for chunk in self.chunks.drain(..) {
            result.extend_from_slice(&chunk.data[chunk.offset..]);
        }
        self.total_len = 0;
        result
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.total_len = 0;
    }

    pub fn len(&self) -> usize {
        self.total_len
    }

    pub fn is_empty(&self) -> bool {
        self.total_len == 0
    }
}
