//! Reliable segment delivery toward the transcription boundary
//!
//! Captured segments are queued locally and drained toward the ingestion
//! endpoint with bounded parallelism, bounded retry, and typed failure
//! classification.

mod controller;
mod transport;

pub use controller::{SegmentUploadController, UploadError};
pub use transport::{HttpSegmentTransport, SegmentTransport, Sleeper, TokioSleeper, TransportError};
