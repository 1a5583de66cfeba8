pub mod buffer;
pub mod resampler;
pub mod segmenter;
pub mod wav;

pub use buffer::{InsufficientSamples, SampleBuffer};
pub use resampler::StreamingResampler;
pub use segmenter::{FinishedRecording, RecordedSegment, SegmentConfig, SegmentRecorder};
pub use wav::{encode_wav, parse_wav_header, WavError, WavInfo};
