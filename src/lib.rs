pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod session;
pub mod stitch;
pub mod transcribe;
pub mod upload;

pub use audio::{
    encode_wav, parse_wav_header, FinishedRecording, RecordedSegment, SampleBuffer,
    SegmentConfig, SegmentRecorder, StreamingResampler, WavError, WavInfo,
};
pub use config::Config;
pub use error::ErrorCode;
pub use http::{create_router, AppState};
pub use session::{SegmentMetadata, SessionEvent, SessionStatus, SessionStore, Subscription};
pub use stitch::{stitch_transcripts, trim_overlap};
pub use transcribe::{Transcriber, WhisperTranscriber};
pub use upload::{HttpSegmentTransport, SegmentTransport, SegmentUploadController, Sleeper,
    TokioSleeper, UploadError};
