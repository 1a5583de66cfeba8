//! Transcription session management
//!
//! This module provides the in-memory `SessionStore` that:
//! - Tracks per-session segment transcripts (tolerating out-of-order arrival)
//! - Re-stitches the full transcript on every segment arrival
//! - Drives the recording -> finalizing -> completed status machine
//! - Broadcasts ordered events to per-session subscribers

mod events;
mod store;

pub use events::{
    ErrorEvent, FinalEvent, SegmentEvent, SegmentMetadata, SessionEvent, SessionStatus,
    StatusEvent,
};
pub use store::{SessionSnapshot, SessionStore, Subscription};
