//! Bounded-concurrency retry queue for segment delivery
//!
//! Segments are queued as they are cut and dispatched with at most
//! `MAX_IN_FLIGHT` concurrent uploads; the cap is the pipeline's only
//! backpressure against upload storms during fast recording. Transient
//! failures (429, 5xx, transport errors) retry up to `MAX_ATTEMPTS` with
//! linearly increasing backoff; deterministic validation failures
//! propagate immediately.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use super::transport::{SegmentTransport, Sleeper, TransportError};
use crate::audio::RecordedSegment;
use crate::error::ErrorCode;

const MAX_IN_FLIGHT: usize = 2;
const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_STEP: Duration = Duration::from_millis(250);

/// Typed failure reported after retries are exhausted (or immediately for
/// non-retryable conditions).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadError {
    pub code: ErrorCode,
    pub message: String,
}

struct QueueState {
    session_id: Option<String>,
    queue: VecDeque<RecordedSegment>,
    in_flight: usize,
    /// Bumped on each session swap so stale completions from the previous
    /// session cannot touch the new session's counters
    epoch: u64,
}

struct Inner {
    state: Mutex<QueueState>,
    transport: Arc<dyn SegmentTransport>,
    sleeper: Arc<dyn Sleeper>,
    errors: mpsc::UnboundedSender<UploadError>,
    disposed: AtomicBool,
}

/// Client-side delivery queue for captured segments. Cheap to clone.
#[derive(Clone)]
pub struct SegmentUploadController {
    inner: Arc<Inner>,
}

impl SegmentUploadController {
    /// Returns the controller plus the channel on which exhausted or
    /// non-retryable failures are reported.
    pub fn new(
        session_id: Option<String>,
        transport: Arc<dyn SegmentTransport>,
        sleeper: Arc<dyn Sleeper>,
    ) -> (Self, mpsc::UnboundedReceiver<UploadError>) {
        let (errors, error_rx) = mpsc::unbounded_channel();
        let controller = Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState {
                    session_id,
                    queue: VecDeque::new(),
                    in_flight: 0,
                    epoch: 0,
                }),
                transport,
                sleeper,
                errors,
                disposed: AtomicBool::new(false),
            }),
        };
        (controller, error_rx)
    }

    /// Swap the active session. The queue is cleared so no stale-session
    /// segment is dispatched after a new session starts; uploads already
    /// in flight complete but no longer affect the queue.
    pub fn set_session_id(&self, session_id: Option<String>) {
        let mut state = self.inner.state.lock();
        state.session_id = session_id;
        state.queue.clear();
        state.in_flight = 0;
        state.epoch += 1;
    }

    /// Queue a segment for delivery. Without an active session the segment
    /// is dropped and reported as a capture error, never buffered.
    pub fn enqueue(&self, segment: RecordedSegment) {
        if self.inner.disposed.load(Ordering::SeqCst) {
            return;
        }

        let mut state = self.inner.state.lock();
        if state.session_id.is_none() {
            warn!(
                "Segment {} dropped: session not initialized yet",
                segment.seq_no
            );
            drop(state);
            let _ = self.inner.errors.send(UploadError {
                code: ErrorCode::CaptureError,
                message: "Session not initialized".to_string(),
            });
            return;
        }

        state.queue.push_back(segment);
        drain(&self.inner, &mut state);
    }

    /// Stop dispatching and drop anything still queued.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        self.inner.state.lock().queue.clear();
    }

    pub fn in_flight(&self) -> usize {
        self.inner.state.lock().in_flight
    }

    pub fn queue_len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }
}

/// Dispatch queued segments up to the concurrency cap. Caller holds the
/// state lock.
fn drain(inner: &Arc<Inner>, state: &mut QueueState) {
    if inner.disposed.load(Ordering::SeqCst) {
        return;
    }
    let session_id = match &state.session_id {
        Some(id) => id.clone(),
        None => return,
    };

    while state.in_flight < MAX_IN_FLIGHT {
        let segment = match state.queue.pop_front() {
            Some(segment) => segment,
            None => break,
        };
        state.in_flight += 1;
        let epoch = state.epoch;
        let inner = Arc::clone(inner);
        let session_id = session_id.clone();
        tokio::spawn(async move {
            upload_with_handling(inner, session_id, segment, epoch).await;
        });
    }
}

async fn upload_with_handling(
    inner: Arc<Inner>,
    session_id: String,
    segment: RecordedSegment,
    epoch: u64,
) {
    let seq_no = segment.seq_no;
    match upload_with_retry(&inner, &session_id, &segment).await {
        Outcome::Delivered => {
            debug!("Segment {} delivered", seq_no);
        }
        Outcome::Aborted => {
            debug!("Segment {} upload aborted", seq_no);
        }
        Outcome::Failed(upload_error) => {
            error!(
                "Final upload failure for segment {}: [{}] {}",
                seq_no, upload_error.code, upload_error.message
            );
            let _ = inner.errors.send(upload_error);
        }
    }

    // Completion bookkeeping; re-drain unless the session was swapped out
    // from under this upload or the controller was disposed
    let mut state = inner.state.lock();
    if state.epoch == epoch {
        state.in_flight = state.in_flight.saturating_sub(1);
        if !inner.disposed.load(Ordering::SeqCst) {
            drain(&inner, &mut state);
        }
    }
}

enum Outcome {
    Delivered,
    Aborted,
    Failed(UploadError),
}

/// Bounded retry loop: 429 / 5xx / network errors retry with backoff
/// `250ms * attempt`; other statuses fail immediately; aborts are silent.
async fn upload_with_retry(
    inner: &Inner,
    session_id: &str,
    segment: &RecordedSegment,
) -> Outcome {
    for attempt in 1..=MAX_ATTEMPTS {
        match inner.transport.send_segment(session_id, segment).await {
            Ok(()) => return Outcome::Delivered,
            Err(TransportError::Aborted) => return Outcome::Aborted,
            Err(TransportError::Status {
                status,
                code,
                message,
            }) => {
                let retryable = status == 429 || status >= 500;
                if retryable && attempt < MAX_ATTEMPTS {
                    warn!(
                        "Segment {} attempt {} failed with status {}; retrying",
                        segment.seq_no, attempt, status
                    );
                    inner.sleeper.sleep(BACKOFF_STEP * attempt).await;
                    continue;
                }
                let code = code.unwrap_or(if status >= 500 || status == 429 {
                    ErrorCode::ApiError
                } else {
                    ErrorCode::ValidationError
                });
                return Outcome::Failed(UploadError { code, message });
            }
            Err(TransportError::Network(message)) => {
                if attempt < MAX_ATTEMPTS {
                    warn!(
                        "Segment {} attempt {} hit a network error; retrying",
                        segment.seq_no, attempt
                    );
                    inner.sleeper.sleep(BACKOFF_STEP * attempt).await;
                    continue;
                }
                return Outcome::Failed(UploadError {
                    code: ErrorCode::NetworkError,
                    message,
                });
            }
        }
    }
    unreachable!("retry loop returns within MAX_ATTEMPTS iterations")
}
