//! In-memory registry of transcription sessions
//!
//! One store instance is owned by the server process and handed to request
//! handlers by clone (the handles share state). Segment transcripts arrive
//! out of order because uploads complete out of order; every arrival
//! re-stitches the full transcript from all segments sorted by sequence
//! number, so the stitched text is always consistent regardless of arrival
//! order.
//!
//! Mutation, re-stitching, and event emission all happen inside one lock
//! scope with no await points, so subscribers observe every mutation in
//! the order it took effect.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::events::{
    ErrorEvent, FinalEvent, SegmentEvent, SegmentMetadata, SessionEvent, SessionStatus,
    StatusEvent,
};
use crate::error::ErrorCode;
use crate::stitch::stitch_transcripts;

struct SessionRecord {
    /// Segments keyed by sequence number; iteration order is stitch order
    segments: BTreeMap<u64, SegmentMetadata>,
    stitched_text: String,
    status: SessionStatus,
    final_transcript: Option<String>,
    listeners: HashMap<u64, mpsc::UnboundedSender<SessionEvent>>,
    last_activity: Instant,
}

impl SessionRecord {
    fn new() -> Self {
        Self {
            segments: BTreeMap::new(),
            stitched_text: String::new(),
            status: SessionStatus::Recording,
            final_transcript: None,
            listeners: HashMap::new(),
            last_activity: Instant::now(),
        }
    }
}

struct StoreInner {
    sessions: HashMap<String, SessionRecord>,
    next_listener_id: u64,
}

/// Read-only view of a session's current state.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub stitched_text: String,
    pub final_transcript: Option<String>,
    pub segment_count: usize,
}

/// Shared handle to the session registry. Cheap to clone.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                sessions: HashMap::new(),
                next_listener_id: 0,
            })),
        }
    }

    /// Store a segment's transcript and re-stitch the session text.
    ///
    /// Duplicate sequence numbers are last-write-wins. Returns false when
    /// the session has already completed; a stray late segment must not
    /// disturb the final transcript.
    pub fn add_segment(&self, session_id: &str, segment: SegmentMetadata) -> bool {
        let mut inner = self.inner.lock();
        let session = get_or_create(&mut inner.sessions, session_id);

        if session.status == SessionStatus::Completed {
            warn!(
                "Session {} already completed; rejecting late segment {}",
                session_id, segment.seq_no
            );
            return false;
        }

        let seq_no = segment.seq_no;
        let transcript = segment.transcript.clone();
        session.segments.insert(seq_no, segment);
        session.stitched_text =
            stitch_transcripts(session.segments.values().map(|s| s.transcript.as_str()));
        session.last_activity = Instant::now();

        debug!(
            "Session {} segment {} stored ({} segments, {} stitched chars)",
            session_id,
            seq_no,
            session.segments.len(),
            session.stitched_text.len()
        );

        let meta = &session.segments[&seq_no];
        let event = SessionEvent::Segment(SegmentEvent {
            session_id: session_id.to_string(),
            seq_no,
            start_ms: meta.start_ms,
            end_ms: meta.end_ms,
            duration_ms: meta.duration_ms,
            overlap_ms: meta.overlap_ms,
            transcript,
            stitched_text: session.stitched_text.clone(),
        });
        emit(session_id, session, event);
        true
    }

    pub fn set_status(&self, session_id: &str, status: SessionStatus) {
        let mut inner = self.inner.lock();
        let session = get_or_create(&mut inner.sessions, session_id);
        session.status = status;
        session.last_activity = Instant::now();

        info!("Session {} status -> {:?}", session_id, status);

        let event = SessionEvent::Status(status_event(session_id, session));
        emit(session_id, session, event);
    }

    /// Terminal success transition: the full-recording transcript replaces
    /// the segment-stitched text as the session's result.
    pub fn set_final_transcript(&self, session_id: &str, transcript: String) {
        let mut inner = self.inner.lock();
        let session = get_or_create(&mut inner.sessions, session_id);
        session.final_transcript = Some(transcript.clone());
        session.status = SessionStatus::Completed;
        session.last_activity = Instant::now();

        info!("Session {} completed ({} chars)", session_id, transcript.len());

        let event = SessionEvent::Final(FinalEvent {
            session_id: session_id.to_string(),
            final_transcript: transcript,
        });
        emit(session_id, session, event);
    }

    /// Mark the session failed. Existing stitched/final text is preserved.
    pub fn emit_error(&self, session_id: &str, code: ErrorCode, message: impl Into<String>) {
        let message = message.into();
        let mut inner = self.inner.lock();
        let session = get_or_create(&mut inner.sessions, session_id);
        session.status = SessionStatus::Error;
        session.last_activity = Instant::now();

        warn!("Session {} error [{}]: {}", session_id, code, message);

        let event = SessionEvent::Error(ErrorEvent {
            session_id: session_id.to_string(),
            code,
            message,
        });
        emit(session_id, session, event);
    }

    /// Register a listener. The current status is delivered immediately so
    /// late subscribers see session state without waiting for the next
    /// mutation. The subscription unregisters itself on drop.
    pub fn subscribe(&self, session_id: &str) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();

        let listener_id = {
            let mut inner = self.inner.lock();
            let listener_id = inner.next_listener_id;
            inner.next_listener_id += 1;

            let session = get_or_create(&mut inner.sessions, session_id);
            let snapshot = SessionEvent::Status(status_event(session_id, session));
            // The channel is unbounded and rx is alive, so this cannot fail
            let _ = tx.send(snapshot);
            session.listeners.insert(listener_id, tx);
            session.last_activity = Instant::now();
            listener_id
        };

        debug!("Session {} listener {} subscribed", session_id, listener_id);

        Subscription {
            store: self.clone(),
            session_id: session_id.to_string(),
            listener_id,
            rx,
        }
    }

    pub fn snapshot(&self, session_id: &str) -> Option<SessionSnapshot> {
        let inner = self.inner.lock();
        inner.sessions.get(session_id).map(|session| SessionSnapshot {
            status: session.status,
            stitched_text: session.stitched_text.clone(),
            final_transcript: session.final_transcript.clone(),
            segment_count: session.segments.len(),
        })
    }

    /// Remove sessions with no listeners and no mutation within `max_idle`.
    /// Returns the number of sessions removed.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.sessions.len();
        inner.sessions.retain(|id, session| {
            let keep = !session.listeners.is_empty() || session.last_activity.elapsed() < max_idle;
            if !keep {
                info!("Evicting idle session {}", id);
            }
            keep
        });
        before - inner.sessions.len()
    }

    pub fn session_count(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    fn unsubscribe(&self, session_id: &str, listener_id: u64) {
        let mut inner = self.inner.lock();
        if let Some(session) = inner.sessions.get_mut(session_id) {
            session.listeners.remove(&listener_id);
            debug!("Session {} listener {} unsubscribed", session_id, listener_id);
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn get_or_create<'a>(
    sessions: &'a mut HashMap<String, SessionRecord>,
    session_id: &str,
) -> &'a mut SessionRecord {
    sessions
        .entry(session_id.to_string())
        .or_insert_with(SessionRecord::new)
}

fn status_event(session_id: &str, session: &SessionRecord) -> StatusEvent {
    StatusEvent {
        session_id: session_id.to_string(),
        status: session.status,
        stitched_text: session.stitched_text.clone(),
        final_transcript: session.final_transcript.clone(),
    }
}

/// Broadcast to every listener; a disconnected listener is pruned and must
/// not break delivery to the others.
fn emit(session_id: &str, session: &mut SessionRecord, event: SessionEvent) {
    let mut disconnected = Vec::new();
    for (listener_id, tx) in &session.listeners {
        if tx.send(event.clone()).is_err() {
            warn!(
                "Session {} listener {} disconnected; dropping",
                session_id, listener_id
            );
            disconnected.push(*listener_id);
        }
    }
    for listener_id in disconnected {
        session.listeners.remove(&listener_id);
    }
}

/// A live event feed for one session. Dropping it unregisters the listener.
pub struct Subscription {
    store: SessionStore,
    session_id: String,
    listener_id: u64,
    rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.rx.recv().await
    }

    /// Non-blocking receive, for callers that only want what has already
    /// been delivered.
    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        self.rx.try_recv().ok()
    }
}

impl futures::Stream for Subscription {
    type Item = SessionEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.store.unsubscribe(&self.session_id, self.listener_id);
    }
}
