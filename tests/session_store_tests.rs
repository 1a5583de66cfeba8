// Integration tests for the session store
//
// Emission is synchronous with mutation, so these tests drain events with
// try_recv: everything a mutation produced is already in the channel by
// the time the call returns.

use encounter_scribe::session::{SegmentMetadata, SessionEvent, SessionStatus, SessionStore};
use encounter_scribe::ErrorCode;
use std::time::Duration;

fn segment(seq_no: u64, transcript: &str) -> SegmentMetadata {
    let advance = 9_750;
    SegmentMetadata {
        seq_no,
        start_ms: seq_no * advance,
        end_ms: seq_no * advance + 10_000,
        duration_ms: 10_000,
        overlap_ms: 250,
        transcript: transcript.to_string(),
    }
}

#[test]
fn test_out_of_order_arrival_stitches_identically() {
    let in_order = SessionStore::new();
    let out_of_order = SessionStore::new();

    let transcripts = [
        "the patient reports mild chest pain",
        "chest pain since tuesday evening and",
        "and some shortness of breath",
    ];

    for seq in [0u64, 1, 2] {
        in_order.add_segment("a", segment(seq, transcripts[seq as usize]));
    }
    for seq in [2u64, 0, 1] {
        out_of_order.add_segment("b", segment(seq, transcripts[seq as usize]));
    }

    let expected = in_order.snapshot("a").unwrap().stitched_text;
    let actual = out_of_order.snapshot("b").unwrap().stitched_text;
    assert_eq!(actual, expected);
    assert_eq!(
        expected,
        "the patient reports mild chest pain since tuesday evening and some shortness of breath"
    );
}

#[test]
fn test_duplicate_seq_no_is_last_write_wins() {
    let store = SessionStore::new();
    store.add_segment("s", segment(0, "first attempt"));
    store.add_segment("s", segment(0, "second attempt"));

    let snapshot = store.snapshot("s").unwrap();
    assert_eq!(snapshot.segment_count, 1);
    assert_eq!(snapshot.stitched_text, "second attempt");
}

#[test]
fn test_subscribe_delivers_immediate_status_snapshot() {
    let store = SessionStore::new();
    store.add_segment("s", segment(0, "hello there"));

    let mut subscription = store.subscribe("s");
    match subscription.try_recv() {
        Some(SessionEvent::Status(status)) => {
            assert_eq!(status.session_id, "s");
            assert_eq!(status.status, SessionStatus::Recording);
            assert_eq!(status.stitched_text, "hello there");
            assert_eq!(status.final_transcript, None);
        }
        other => panic!("expected an immediate status snapshot, got {:?}", other),
    }
    assert!(subscription.try_recv().is_none());
}

#[test]
fn test_segment_event_carries_own_transcript_and_stitched_text() {
    let store = SessionStore::new();
    let mut subscription = store.subscribe("s");
    let _ = subscription.try_recv(); // snapshot

    store.add_segment("s", segment(0, "good morning doctor"));
    store.add_segment("s", segment(1, "doctor how are you"));

    match subscription.try_recv() {
        Some(SessionEvent::Segment(event)) => {
            assert_eq!(event.seq_no, 0);
            assert_eq!(event.transcript, "good morning doctor");
            assert_eq!(event.stitched_text, "good morning doctor");
        }
        other => panic!("expected segment event, got {:?}", other),
    }
    match subscription.try_recv() {
        Some(SessionEvent::Segment(event)) => {
            assert_eq!(event.seq_no, 1);
            assert_eq!(event.transcript, "doctor how are you");
            assert_eq!(event.stitched_text, "good morning doctor how are you");
        }
        other => panic!("expected segment event, got {:?}", other),
    }
}

#[test]
fn test_final_transcript_completes_session_with_single_final_event() {
    let store = SessionStore::new();
    let mut subscription = store.subscribe("s");
    let _ = subscription.try_recv(); // snapshot

    store.set_status("s", SessionStatus::Finalizing);
    store.set_final_transcript("s", "the full corrected transcript".to_string());

    match subscription.try_recv() {
        Some(SessionEvent::Status(status)) => {
            assert_eq!(status.status, SessionStatus::Finalizing)
        }
        other => panic!("expected status event, got {:?}", other),
    }
    match subscription.try_recv() {
        Some(SessionEvent::Final(event)) => {
            assert_eq!(event.final_transcript, "the full corrected transcript");
        }
        other => panic!("expected final event, got {:?}", other),
    }
    assert!(subscription.try_recv().is_none(), "exactly one final event");

    let snapshot = store.snapshot("s").unwrap();
    assert_eq!(snapshot.status, SessionStatus::Completed);
    assert_eq!(
        snapshot.final_transcript.as_deref(),
        Some("the full corrected transcript")
    );
}

#[test]
fn test_late_segment_after_completion_is_rejected() {
    let store = SessionStore::new();
    store.add_segment("s", segment(0, "early words"));
    store.set_final_transcript("s", "final words".to_string());

    let mut subscription = store.subscribe("s");
    let _ = subscription.try_recv(); // snapshot

    let accepted = store.add_segment("s", segment(1, "straggler"));
    assert!(!accepted);
    assert!(
        subscription.try_recv().is_none(),
        "a rejected segment must not emit an event"
    );

    let snapshot = store.snapshot("s").unwrap();
    assert_eq!(snapshot.segment_count, 1);
    assert_eq!(snapshot.stitched_text, "early words");
}

#[test]
fn test_error_event_preserves_existing_text() {
    let store = SessionStore::new();
    store.add_segment("s", segment(0, "some words"));

    let mut subscription = store.subscribe("s");
    let _ = subscription.try_recv(); // snapshot

    store.emit_error("s", ErrorCode::ApiError, "transcription service down");

    match subscription.try_recv() {
        Some(SessionEvent::Error(event)) => {
            assert_eq!(event.code, ErrorCode::ApiError);
            assert_eq!(event.message, "transcription service down");
        }
        other => panic!("expected error event, got {:?}", other),
    }

    let snapshot = store.snapshot("s").unwrap();
    assert_eq!(snapshot.status, SessionStatus::Error);
    assert_eq!(snapshot.stitched_text, "some words");
}

#[test]
fn test_dropped_subscriber_does_not_break_remaining_listeners() {
    let store = SessionStore::new();

    let dropped = store.subscribe("s");
    let mut kept = store.subscribe("s");
    let _ = kept.try_recv(); // snapshot
    drop(dropped);

    store.add_segment("s", segment(0, "still delivered"));

    match kept.try_recv() {
        Some(SessionEvent::Segment(event)) => assert_eq!(event.transcript, "still delivered"),
        other => panic!("expected segment event, got {:?}", other),
    }
}

#[test]
fn test_idle_sessions_without_listeners_are_evicted() {
    let store = SessionStore::new();
    store.add_segment("idle", segment(0, "abandoned"));

    let watched = store.subscribe("watched");
    assert_eq!(store.session_count(), 2);

    // Zero max-idle makes everything without a listener eligible
    let evicted = store.evict_idle(Duration::from_secs(0));
    assert_eq!(evicted, 1);
    assert_eq!(store.session_count(), 1);
    assert!(store.snapshot("idle").is_none());
    assert!(store.snapshot("watched").is_some());

    drop(watched);
}

#[test]
fn test_recently_active_sessions_survive_eviction() {
    let store = SessionStore::new();
    store.add_segment("fresh", segment(0, "just spoke"));

    let evicted = store.evict_idle(Duration::from_secs(3600));
    assert_eq!(evicted, 0);
    assert!(store.snapshot("fresh").is_some());
}
