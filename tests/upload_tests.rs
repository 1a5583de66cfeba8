// Integration tests for the segment upload controller
//
// The transport and backoff clock are scripted, so retry behavior is
// asserted on recorded attempts and sleep durations instead of wall time.

use encounter_scribe::audio::RecordedSegment;
use encounter_scribe::upload::{SegmentTransport, SegmentUploadController, Sleeper, TransportError};
use encounter_scribe::ErrorCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::timeout;

#[derive(Clone, Copy)]
enum Behavior {
    Succeed,
    Status(u16),
    StatusWithCode(u16, ErrorCode),
    Network,
    Abort,
}

struct ScriptedTransport {
    behavior: Behavior,
    /// Hold each attempt open this long, to observe concurrency
    delay: Option<Duration>,
    attempts: AtomicUsize,
    concurrent: AtomicUsize,
    max_concurrent: AtomicUsize,
}

impl ScriptedTransport {
    fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            delay: None,
            attempts: AtomicUsize::new(0),
            concurrent: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
        })
    }

    fn with_delay(behavior: Behavior, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            delay: Some(delay),
            attempts: AtomicUsize::new(0),
            concurrent: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
        })
    }

    fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SegmentTransport for ScriptedTransport {
    async fn send_segment(
        &self,
        _session_id: &str,
        _segment: &RecordedSegment,
    ) -> Result<(), TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.concurrent.fetch_sub(1, Ordering::SeqCst);

        match self.behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Status(status) => Err(TransportError::Status {
                status,
                code: None,
                message: format!("Upload failed with status {}", status),
            }),
            Behavior::StatusWithCode(status, code) => Err(TransportError::Status {
                status,
                code: Some(code),
                message: "server classified".to_string(),
            }),
            Behavior::Network => Err(TransportError::Network("connection reset".to_string())),
            Behavior::Abort => Err(TransportError::Aborted),
        }
    }
}

/// Records requested backoffs instead of waiting them out.
struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            sleeps: Mutex::new(Vec::new()),
        })
    }

    fn recorded(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

fn test_segment(seq_no: u64) -> RecordedSegment {
    RecordedSegment {
        seq_no,
        start_ms: seq_no * 9_750,
        end_ms: seq_no * 9_750 + 10_000,
        duration_ms: 10_000,
        overlap_ms: 250,
        wav: vec![0u8; 64],
    }
}

/// Wait for the controller to go fully idle, bounded.
async fn wait_until_idle(controller: &SegmentUploadController) {
    for _ in 0..200 {
        if controller.in_flight() == 0 && controller.queue_len() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("upload controller never went idle");
}

#[tokio::test]
async fn test_server_errors_retry_three_times_with_linear_backoff() {
    let transport = ScriptedTransport::new(Behavior::Status(500));
    let sleeper = RecordingSleeper::new();
    let (controller, mut errors) = SegmentUploadController::new(
        Some("sess".to_string()),
        transport.clone(),
        sleeper.clone(),
    );

    controller.enqueue(test_segment(0));

    let error = timeout(Duration::from_secs(1), errors.recv())
        .await
        .expect("error should surface")
        .expect("error channel open");

    assert_eq!(error.code, ErrorCode::ApiError);
    assert_eq!(transport.attempts(), 3, "exactly three total attempts");
    assert_eq!(
        sleeper.recorded(),
        vec![Duration::from_millis(250), Duration::from_millis(500)],
        "backoff grows linearly between attempts"
    );
}

#[tokio::test]
async fn test_rate_limiting_is_retried() {
    let transport = ScriptedTransport::new(Behavior::Status(429));
    let sleeper = RecordingSleeper::new();
    let (controller, mut errors) =
        SegmentUploadController::new(Some("sess".to_string()), transport.clone(), sleeper);

    controller.enqueue(test_segment(0));

    let error = timeout(Duration::from_secs(1), errors.recv())
        .await
        .expect("error should surface")
        .expect("error channel open");

    assert_eq!(error.code, ErrorCode::ApiError);
    assert_eq!(transport.attempts(), 3);
}

#[tokio::test]
async fn test_validation_failures_are_never_retried() {
    let transport = ScriptedTransport::new(Behavior::Status(400));
    let sleeper = RecordingSleeper::new();
    let (controller, mut errors) = SegmentUploadController::new(
        Some("sess".to_string()),
        transport.clone(),
        sleeper.clone(),
    );

    controller.enqueue(test_segment(0));

    let error = timeout(Duration::from_secs(1), errors.recv())
        .await
        .expect("error should surface")
        .expect("error channel open");

    assert_eq!(error.code, ErrorCode::ValidationError);
    assert_eq!(transport.attempts(), 1, "deterministic failures waste no retries");
    assert!(sleeper.recorded().is_empty());
}

#[tokio::test]
async fn test_server_supplied_error_code_is_honored() {
    let transport =
        ScriptedTransport::new(Behavior::StatusWithCode(400, ErrorCode::StorageError));
    let sleeper = RecordingSleeper::new();
    let (controller, mut errors) =
        SegmentUploadController::new(Some("sess".to_string()), transport, sleeper);

    controller.enqueue(test_segment(0));

    let error = timeout(Duration::from_secs(1), errors.recv())
        .await
        .expect("error should surface")
        .expect("error channel open");

    assert_eq!(error.code, ErrorCode::StorageError);
    assert_eq!(error.message, "server classified");
}

#[tokio::test]
async fn test_network_errors_retry_then_surface_as_network_error() {
    let transport = ScriptedTransport::new(Behavior::Network);
    let sleeper = RecordingSleeper::new();
    let (controller, mut errors) = SegmentUploadController::new(
        Some("sess".to_string()),
        transport.clone(),
        sleeper.clone(),
    );

    controller.enqueue(test_segment(0));

    let error = timeout(Duration::from_secs(1), errors.recv())
        .await
        .expect("error should surface")
        .expect("error channel open");

    assert_eq!(error.code, ErrorCode::NetworkError);
    assert_eq!(transport.attempts(), 3);
    assert_eq!(sleeper.recorded().len(), 2);
}

#[tokio::test]
async fn test_aborted_uploads_are_silent() {
    let transport = ScriptedTransport::new(Behavior::Abort);
    let sleeper = RecordingSleeper::new();
    let (controller, mut errors) =
        SegmentUploadController::new(Some("sess".to_string()), transport.clone(), sleeper);

    controller.enqueue(test_segment(0));
    wait_until_idle(&controller).await;

    assert_eq!(transport.attempts(), 1, "aborts are not retried");
    assert!(
        timeout(Duration::from_millis(50), errors.recv()).await.is_err(),
        "aborts are not reported as errors"
    );
}

#[tokio::test]
async fn test_enqueue_without_session_drops_segment_as_capture_error() {
    let transport = ScriptedTransport::new(Behavior::Succeed);
    let sleeper = RecordingSleeper::new();
    let (controller, mut errors) =
        SegmentUploadController::new(None, transport.clone(), sleeper);

    controller.enqueue(test_segment(0));

    let error = timeout(Duration::from_secs(1), errors.recv())
        .await
        .expect("error should surface")
        .expect("error channel open");

    assert_eq!(error.code, ErrorCode::CaptureError);
    assert_eq!(transport.attempts(), 0, "nothing is dispatched");
    assert_eq!(controller.queue_len(), 0, "nothing is buffered either");
}

#[tokio::test]
async fn test_at_most_two_uploads_in_flight() {
    let transport =
        ScriptedTransport::with_delay(Behavior::Succeed, Duration::from_millis(30));
    let sleeper = RecordingSleeper::new();
    let (controller, _errors) = SegmentUploadController::new(
        Some("sess".to_string()),
        transport.clone(),
        sleeper,
    );

    for seq in 0..5 {
        controller.enqueue(test_segment(seq));
    }
    assert!(controller.in_flight() <= 2);

    wait_until_idle(&controller).await;

    assert_eq!(transport.attempts(), 5, "every segment is eventually dispatched");
    assert!(
        transport.max_concurrent.load(Ordering::SeqCst) <= 2,
        "concurrency cap held at every instant"
    );
}

#[tokio::test]
async fn test_session_swap_clears_pending_queue() {
    let transport =
        ScriptedTransport::with_delay(Behavior::Succeed, Duration::from_millis(50));
    let sleeper = RecordingSleeper::new();
    let (controller, _errors) = SegmentUploadController::new(
        Some("old".to_string()),
        transport.clone(),
        sleeper,
    );

    for seq in 0..5 {
        controller.enqueue(test_segment(seq));
    }
    assert_eq!(controller.in_flight(), 2);
    assert_eq!(controller.queue_len(), 3);

    controller.set_session_id(Some("new".to_string()));
    assert_eq!(controller.queue_len(), 0, "stale-session segments never dispatch");
    assert_eq!(controller.in_flight(), 0);

    // The two in-flight uploads complete; nothing further is dispatched
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(transport.attempts(), 2);
}

#[tokio::test]
async fn test_disposed_controller_stops_dispatching() {
    let transport =
        ScriptedTransport::with_delay(Behavior::Succeed, Duration::from_millis(30));
    let sleeper = RecordingSleeper::new();
    let (controller, _errors) = SegmentUploadController::new(
        Some("sess".to_string()),
        transport.clone(),
        sleeper,
    );

    for seq in 0..5 {
        controller.enqueue(test_segment(seq));
    }
    controller.dispose();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(transport.attempts(), 2, "only the already-dispatched uploads ran");
    assert_eq!(controller.queue_len(), 0);
}
