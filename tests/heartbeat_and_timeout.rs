use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use wire_session::{run_connection, CloseReason, ConnectionHandle, ConnectionHandler, HandlerError, HeartbeatConfig, JsonCodec, WriterConfig};
use wire_test_support::mock_pair;

#[derive(serde::Deserialize, serde::Serialize)]
struct Noop;

struct SilentHandler {
    messages: AtomicUsize,
}

impl ConnectionHandler<Noop, Noop> for SilentHandler {
    async fn on_start(&self, _conn: &ConnectionHandle<Noop>) -> Result<(), HandlerError> {
        Ok(())
    }

    async fn handle_message(&self, _conn: &ConnectionHandle<Noop>, _payload: Noop) -> Result<(), HandlerError> {
        self.messages.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Spec §8 end-to-end scenario 4: a pong reply before the next timeout check
/// keeps the connection open.
#[tokio::test(start_paused = true)]
async fn reply_before_timeout_suppresses_close() {
    let (link, mut peer) = mock_pair();
    let handler = Arc::new(SilentHandler {
        messages: AtomicUsize::new(0),
    });

    let join = tokio::spawn(run_connection(
        link,
        Arc::new(JsonCodec::<Noop, Noop>::new()),
        handler,
        HeartbeatConfig {
            send_period: Duration::from_millis(100),
            silence_timeout: Duration::from_millis(400),
        },
        WriterConfig::default(),
    ));

    // At least three pings arrive within 350ms of silence.
    for _ in 0..3 {
        let ping = peer.recv_text().await.unwrap();
        assert!(ping.contains("\"ping\""));
    }

    // Client replies pong to refresh the silence deadline.
    peer.send_text(r#"{"n":0}"#);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!join.is_finished(), "connection should not have timed out");

    peer.disconnect();
    let outcome = join.await.unwrap();
    assert_eq!(outcome.reason, CloseReason::PeerClosed);
}

/// Spec §8 end-to-end scenario 5: silence past the deadline closes the
/// connection with no error envelope.
#[tokio::test(start_paused = true)]
async fn silence_past_deadline_closes_with_no_error_envelope() {
    let (link, mut peer) = mock_pair();
    let handler = Arc::new(SilentHandler {
        messages: AtomicUsize::new(0),
    });

    let join = tokio::spawn(run_connection(
        link,
        Arc::new(JsonCodec::<Noop, Noop>::new()),
        handler,
        HeartbeatConfig {
            send_period: Duration::from_millis(100),
            silence_timeout: Duration::from_millis(400),
        },
        WriterConfig::default(),
    ));

    let outcome = join.await.unwrap();
    assert_eq!(outcome.reason, CloseReason::Timeout);
    assert!(peer.engine_closed());

    // Drain whatever pings were buffered; none of them is an error envelope.
    while let Ok(Some(frame)) = tokio::time::timeout(Duration::from_millis(10), peer.recv()).await {
        let text = String::from_utf8(frame.bytes).unwrap();
        assert!(!text.contains("\"error\""));
    }
}
