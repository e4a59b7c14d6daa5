use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, info, warn};
use wire_codec::Codec;
use wire_transport::{FramedTransport, ReadError};

use crate::cancel::{CancelToken, CancelWatcher};
use crate::metrics::ConnectionMetrics;
use crate::outgoing::{HeartbeatFrame, OutgoingMessage, TerminalError};
use crate::reader::{self, ReaderEvent};
use crate::writer::{SerializedWriter, WriterConfig};

/// `Pending -> Open -> Closing -> Closed` lifecycle states (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Pending = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ConnectionState {
    fn from_code(code: u8) -> Self {
        match code {
            0 => ConnectionState::Pending,
            1 => ConnectionState::Open,
            2 => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }
}

/// Heartbeat cadence and silence deadline, overridable per connection instead
/// of baked in as constants.
#[derive(Debug, Clone, Copy)]
pub struct HeartbeatConfig {
    pub send_period: Duration,
    pub silence_timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            send_period: Duration::from_secs(30),
            silence_timeout: Duration::from_secs(300),
        }
    }
}

/// A structured, lock-free debug snapshot of a running connection.
#[derive(Debug, Clone)]
pub struct ConnectionDebug {
    pub name: String,
    pub id: String,
    pub state: ConnectionState,
    pub heartbeat_count: u64,
    pub queue_depth: usize,
}

/// An error surfaced to [`ConnectionHandler::on_error`].
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("payload decode error: {0}")]
    Decode(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Boxed error type used at the handler boundary, since the concrete error
/// type varies by caller and the engine has no reason to be generic over it.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Why a connection moved from `Closing` to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    StartFailed,
    PeerClosed,
    Timeout,
    HandlerError,
    UserRequested,
}

/// The terminal summary of a finished connection.
#[derive(Debug, Clone)]
pub struct ConnectionOutcome {
    pub id: String,
    pub reason: CloseReason,
}

/// Capabilities the engine drives into user code: `on-start`,
/// `handle-message`, `on-error`, `on-timeout`, `on-close`, plus the stable
/// `name`/`connection-id` identifiers (spec §9's "capability set" in place of
/// inheritance).
///
/// Default bodies implement the spec's documented defaults: `on_error`
/// suppresses (returns `Ok`), `on_timeout` closes (`true`), `on_close` is a
/// no-op, `name`/`connection_id` let the engine pick.
pub trait ConnectionHandler<I, O>: Send + Sync + 'static {
    fn name(&self) -> String {
        String::new()
    }

    /// `None` means the engine generates one before first write (spec
    /// invariant 3).
    fn connection_id(&self) -> Option<String> {
        None
    }

    fn on_start(&self, conn: &ConnectionHandle<O>) -> impl Future<Output = Result<(), HandlerError>> + Send;

    /// Return value is advisory; it does not by itself close the connection
    /// (spec §4.4 step 2).
    fn handle_message(
        &self,
        conn: &ConnectionHandle<O>,
        payload: I,
    ) -> impl Future<Output = Result<(), HandlerError>> + Send;

    fn on_error(
        &self,
        _conn: &ConnectionHandle<O>,
        _error: EngineError,
    ) -> impl Future<Output = Result<(), HandlerError>> + Send {
        async { Ok(()) }
    }

    /// `true` closes the connection; `false` suppresses the timeout.
    fn on_timeout(&self, _conn: &ConnectionHandle<O>) -> impl Future<Output = bool> + Send {
        async { true }
    }

    /// Cleanup; must be safe to call once and is never retried.
    fn on_close(&self, _conn: &ConnectionHandle<O>) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// A live connection's identity, writer access, cancellation token, and
/// metrics, handed to every [`ConnectionHandler`] hook.
pub struct ConnectionHandle<O> {
    id: String,
    name: String,
    writer: Arc<SerializedWriter<O>>,
    cancel: CancelToken,
    close_signal: CancelToken,
    metrics: Arc<ConnectionMetrics>,
    heartbeat_counter: Arc<AtomicU64>,
    state: Arc<AtomicU8>,
}

impl<O> Clone for ConnectionHandle<O> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            name: self.name.clone(),
            writer: self.writer.clone(),
            cancel: self.cancel.clone(),
            close_signal: self.close_signal.clone(),
            metrics: self.metrics.clone(),
            heartbeat_counter: self.heartbeat_counter.clone(),
            state: self.state.clone(),
        }
    }
}

impl<O> ConnectionHandle<O> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &ConnectionMetrics {
        &self.metrics
    }

    /// Enqueue an application payload, recording it in the sent counter.
    pub fn send_data(&self, value: O) -> Result<(), OutgoingMessage<O>> {
        self.metrics.record_sent();
        self.writer.send(OutgoingMessage::Data(value))
    }

    /// Enqueue a reportable terminal error (spec §6.2). Does not itself close
    /// the connection; callers close separately once the writer has had a
    /// chance to flush it.
    pub fn send_error(&self, message: impl Into<String>) -> Result<(), OutgoingMessage<O>> {
        self.writer
            .send(OutgoingMessage::Terminal(TerminalError::Error(message.into())))
    }

    /// Fire this connection's cancellation token. Idempotent. Streaming
    /// bridges call this on a peer `cancel` envelope.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A watcher bound to this connection's cancellation token, for upstream
    /// stream handles to observe.
    pub fn cancel_watcher(&self) -> CancelWatcher {
        self.cancel.watcher()
    }

    /// Request that this connection move to `Closing` (spec §4.4: "user
    /// calls close"). Idempotent; safe to call from any task holding a
    /// handle, including after the connection has already closed.
    pub fn close(&self) {
        self.close_signal.cancel();
    }

    /// The connection's current lifecycle state, read without locking.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_code(self.state.load(Ordering::Relaxed))
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }

    pub fn debug_snapshot(&self) -> ConnectionDebug {
        ConnectionDebug {
            name: self.name.clone(),
            id: self.id.clone(),
            state: self.state(),
            heartbeat_count: self.heartbeat_counter.load(Ordering::Relaxed),
            queue_depth: self.writer.queue_depth(),
        }
    }

    fn enqueue_heartbeat(&self) {
        let ping_id = self.heartbeat_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.writer.send(OutgoingMessage::Heartbeat(HeartbeatFrame {
            ping_id,
            conn_id: self.id.clone(),
            name: self.name.clone(),
        }));
    }
}

/// Drive one accepted connection from `Pending` through `Closed`.
///
/// Spawns the reader producer and the serialized writer, runs the
/// heartbeat/timeout/dispatch select loop (spec §4.4 step 2), and performs
/// the Closing sequence (spec §4.4 step 3) before returning.
pub async fn run_connection<I, O, C, T, H>(
    transport: T,
    codec: Arc<C>,
    handler: Arc<H>,
    heartbeat: HeartbeatConfig,
    writer_config: WriterConfig,
) -> ConnectionOutcome
where
    C: Codec<I, O> + 'static,
    T: FramedTransport + 'static,
    H: ConnectionHandler<I, O>,
    I: Send + 'static,
    O: Send + 'static,
{
    let id = handler
        .connection_id()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let name = handler.name();
    let (cancel, _keep_alive_watcher) = CancelToken::new();
    let (close_signal, mut close_watcher) = CancelToken::new();
    let metrics = Arc::new(ConnectionMetrics::new());
    let heartbeat_counter = Arc::new(AtomicU64::new(0));
    let state = Arc::new(AtomicU8::new(ConnectionState::Pending as u8));

    let (read_half, write_half) = transport.split();
    let (writer, writer_join) = SerializedWriter::spawn(codec.clone(), write_half, writer_config);
    let writer = Arc::new(writer);

    let conn = ConnectionHandle {
        id: id.clone(),
        name: name.clone(),
        writer: writer.clone(),
        cancel: cancel.clone(),
        close_signal,
        metrics: metrics.clone(),
        heartbeat_counter: heartbeat_counter.clone(),
        state: state.clone(),
    };

    // Pending -> Open, or Pending -> Closed on failure, without messaging
    // the peer.
    if let Err(e) = handler.on_start(&conn).await {
        warn!(conn_id = %id, error = %e, "on_start failed; closing without messaging peer");
        writer.stop();
        let _ = writer_join.await;
        conn.set_state(ConnectionState::Closed);
        return ConnectionOutcome {
            id,
            reason: CloseReason::StartFailed,
        };
    }
    conn.set_state(ConnectionState::Open);
    debug!(conn_id = %id, "connection open");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (mut reader_rx, reader_join) =
        reader::spawn(codec, read_half, heartbeat.silence_timeout, shutdown_rx);

    let mut heartbeat_ticker = tokio::time::interval(heartbeat.send_period);
    heartbeat_ticker.tick().await;
    let mut timeout_ticker = tokio::time::interval(heartbeat.silence_timeout);
    timeout_ticker.tick().await;

    let mut last_read = Instant::now();
    let close_reason = 'open: loop {
        tokio::select! {
            _ = close_watcher.cancelled() => {
                info!(conn_id = %id, "close requested; closing");
                break 'open CloseReason::UserRequested;
            }
            _ = heartbeat_ticker.tick() => {
                conn.enqueue_heartbeat();
            }
            _ = timeout_ticker.tick() => {
                if last_read.elapsed() > heartbeat.silence_timeout && handler.on_timeout(&conn).await {
                    info!(conn_id = %id, "silence timeout; closing");
                    break 'open CloseReason::Timeout;
                }
            }
            event = reader_rx.recv() => {
                match event {
                    None => break 'open CloseReason::PeerClosed,
                    Some(ReaderEvent::Closed(ReadError::NormalClose)) => {
                        break 'open CloseReason::PeerClosed;
                    }
                    Some(ReaderEvent::Closed(ReadError::UnexpectedClose)) => {
                        break 'open CloseReason::PeerClosed;
                    }
                    Some(ReaderEvent::Closed(ReadError::Other(e))) => {
                        last_read = Instant::now();
                        if handler.on_error(&conn, EngineError::Transport(e)).await.is_err() {
                            break 'open CloseReason::HandlerError;
                        }
                    }
                    Some(ReaderEvent::DecodeError(e)) => {
                        last_read = Instant::now();
                        if handler.on_error(&conn, EngineError::Decode(e)).await.is_err() {
                            break 'open CloseReason::HandlerError;
                        }
                    }
                    Some(ReaderEvent::Payload(payload)) => {
                        last_read = Instant::now();
                        metrics.record_received();
                        // Advisory: errors from handle_message do not close
                        // the connection by themselves (spec §4.4 step 2).
                        let _ = handler.handle_message(&conn, payload).await;
                    }
                }
            }
        }
    };

    // Closing -> Closed.
    conn.set_state(ConnectionState::Closing);
    handler.on_close(&conn).await;
    writer.stop();
    let _ = writer_join.await;
    let _ = shutdown_tx.send(true);
    let _ = reader_join.await;
    cancel.cancel();
    conn.set_state(ConnectionState::Closed);
    info!(conn_id = %id, reason = ?close_reason, "connection closed");

    ConnectionOutcome {
        id,
        reason: close_reason,
    }
}
