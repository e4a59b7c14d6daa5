//! Bidirectional bridge (spec §4.6.3): data flows both ways simultaneously.
//! The upstream handle is split into a recv half (owned by a forwarder task,
//! mirroring the framed transport's own split-based ownership) and a send
//! half (owned behind a lock, touched only from the single-threaded
//! controller via `handle_message`).

use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use stream_envelope::ControlEnvelope;
use wire_engine::{CancelToken, CancelWatcher, ConnectionHandle, ConnectionHandler, HandlerError};

use crate::server_streaming::BridgeRefusal;
use crate::upstream::{CloseSend, StreamSink, StreamSource, UpgradeContext, UpstreamError};

pub struct BidiStreamingBridge<R, W>
where
    R: StreamSource,
    W: StreamSink + CloseSend,
{
    name: String,
    recv: AsyncMutex<Option<R>>,
    send: AsyncMutex<W>,
    cancel: CancelToken,
}

impl<R, W> BidiStreamingBridge<R, W>
where
    R: StreamSource,
    W: StreamSink + CloseSend,
{
    /// Pre-accept: build the upstream handle with send, recv, and
    /// close-send, bound to a fresh cancellation token.
    pub fn new(
        name: impl Into<String>,
        ctx: &UpgradeContext,
        make_stream: impl FnOnce(&UpgradeContext, CancelWatcher) -> Result<(R, W), UpstreamError>,
    ) -> Result<Self, BridgeRefusal> {
        let (cancel, watcher) = CancelToken::new();
        let (recv, send) = make_stream(ctx, watcher).map_err(BridgeRefusal::StreamCreation)?;
        Ok(Self {
            name: name.into(),
            recv: AsyncMutex::new(Some(recv)),
            send: AsyncMutex::new(send),
            cancel,
        })
    }
}

impl<R, W> ConnectionHandler<ControlEnvelope, ControlEnvelope> for BidiStreamingBridge<R, W>
where
    R: StreamSource,
    W: StreamSink + CloseSend,
{
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn on_start(&self, conn: &ConnectionHandle<ControlEnvelope>) -> Result<(), HandlerError> {
        let recv = self
            .recv
            .lock()
            .await
            .take()
            .expect("on_start called more than once");
        let conn = conn.clone();
        let cancel = self.cancel.watcher();
        tokio::spawn(forward(recv, conn, cancel));
        Ok(())
    }

    async fn handle_message(
        &self,
        conn: &ConnectionHandle<ControlEnvelope>,
        payload: ControlEnvelope,
    ) -> Result<(), HandlerError> {
        match payload {
            ControlEnvelope::Data(value) => {
                let mut send = self.send.lock().await;
                if let Err(e) = send.send(value).await {
                    let _ = conn.send_error(e.to_string());
                }
            }
            ControlEnvelope::EndSend => {
                self.send.lock().await.close_send().await;
            }
            ControlEnvelope::Cancel => self.cancel.cancel(),
            ControlEnvelope::Pong { .. } => {}
            other => {
                warn!(conn_id = %conn.id(), kind = ?other, "unexpected control frame in bidi bridge");
            }
        }
        Ok(())
    }

    async fn on_close(&self, _conn: &ConnectionHandle<ControlEnvelope>) {
        self.cancel.cancel();
    }
}

async fn forward<R: StreamSource>(
    mut stream: R,
    conn: ConnectionHandle<ControlEnvelope>,
    cancel: CancelWatcher,
) {
    loop {
        match stream.recv().await {
            Ok(None) => {
                if !cancel.is_cancelled() {
                    let _ = conn.send_data(ControlEnvelope::StreamEnd);
                }
                info!(conn_id = %conn.id(), "bidi upstream recv ended cleanly");
                break;
            }
            Err(e) if cancel.is_cancelled() => {
                info!(conn_id = %conn.id(), error = %e, "bidi upstream error after cancel; exiting silently");
                break;
            }
            Err(e) => {
                let _ = conn.send_error(e.to_string());
                warn!(conn_id = %conn.id(), error = %e, "bidi upstream error; ending forward");
                break;
            }
            Ok(Some(value)) => {
                let _ = conn.send_data(ControlEnvelope::Data(value));
            }
        }
    }
}
