//! Client-streaming bridge (spec §4.6.2): the client sends a run of `data`
//! envelopes then `end_send`; the bridge forwards each to the upstream sink
//! and, on `end_send`, half-closes and relays the single terminal response.

use tokio::sync::Mutex as AsyncMutex;
use tracing::warn;

use stream_envelope::ControlEnvelope;
use wire_engine::{CancelToken, CancelWatcher, ConnectionHandle, ConnectionHandler, HandlerError};

use crate::server_streaming::BridgeRefusal;
use crate::upstream::{CloseAndRecv, StreamSink, UpgradeContext, UpstreamError};

/// A streaming-bridge connection handler whose upstream handle accepts a run
/// of values and a single terminal response.
pub struct ClientStreamingBridge<S: StreamSink + CloseAndRecv> {
    name: String,
    stream: AsyncMutex<Option<S>>,
    cancel: CancelToken,
}

impl<S: StreamSink + CloseAndRecv> ClientStreamingBridge<S> {
    /// Pre-accept: build the upstream handle with send and close-and-recv
    /// operations, bound to a fresh cancellation token.
    pub fn new(
        name: impl Into<String>,
        ctx: &UpgradeContext,
        make_stream: impl FnOnce(&UpgradeContext, CancelWatcher) -> Result<S, UpstreamError>,
    ) -> Result<Self, BridgeRefusal> {
        let (cancel, watcher) = CancelToken::new();
        let stream = make_stream(ctx, watcher).map_err(BridgeRefusal::StreamCreation)?;
        Ok(Self {
            name: name.into(),
            stream: AsyncMutex::new(Some(stream)),
            cancel,
        })
    }
}

impl<S: StreamSink + CloseAndRecv> ConnectionHandler<ControlEnvelope, ControlEnvelope> for ClientStreamingBridge<S> {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn on_start(&self, _conn: &ConnectionHandle<ControlEnvelope>) -> Result<(), HandlerError> {
        Ok(())
    }

    async fn handle_message(
        &self,
        conn: &ConnectionHandle<ControlEnvelope>,
        payload: ControlEnvelope,
    ) -> Result<(), HandlerError> {
        match payload {
            ControlEnvelope::Data(value) => {
                let mut guard = self.stream.lock().await;
                if let Some(stream) = guard.as_mut() {
                    if let Err(e) = stream.send(value).await {
                        let _ = conn.send_error(e.to_string());
                    }
                }
            }
            ControlEnvelope::EndSend => {
                let stream = self.stream.lock().await.take();
                if let Some(stream) = stream {
                    match Box::new(stream).close_and_recv().await {
                        Ok(response) => {
                            let _ = conn.send_data(ControlEnvelope::Data(response));
                            let _ = conn.send_data(ControlEnvelope::StreamEnd);
                        }
                        Err(e) => {
                            let _ = conn.send_error(e.to_string());
                        }
                    }
                }
            }
            ControlEnvelope::Cancel => self.cancel.cancel(),
            ControlEnvelope::Pong { .. } => {}
            other => {
                warn!(conn_id = %conn.id(), kind = ?other, "unexpected control frame in client-streaming bridge");
            }
        }
        Ok(())
    }

    async fn on_close(&self, _conn: &ConnectionHandle<ControlEnvelope>) {
        self.cancel.cancel();
    }
}
