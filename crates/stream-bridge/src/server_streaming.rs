//! Server-streaming bridge (spec §4.6.1): the client is receive-only; the
//! bridge forwards upstream values as `data` envelopes and translates
//! upstream EOF into a terminal `stream_end`.

use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use stream_envelope::ControlEnvelope;
use wire_engine::{CancelToken, CancelWatcher, ConnectionHandle, ConnectionHandler, HandlerError};

use crate::upstream::{StreamSource, UpgradeContext, UpstreamError};

/// Why pre-accept refused the upgrade (spec §4.6.1: 400 for request parse,
/// 500 for stream creation). Shared across all three bridge variants.
#[derive(Debug, thiserror::Error)]
pub enum BridgeRefusal {
    #[error("bad request: {0}")]
    RequestParse(UpstreamError),
    #[error("upstream stream creation failed: {0}")]
    StreamCreation(UpstreamError),
}

/// A streaming-bridge connection handler whose upstream handle is recv-only.
pub struct ServerStreamingBridge<S: StreamSource> {
    name: String,
    stream: AsyncMutex<Option<S>>,
    cancel: CancelToken,
}

impl<S: StreamSource> ServerStreamingBridge<S> {
    /// Pre-accept: build the upstream stream handle bound to a fresh
    /// cancellation token. `make_stream` is the caller-supplied factory
    /// (single call taking the request and returning a recv-only handle).
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

impl<S: StreamSource> ConnectionHandler<ControlEnvelope, ControlEnvelope> for ServerStreamingBridge<S> {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn on_start(&self, conn: &ConnectionHandle<ControlEnvelope>) -> Result<(), HandlerError> {
        let stream = self
            .stream
            .lock()
            .await
            .take()
            .expect("on_start called more than once");
        let conn = conn.clone();
        let cancel = self.cancel.watcher();
        tokio::spawn(forward(stream, conn, cancel));
        Ok(())
    }

    async fn handle_message(
        &self,
        conn: &ConnectionHandle<ControlEnvelope>,
        payload: ControlEnvelope,
    ) -> Result<(), HandlerError> {
        match payload {
            ControlEnvelope::Pong { .. } => {}
            ControlEnvelope::Cancel => self.cancel.cancel(),
            other => {
                warn!(conn_id = %conn.id(), kind = ?other, "unexpected control frame from receive-only peer");
            }
        }
        Ok(())
    }

    async fn on_close(&self, _conn: &ConnectionHandle<ControlEnvelope>) {
        self.cancel.cancel();
    }
}

async fn forward<S: StreamSource>(
    mut stream: S,
    conn: ConnectionHandle<ControlEnvelope>,
    cancel: CancelWatcher,
) {
    loop {
        match stream.recv().await {
            Ok(None) => {
                if !cancel.is_cancelled() {
                    let _ = conn.send_data(ControlEnvelope::StreamEnd);
                }
                info!(conn_id = %conn.id(), "upstream stream ended cleanly");
                break;
            }
            Err(e) if cancel.is_cancelled() => {
                info!(conn_id = %conn.id(), error = %e, "upstream error after cancel; exiting silently");
                break;
            }
            Err(e) => {
                let _ = conn.send_error(e.to_string());
                warn!(conn_id = %conn.id(), error = %e, "upstream error; ending forward");
                break;
            }
            Ok(Some(value)) => {
                let _ = conn.send_data(ControlEnvelope::Data(value));
            }
        }
    }
}
