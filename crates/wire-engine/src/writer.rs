use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};
use wire_codec::Codec;
use wire_transport::{FrameKind, TransportWrite};

use crate::outgoing::{OutgoingMessage, TerminalError};
use crate::wire_envelopes;

/// Per-connection writer tuning.
#[derive(Debug, Clone, Copy)]
pub struct WriterConfig {
    pub queue_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self { queue_capacity: 8 }
    }
}

/// Reason the writer task stopped running, observed by the engine to decide
/// whether to escalate to close.
#[derive(Debug)]
pub enum WriterExit {
    /// `stop()` was called; the channel was drained cleanly.
    Stopped,
    /// The channel closed because every sender was dropped.
    SendersDropped,
    /// A transport write failed; the worker recorded it and exited.
    WriteFailed,
}

/// A single-writer funnel owning the transport's write side.
///
/// Drains a channel of [`OutgoingMessage`] values in enqueue order and emits
/// properly framed bytes, guaranteeing at-most-one in-flight write to the
/// transport (spec invariant 1: the transport's write primitive is never
/// invoked outside the writer).
pub struct SerializedWriter<O> {
    tx: mpsc::Sender<OutgoingMessage<O>>,
    shutdown_tx: watch::Sender<bool>,
    running: StdMutex<bool>,
}

impl<O: Send + 'static> SerializedWriter<O> {
    /// Start the writer task: takes ownership of the transport's write half
    /// and the codec used to encode `Data` payloads. The write half is
    /// closed as the task's last action, so once the returned `JoinHandle`
    /// resolves both "writer stopped" and "transport closed" (spec §4.4's
    /// Closing step) have happened.
    pub fn spawn<I, C, W>(
        codec: Arc<C>,
        mut transport: W,
        config: WriterConfig,
    ) -> (Self, tokio::task::JoinHandle<WriterExit>)
    where
        C: Codec<I, O> + 'static,
        W: TransportWrite + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<OutgoingMessage<O>>(config.queue_capacity.max(1));
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let exit = loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break WriterExit::Stopped;
                        }
                    }
                    msg = rx.recv() => {
                        let Some(msg) = msg else {
                            break WriterExit::SendersDropped;
                        };
                        if write_one(&*codec, &mut transport, msg).await.is_err() {
                            break WriterExit::WriteFailed;
                        }
                    }
                }
            };
            rx.close();
            // Drain whatever was already queued so a fast `stop()` right
            // after a burst of sends doesn't silently lose heartbeats or
            // terminal errors enqueued just before shutdown fired.
            while let Ok(msg) = rx.try_recv() {
                let _ = write_one(&*codec, &mut transport, msg).await;
            }
            transport.close().await;
            exit
        });

        (
            Self {
                tx,
                shutdown_tx,
                running: StdMutex::new(true),
            },
            handle,
        )
    }

    /// Enqueue an outbound message. Non-blocking if the channel has spare
    /// capacity; whether it blocks when full is left to the caller (use
    /// [`SerializedWriter::send_blocking`] for a backpressured variant). The
    /// worker itself never drops a `Heartbeat` or `Terminal` once accepted.
    pub fn send(&self, msg: OutgoingMessage<O>) -> Result<(), OutgoingMessage<O>> {
        self.tx.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(m) => m,
            mpsc::error::TrySendError::Closed(m) => m,
        })
    }

    /// Enqueue an outbound message, waiting for queue capacity if full.
    pub async fn send_blocking(&self, msg: OutgoingMessage<O>) -> Result<(), OutgoingMessage<O>> {
        self.tx.send(msg).await.map_err(|e| e.0)
    }

    /// Messages currently queued and not yet written, for debug snapshots.
    pub fn queue_depth(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Stop the writer: signals the worker to drain and exit, closing the
    /// transport's write half as its last action. Idempotent.
    pub fn stop(&self) {
        let mut running = self.running.lock().expect("writer running mutex poisoned");
        if !*running {
            return;
        }
        *running = false;
        // The worker may already have exited (write failure); a send error
        // here just means there's nothing left to signal.
        let _ = self.shutdown_tx.send(true);
        debug!("serialized writer stop requested");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(thiserror::Error, Debug)]
    #[error("text codec error: {0}")]
    struct TextCodecError(String);

    struct TextCodec;

    impl Codec<String, String> for TextCodec {
        type Error = TextCodecError;

        fn decode(&self, bytes: &[u8], _kind: FrameKind) -> Result<String, Self::Error> {
            String::from_utf8(bytes.to_vec()).map_err(|e| TextCodecError(e.to_string()))
        }

        fn encode(&self, value: &String) -> Result<(Vec<u8>, FrameKind), Self::Error> {
            Ok((format!("data:{value}").into_bytes(), FrameKind::Text))
        }
    }

    /// A [`TransportWrite`] that records every write's text body, in order,
    /// instead of touching a real socket.
    struct RecordingWrite {
        tx: mpsc::UnboundedSender<String>,
    }

    impl RecordingWrite {
        fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (Self { tx }, rx)
        }
    }

    impl TransportWrite for RecordingWrite {
        async fn write(&mut self, _kind: FrameKind, bytes: Vec<u8>) -> Result<(), wire_transport::WriteError> {
            let _ = self.tx.send(String::from_utf8(bytes).unwrap());
            Ok(())
        }

        async fn close(&mut self) {}
    }

    fn heartbeat(ping_id: u64) -> OutgoingMessage<String> {
        OutgoingMessage::Heartbeat(HeartbeatFrame {
            ping_id,
            conn_id: "conn-1".to_string(),
            name: "worker".to_string(),
        })
    }

    #[tokio::test]
    async fn queue_capacity_one_preserves_fifo_order_of_data_and_heartbeats() {
        let (write_half, mut recorded) = RecordingWrite::new();
        let (writer, join) = SerializedWriter::spawn(
            Arc::new(TextCodec),
            write_half,
            WriterConfig { queue_capacity: 1 },
        );

        writer
            .send_blocking(OutgoingMessage::Data("a".to_string()))
            .await
            .unwrap();
        writer.send_blocking(heartbeat(1)).await.unwrap();
        writer
            .send_blocking(OutgoingMessage::Data("b".to_string()))
            .await
            .unwrap();
        writer.send_blocking(heartbeat(2)).await.unwrap();

        writer.stop();
        join.await.unwrap();
        drop(writer);

        let mut seen = Vec::new();
        while let Some(text) = recorded.recv().await {
            seen.push(text);
        }

        assert_eq!(seen.len(), 4);
        assert!(seen[0].starts_with("data:a"));
        assert!(seen[1].contains("\"type\":\"ping\""), "expected ping, got {}", seen[1]);
        assert!(seen[2].starts_with("data:b"));
        assert!(seen[3].contains("\"type\":\"ping\""), "expected ping, got {}", seen[3]);
    }

    #[tokio::test]
    async fn send_after_stop_does_not_panic_and_stop_is_idempotent() {
        let (write_half, _recorded) = RecordingWrite::new();
        let (writer, join) = SerializedWriter::spawn(Arc::new(TextCodec), write_half, WriterConfig::default());

        writer.stop();
        join.await.unwrap();

        let result = writer.send(OutgoingMessage::Data("too late".to_string()));
        assert!(result.is_err(), "send on a stopped writer must return Err, not panic");

        // Idempotent: a second stop() after the worker has already exited
        // must not panic or block.
        writer.stop();
    }
}

async fn write_one<I, O, C, W>(
    codec: &C,
    transport: &mut W,
    msg: OutgoingMessage<O>,
) -> Result<(), ()>
where
    C: Codec<I, O>,
    W: TransportWrite,
{
    match msg {
        OutgoingMessage::Data(value) => match codec.encode(&value) {
            Ok((bytes, kind)) => transport.write(kind, bytes).await.map_err(|e| {
                warn!(error = %e, "data frame write failed");
            }),
            Err(e) => {
                warn!(error = %e, "data frame encode failed");
                Ok(())
            }
        },
        OutgoingMessage::Heartbeat(hb) => {
            match wire_envelopes::ping_json(hb.ping_id, &hb.conn_id, &hb.name) {
                Ok(bytes) => transport
                    .write(FrameKind::Text, bytes)
                    .await
                    .map_err(|e| warn!(error = %e, "heartbeat write failed")),
                Err(e) => {
                    warn!(error = %e, "heartbeat encode failed");
                    Ok(())
                }
            }
        }
        OutgoingMessage::Terminal(TerminalError::EndOfStream) => {
            debug!("suppressing end-of-stream terminal message");
            Ok(())
        }
        OutgoingMessage::Terminal(TerminalError::Error(message)) => {
            match wire_envelopes::error_json(&message) {
                Ok(bytes) => transport
                    .write(FrameKind::Text, bytes)
                    .await
                    .map_err(|e| warn!(error = %e, "error envelope write failed")),
                Err(e) => {
                    warn!(error = %e, "error envelope encode failed");
                    Ok(())
                }
            }
        }
    }
}
