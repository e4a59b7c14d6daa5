use std::time::Instant;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tracing::debug;

use crate::{FrameKind, FramedTransport, RawFrame, ReadError, TransportRead, TransportWrite, WriteError};

/// A [`FramedTransport`] over `axum::extract::ws::WebSocket`.
///
/// Drives `socket.recv()`/`socket.send()` under a `tokio::time::timeout`
/// wrapper for the read deadline, and splits the socket via
/// `futures_util::StreamExt::split` to hand independent read/write halves to
/// their respective tasks.
pub struct AxumWsTransport {
    socket: WebSocket,
}

impl AxumWsTransport {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

impl FramedTransport for AxumWsTransport {
    type Read = AxumWsRead;
    type Write = AxumWsWrite;

    fn split(self) -> (Self::Read, Self::Write) {
        let (sink, stream) = self.socket.split();
        (
            AxumWsRead {
                stream,
                read_deadline: None,
            },
            AxumWsWrite { sink },
        )
    }
}

pub struct AxumWsRead {
    stream: SplitStream<WebSocket>,
    read_deadline: Option<Instant>,
}

impl TransportRead for AxumWsRead {
    async fn read(&mut self) -> Result<RawFrame, ReadError> {
        loop {
            let next = match self.read_deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    match tokio::time::timeout(remaining, self.stream.next()).await {
                        Ok(msg) => msg,
                        Err(_) => {
                            return Err(ReadError::Other(Box::new(std::io::Error::new(
                                std::io::ErrorKind::TimedOut,
                                "read deadline exceeded",
                            ))));
                        }
                    }
                }
                None => self.stream.next().await,
            };

            match next {
                None => return Err(ReadError::NormalClose),
                Some(Err(e)) => {
                    debug!(error = %e, "websocket read error");
                    return Err(ReadError::UnexpectedClose);
                }
                Some(Ok(Message::Close(_))) => return Err(ReadError::NormalClose),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(Message::Text(text))) => {
                    return Ok(RawFrame {
                        kind: FrameKind::Text,
                        bytes: text.into_bytes(),
                    });
                }
                Some(Ok(Message::Binary(bytes))) => {
                    return Ok(RawFrame {
                        kind: FrameKind::Binary,
                        bytes: bytes.into(),
                    });
                }
            }
        }
    }

    fn set_read_deadline(&mut self, deadline: Instant) {
        self.read_deadline = Some(deadline);
    }
}

pub struct AxumWsWrite {
    sink: SplitSink<WebSocket, Message>,
}

impl TransportWrite for AxumWsWrite {
    async fn write(&mut self, kind: FrameKind, bytes: Vec<u8>) -> Result<(), WriteError> {
        let msg = match kind {
            FrameKind::Text => {
                let text = String::from_utf8(bytes).map_err(|e| WriteError(Box::new(e)))?;
                Message::Text(text.into())
            }
            FrameKind::Binary => Message::Binary(bytes.into()),
        };
        self.sink.send(msg).await.map_err(|e| WriteError(Box::new(e)))
    }

    async fn close(&mut self) {
        let _ = self.sink.send(Message::Close(None)).await;
        let _ = self.sink.close().await;
    }
}
