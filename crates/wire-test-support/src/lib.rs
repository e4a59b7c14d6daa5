//! In-process mock transport pair, used in place of a real socket to drive
//! the connection engine end-to-end in tests.
//!
//! Trades a real TCP `tokio-tungstenite` round trip for an in-memory channel
//! pair: the engine side exercises the exact same
//! [`wire_transport::FramedTransport`] contract, while test code drives the
//! peer side directly without standing up a listener.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use wire_transport::{FrameKind, FramedTransport, RawFrame, ReadError, TransportRead, TransportWrite, WriteError};

/// The engine-facing half of a mock link: a [`FramedTransport`] backed by
/// in-memory channels instead of a socket.
pub struct MockLink {
    inbound: mpsc::UnboundedReceiver<RawFrame>,
    outbound: mpsc::UnboundedSender<RawFrame>,
    peer_closed: Arc<AtomicBool>,
    link_closed: Arc<AtomicBool>,
}

/// The test-facing half: send frames to the engine, observe what the engine
/// wrote, and check whether the engine closed its write side.
pub struct MockPeer {
    to_engine: mpsc::UnboundedSender<RawFrame>,
    from_engine: mpsc::UnboundedReceiver<RawFrame>,
    link_closed: Arc<AtomicBool>,
}

/// Build a connected mock link/peer pair.
pub fn mock_pair() -> (MockLink, MockPeer) {
    let (to_engine_tx, to_engine_rx) = mpsc::unbounded_channel();
    let (from_engine_tx, from_engine_rx) = mpsc::unbounded_channel();
    let peer_closed = Arc::new(AtomicBool::new(false));
    let link_closed = Arc::new(AtomicBool::new(false));
    (
        MockLink {
            inbound: to_engine_rx,
            outbound: from_engine_tx,
            peer_closed,
            link_closed: link_closed.clone(),
        },
        MockPeer {
            to_engine: to_engine_tx,
            from_engine: from_engine_rx,
            link_closed,
        },
    )
}

impl MockPeer {
    /// Send a text frame to the engine, as if the peer wrote it.
    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.to_engine.send(RawFrame {
            kind: FrameKind::Text,
            bytes: text.into().into_bytes(),
        });
    }

    /// Simulate the peer disconnecting without a close handshake.
    pub fn disconnect(self) {
        drop(self.to_engine);
    }

    /// Receive the next frame the engine wrote, waiting if necessary.
    pub async fn recv(&mut self) -> Option<RawFrame> {
        self.from_engine.recv().await
    }

    /// Receive the next frame's text body, asserting it is a text frame.
    pub async fn recv_text(&mut self) -> Option<String> {
        let frame = self.recv().await?;
        assert_eq!(frame.kind, FrameKind::Text, "expected a text frame");
        Some(String::from_utf8(frame.bytes).expect("frame was not valid utf8"))
    }

    /// Whether the engine has closed its write side (its last action on the
    /// Closing path).
    pub fn engine_closed(&self) -> bool {
        self.link_closed.load(Ordering::SeqCst)
    }
}

impl FramedTransport for MockLink {
    type Read = MockRead;
    type Write = MockWrite;

    fn split(self) -> (Self::Read, Self::Write) {
        (
            MockRead {
                inbound: self.inbound,
                peer_closed: self.peer_closed,
                deadline: None,
            },
            MockWrite {
                outbound: self.outbound,
                link_closed: self.link_closed,
            },
        )
    }
}

pub struct MockRead {
    inbound: mpsc::UnboundedReceiver<RawFrame>,
    #[allow(dead_code)]
    peer_closed: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl TransportRead for MockRead {
    async fn read(&mut self) -> Result<RawFrame, ReadError> {
        match self.deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                match tokio::time::timeout(remaining, self.inbound.recv()).await {
                    Ok(Some(frame)) => Ok(frame),
                    Ok(None) => Err(ReadError::NormalClose),
                    Err(_) => Err(ReadError::Other("mock read deadline exceeded".into())),
                }
            }
            None => self.inbound.recv().await.ok_or(ReadError::NormalClose),
        }
    }

    fn set_read_deadline(&mut self, deadline: Instant) {
        self.deadline = Some(deadline);
    }
}

pub struct MockWrite {
    outbound: mpsc::UnboundedSender<RawFrame>,
    link_closed: Arc<AtomicBool>,
}

impl TransportWrite for MockWrite {
    async fn write(&mut self, kind: FrameKind, bytes: Vec<u8>) -> Result<(), WriteError> {
        self.outbound
            .send(RawFrame { kind, bytes })
            .map_err(|_| WriteError("mock peer gone".into()))
    }

    async fn close(&mut self) {
        self.link_closed.store(true, Ordering::SeqCst);
    }
}
