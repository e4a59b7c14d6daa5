//! Framed transport contract: a thin abstraction over a message-oriented
//! bidirectional link (text or binary frames, close notification, read/write
//! deadlines). The connection engine's only I/O surface.
//!
//! The contract is split into a read half and a write half up front
//! ([`FramedTransport::split`]), the same way `futures_util::StreamExt::split`
//! hands a WebSocket stream's two halves to independent tasks. This lets the
//! reader producer and the serialized writer each own their half exclusively,
//! per spec invariant 1: the transport's write primitive is never invoked
//! outside the writer.

use std::future::Future;
use std::time::Instant;

#[cfg(feature = "axum-ws")]
mod axum_ws;

#[cfg(feature = "axum-ws")]
pub use axum_ws::AxumWsTransport;

/// Text vs binary tag on a transport frame, selected by the codec per
/// message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Text,
    Binary,
}

/// Classification of a transport read failure.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    /// The peer closed the connection as part of the normal WebSocket close
    /// handshake (a `Close` frame, or stream end with no error).
    #[error("transport closed normally")]
    NormalClose,
    /// The connection dropped without a clean close handshake.
    #[error("transport closed unexpectedly")]
    UnexpectedClose,
    /// Any other transport-level failure (protocol violation, I/O error,
    /// read-deadline expiry).
    #[error("transport error: {0}")]
    Other(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Failure writing a single framed message.
#[derive(Debug, thiserror::Error)]
#[error("transport write error: {0}")]
pub struct WriteError(#[source] pub Box<dyn std::error::Error + Send + Sync>);

/// A single decoded frame as read off the wire.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub kind: FrameKind,
    pub bytes: Vec<u8>,
}

/// A bidirectional, message-framed link that can be split into independent
/// read/write halves.
pub trait FramedTransport: Send {
    type Read: TransportRead;
    type Write: TransportWrite;

    fn split(self) -> (Self::Read, Self::Write);
}

/// The read half, owned exclusively by the reader producer task.
pub trait TransportRead: Send {
    /// Read a single framed message, or a classified error.
    fn read(&mut self) -> impl Future<Output = Result<RawFrame, ReadError>> + Send;

    /// Set the absolute instant after which the next `read()` should give up
    /// and return a classified error instead of blocking further.
    ///
    /// This is a belt-and-braces mechanism to unblock the reader; the
    /// connection engine's own silence-timeout ticker is authoritative for
    /// deciding whether to close (spec §9).
    fn set_read_deadline(&mut self, deadline: Instant);
}

/// The write half, owned exclusively by the serialized writer task.
pub trait TransportWrite: Send {
    /// Write a single framed message atomically.
    fn write(&mut self, kind: FrameKind, bytes: Vec<u8>) -> impl Future<Output = Result<(), WriteError>> + Send;

    /// Close the transport. Idempotent.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}
