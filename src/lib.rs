//! A layered, bidirectional framed-message connection core with a
//! gRPC-style streaming bridge over WebSocket-like transports.
//!
//! This crate is a thin facade: the real work lives in its workspace
//! members. Layers, leaves first:
//!
//! - [`wire_codec`]: the `Codec<I, O>` contract plus JSON concretions.
//! - [`wire_transport`]: the framed-transport contract plus an
//!   `axum::extract::ws::WebSocket` adapter.
//! - [`wire_engine`]: the outgoing-message union, the serialized writer, and
//!   the connection engine's lifecycle state machine.
//! - [`stream_envelope`]: the JSON `ControlEnvelope` used by the streaming
//!   bridge.
//! - [`stream_bridge`]: the three streaming bridge variants.

pub use stream_bridge::{
    BidiStreamingBridge, BridgeRefusal, ClientStreamingBridge, CloseAndRecv, CloseSend,
    ServerStreamingBridge, StreamSink, StreamSource, UpgradeContext, UpstreamError,
};
pub use stream_envelope::{ControlEnvelope, EnvelopeCodec, EnvelopeCodecError};
pub use wire_codec::{Codec, DynamicJsonCodec, JsonCodec, JsonCodecError};
pub use wire_engine::{
    run_connection, CancelToken, CancelWatcher, CloseReason, ConnectionDebug, ConnectionHandle,
    ConnectionHandler, ConnectionMetrics, ConnectionOutcome, ConnectionState, EngineError,
    HandlerError, HeartbeatConfig, OutgoingMessage, ReaderEvent, SerializedWriter, WriterConfig,
    WriterExit,
};
pub use wire_transport::{
    AxumWsTransport, FrameKind, FramedTransport, RawFrame, ReadError, TransportRead, TransportWrite,
    WriteError,
};
