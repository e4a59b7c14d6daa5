//! The connection engine: a single long-lived framed connection driven
//! through `Pending -> Open -> Closing -> Closed`, backed by an independent
//! reader producer task and a serialized writer task (spec invariant 1).

mod cancel;
mod engine;
mod metrics;
mod outgoing;
mod reader;
mod wire_envelopes;
mod writer;

pub use cancel::{CancelToken, CancelWatcher};
pub use engine::{
    run_connection, CloseReason, ConnectionDebug, ConnectionHandle, ConnectionHandler,
    ConnectionOutcome, ConnectionState, EngineError, HandlerError, HeartbeatConfig,
};
pub use metrics::ConnectionMetrics;
pub use outgoing::{HeartbeatFrame, OutgoingMessage, TerminalError};
pub use reader::ReaderEvent;
pub use writer::{SerializedWriter, WriterConfig, WriterExit};
