/// The single sum type every outbound write is expressed as.
///
/// Exactly one variant is ever inhabited; consumers dispatch on the variant,
/// never on field presence (spec invariant: "at most one OutgoingMessage
/// branch is set").
pub enum OutgoingMessage<O> {
    /// An application data payload, encoded by the connection's codec.
    Data(O),
    /// A server-initiated heartbeat. Always serialized as a JSON text frame
    /// regardless of the connection's codec, so the control channel stays
    /// debuggable even when application data is binary proto.
    Heartbeat(HeartbeatFrame),
    /// A terminal notification: either a suppressed end-of-stream (no wire
    /// effect) or an error to report to the peer before closing.
    Terminal(TerminalError),
}

/// Fields carried by a heartbeat envelope (spec §6.1).
#[derive(Debug, Clone)]
pub struct HeartbeatFrame {
    pub ping_id: u64,
    pub conn_id: String,
    pub name: String,
}

/// The terminal branch of [`OutgoingMessage`].
#[derive(Debug, Clone)]
pub enum TerminalError {
    /// A clean end-of-stream: the writer suppresses this and returns
    /// silently, producing no wire effect.
    EndOfStream,
    /// A reportable failure: serialized as a JSON text error envelope
    /// (spec §6.2) before the writer returns.
    Error(String),
}
