//! The JSON control envelope the streaming bridge multiplexes data, flow
//! control (`end_send`, `cancel`), and lifecycle (`stream_end`, `ping`/`pong`,
//! `error`) onto.
//!
//! This is a specialization of [`wire_codec::Codec`] that sits above the
//! connection engine: the engine is parameterized with both `I` and `O` equal
//! to [`ControlEnvelope`]. Data payloads stay a generic JSON tree at this
//! layer -- reassembly into a concrete proto message is the caller's job,
//! done on demand at the bridge layer via a caller-supplied factory, keeping
//! wire shapes untyped at the envelope boundary and letting call sites parse
//! further.

use serde::{Deserialize, Serialize};
use wire_codec::Codec;
use wire_transport::FrameKind;

/// The tagged union carried over the wire for every streaming-bridge message
/// in either direction.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEnvelope {
    /// An application data payload, left as a generic JSON tree. Reassembled
    /// into a concrete message by a caller-supplied factory at the bridge
    /// layer, not here.
    Data(serde_json::Value),
    /// A reportable failure. Sent by the server on non-terminal upstream
    /// failure.
    Error(String),
    /// Clean end of the server's outbound stream.
    StreamEnd,
    /// Server-initiated heartbeat.
    Ping { ping_id: u64, conn_id: String, name: String },
    /// Client's heartbeat reply.
    Pong { ping_id: u64 },
    /// Client requests the upstream work be aborted.
    Cancel,
    /// Client signals it will send no more data envelopes.
    EndSend,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type")]
enum Wire {
    #[serde(rename = "data")]
    Data { data: serde_json::Value },
    #[serde(rename = "error")]
    Error { error: String },
    #[serde(rename = "stream_end")]
    StreamEnd,
    #[serde(rename = "ping")]
    Ping {
        #[serde(rename = "pingId")]
        ping_id: u64,
        #[serde(rename = "connId")]
        conn_id: String,
        name: String,
    },
    #[serde(rename = "pong")]
    Pong {
        #[serde(rename = "pingId")]
        ping_id: u64,
    },
    #[serde(rename = "cancel")]
    Cancel,
    #[serde(rename = "end_send")]
    EndSend,
}

impl From<ControlEnvelope> for Wire {
    fn from(env: ControlEnvelope) -> Self {
        match env {
            ControlEnvelope::Data(data) => Wire::Data { data },
            ControlEnvelope::Error(error) => Wire::Error { error },
            ControlEnvelope::StreamEnd => Wire::StreamEnd,
            ControlEnvelope::Ping { ping_id, conn_id, name } => Wire::Ping { ping_id, conn_id, name },
            ControlEnvelope::Pong { ping_id } => Wire::Pong { ping_id },
            ControlEnvelope::Cancel => Wire::Cancel,
            ControlEnvelope::EndSend => Wire::EndSend,
        }
    }
}

impl From<Wire> for ControlEnvelope {
    fn from(wire: Wire) -> Self {
        match wire {
            Wire::Data { data } => ControlEnvelope::Data(data),
            Wire::Error { error } => ControlEnvelope::Error(error),
            Wire::StreamEnd => ControlEnvelope::StreamEnd,
            Wire::Ping { ping_id, conn_id, name } => ControlEnvelope::Ping { ping_id, conn_id, name },
            Wire::Pong { ping_id } => ControlEnvelope::Pong { ping_id },
            Wire::Cancel => ControlEnvelope::Cancel,
            Wire::EndSend => ControlEnvelope::EndSend,
        }
    }
}

/// Failures encoding or decoding a [`ControlEnvelope`].
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeCodecError {
    #[error("envelope json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The codec the connection engine is parameterized with for every streaming
/// bridge variant. Always JSON text, matching spec §4.5/§6.3.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvelopeCodec;

impl Codec<ControlEnvelope, ControlEnvelope> for EnvelopeCodec {
    type Error = EnvelopeCodecError;

    fn decode(&self, bytes: &[u8], _kind: FrameKind) -> Result<ControlEnvelope, Self::Error> {
        let wire: Wire = serde_json::from_slice(bytes)?;
        Ok(wire.into())
    }

    fn encode(&self, value: &ControlEnvelope) -> Result<(Vec<u8>, FrameKind), Self::Error> {
        let wire: Wire = value.clone().into();
        Ok((serde_json::to_vec(&wire)?, FrameKind::Text))
    }
}
