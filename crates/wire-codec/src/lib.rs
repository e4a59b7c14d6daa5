//! Codec contract: a pure, stateless encode/decode pair parameterized by an
//! inbound payload type `I` and an outbound payload type `O`. Knows nothing
//! about the transport, heartbeats, or connection lifecycle.
//!
//! Codecs are shared (read-only) across connections and must be safe to
//! invoke concurrently.

use wire_transport::FrameKind;

/// A stateless, concurrency-safe encode/decode pair.
///
/// The codec decides which frame kind to emit per outbound message; decode is
/// told the frame kind as received, so a codec that always emits JSON text
/// (say) can still validate that nothing arrived as binary.
pub trait Codec<I, O>: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn decode(&self, bytes: &[u8], kind: FrameKind) -> Result<I, Self::Error>;
    fn encode(&self, value: &O) -> Result<(Vec<u8>, FrameKind), Self::Error>;
}

/// Decode/encode errors for the bundled JSON codecs.
#[derive(Debug, thiserror::Error)]
pub enum JsonCodecError {
    #[error("expected a text frame, got binary")]
    UnexpectedBinaryFrame,
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A typed JSON codec: encodes/decodes concrete `serde` shapes, always as
/// text frames.
pub struct JsonCodec<I, O> {
    _marker: std::marker::PhantomData<fn() -> (I, O)>,
}

impl<I, O> Default for JsonCodec<I, O> {
    fn default() -> Self {
        Self {
            _marker: std::marker::PhantomData,
        }
    }
}

impl<I, O> JsonCodec<I, O> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<I, O> Codec<I, O> for JsonCodec<I, O>
where
    I: serde::de::DeserializeOwned + Send + Sync,
    O: serde::Serialize + Send + Sync,
{
    type Error = JsonCodecError;

    fn decode(&self, bytes: &[u8], kind: FrameKind) -> Result<I, Self::Error> {
        if kind != FrameKind::Text {
            return Err(JsonCodecError::UnexpectedBinaryFrame);
        }
        Ok(serde_json::from_slice(bytes)?)
    }

    fn encode(&self, value: &O) -> Result<(Vec<u8>, FrameKind), Self::Error> {
        Ok((serde_json::to_vec(value)?, FrameKind::Text))
    }
}

/// A dynamic-JSON codec: decodes to an untyped `serde_json::Value` tree,
/// always as text frames. Used by callers that want to inspect the payload
/// shape without a concrete Rust type (e.g. the dynamic stream variant
/// mentioned alongside typed-JSON, proto-as-JSON, and proto-as-binary).
#[derive(Default)]
pub struct DynamicJsonCodec;

impl Codec<serde_json::Value, serde_json::Value> for DynamicJsonCodec {
    type Error = JsonCodecError;

    fn decode(&self, bytes: &[u8], kind: FrameKind) -> Result<serde_json::Value, Self::Error> {
        if kind != FrameKind::Text {
            return Err(JsonCodecError::UnexpectedBinaryFrame);
        }
        Ok(serde_json::from_slice(bytes)?)
    }

    fn encode(&self, value: &serde_json::Value) -> Result<(Vec<u8>, FrameKind), Self::Error> {
        Ok((serde_json::to_vec(value)?, FrameKind::Text))
    }
}
