//! Upstream stream handle contract and request-metadata plumbing shared by
//! all three bridge variants.

use std::collections::HashMap;
use std::future::Future;

/// A boxed upstream failure; the concrete error type varies by caller, so
/// the bridge boundary only needs `std::error::Error + Send + Sync`.
pub type UpstreamError = Box<dyn std::error::Error + Send + Sync>;

/// Request metadata captured at upgrade time, threaded into every bridge
/// variant's upstream-handle factory — headers and path params, available
/// uniformly across all three variants instead of only at server-streaming
/// pre-accept.
#[derive(Debug, Clone, Default)]
pub struct UpgradeContext {
    pub path: String,
    pub headers: HashMap<String, String>,
    pub path_params: HashMap<String, String>,
}

impl UpgradeContext {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }
}

/// The recv-only half used by server-streaming and bidirectional bridges.
///
/// `recv` returns `Ok(None)` on clean end-of-stream, matching spec §4.6.1's
/// "end-of-stream" branch.
pub trait StreamSource: Send + 'static {
    fn recv(&mut self) -> impl Future<Output = Result<Option<serde_json::Value>, UpstreamError>> + Send;
}

/// The send-only half used by client-streaming and bidirectional bridges.
pub trait StreamSink: Send + 'static {
    fn send(&mut self, value: serde_json::Value) -> impl Future<Output = Result<(), UpstreamError>> + Send;
}

/// Client-streaming's terminal operation: half-close the send side and
/// obtain the single terminal response.
pub trait CloseAndRecv: Send + 'static {
    fn close_and_recv(self: Box<Self>) -> impl Future<Output = Result<serde_json::Value, UpstreamError>> + Send;
}

/// Bidirectional's half-close: stop sending without tearing down recv.
pub trait CloseSend: Send + 'static {
    fn close_send(&mut self) -> impl Future<Output = ()> + Send;
}
