//! Three connection-engine specializations that adapt an upstream stream
//! handle into [`stream_envelope::ControlEnvelope`] traffic: server-streaming,
//! client-streaming, and bidirectional.

mod bidi;
mod client_streaming;
mod server_streaming;
mod upstream;

pub use bidi::BidiStreamingBridge;
pub use client_streaming::ClientStreamingBridge;
pub use server_streaming::{BridgeRefusal, ServerStreamingBridge};
pub use upstream::{CloseAndRecv, CloseSend, StreamSink, StreamSource, UpgradeContext, UpstreamError};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    use stream_envelope::EnvelopeCodec;
    use wire_engine::{run_connection, CancelWatcher, HeartbeatConfig, WriterConfig};
    use wire_test_support::mock_pair;

    fn never_timeout() -> HeartbeatConfig {
        HeartbeatConfig {
            send_period: Duration::from_secs(3600),
            silence_timeout: Duration::from_secs(3600),
        }
    }

    struct ChannelSource {
        rx: mpsc::UnboundedReceiver<Option<serde_json::Value>>,
    }

    impl StreamSource for ChannelSource {
        async fn recv(&mut self) -> Result<Option<serde_json::Value>, UpstreamError> {
            Ok(self.rx.recv().await.flatten())
        }
    }

    fn channel_source() -> (mpsc::UnboundedSender<Option<serde_json::Value>>, ChannelSource) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, ChannelSource { rx })
    }

    /// End-to-end scenario 1 from spec §8: two data events then stream_end.
    #[tokio::test]
    async fn server_streaming_subscribe_scenario() {
        let (tx, source) = channel_source();
        let ctx = UpgradeContext::default();
        let bridge = Arc::new(
            ServerStreamingBridge::new("events", &ctx, |_ctx, _cancel: CancelWatcher| {
                Ok::<_, UpstreamError>(source)
            })
            .unwrap(),
        );

        tx.send(Some(serde_json::json!({"eventId": "e1"}))).unwrap();
        tx.send(Some(serde_json::json!({"eventId": "e2"}))).unwrap();
        tx.send(None).unwrap();

        let (link, mut peer) = mock_pair();
        let join = tokio::spawn(run_connection(
            link,
            Arc::new(EnvelopeCodec),
            bridge,
            never_timeout(),
            WriterConfig::default(),
        ));

        assert_eq!(
            peer.recv_text().await.unwrap(),
            r#"{"type":"data","data":{"eventId":"e1"}}"#
        );
        assert_eq!(
            peer.recv_text().await.unwrap(),
            r#"{"type":"data","data":{"eventId":"e2"}}"#
        );
        assert_eq!(peer.recv_text().await.unwrap(), r#"{"type":"stream_end"}"#);

        peer.disconnect();
        join.await.unwrap();
    }

    /// End-to-end scenario 3 from spec §8: cancel suppresses further
    /// forwarding and no terminal envelope is delivered.
    #[tokio::test]
    async fn bidi_cancel_suppresses_terminal_envelope() {
        struct NeverSend;
        impl StreamSink for NeverSend {
            async fn send(&mut self, _value: serde_json::Value) -> Result<(), UpstreamError> {
                Ok(())
            }
        }
        impl CloseSend for NeverSend {
            async fn close_send(&mut self) {}
        }

        let (tx, source) = channel_source();
        let ctx = UpgradeContext::default();
        let bridge = Arc::new(
            BidiStreamingBridge::new("game", &ctx, |_ctx, _cancel: CancelWatcher| {
                Ok::<_, UpstreamError>((source, NeverSend))
            })
            .unwrap(),
        );

        tx.send(Some(serde_json::json!({"stateId": "s1"}))).unwrap();

        let (link, mut peer) = mock_pair();
        let join = tokio::spawn(run_connection(
            link,
            Arc::new(EnvelopeCodec),
            bridge,
            never_timeout(),
            WriterConfig::default(),
        ));

        assert_eq!(
            peer.recv_text().await.unwrap(),
            r#"{"type":"data","data":{"stateId":"s1"}}"#
        );

        peer.send_text(r#"{"type":"cancel"}"#);
        // Upstream never produces EOF after cancel; no stream_end/error
        // should ever arrive. Disconnecting lets the engine observe a normal
        // close instead of waiting forever.
        peer.disconnect();
        let outcome = join.await.unwrap();
        assert_eq!(outcome.reason, wire_engine::CloseReason::PeerClosed);
    }

    /// End-to-end scenario 6 from spec §8: a non-EOF upstream error produces
    /// an error envelope and no stream_end.
    #[tokio::test]
    async fn server_streaming_upstream_error_mid_stream() {
        struct FailingSource {
            sent_first: bool,
        }
        impl StreamSource for FailingSource {
            async fn recv(&mut self) -> Result<Option<serde_json::Value>, UpstreamError> {
                if !self.sent_first {
                    self.sent_first = true;
                    Ok(Some(serde_json::json!({"eventId": "e1"})))
                } else {
                    Err("upstream exploded".into())
                }
            }
        }

        let ctx = UpgradeContext::default();
        let bridge = Arc::new(
            ServerStreamingBridge::new("events", &ctx, |_ctx, _cancel: CancelWatcher| {
                Ok::<_, UpstreamError>(FailingSource { sent_first: false })
            })
            .unwrap(),
        );

        let (link, mut peer) = mock_pair();
        let join = tokio::spawn(run_connection(
            link,
            Arc::new(EnvelopeCodec),
            bridge,
            never_timeout(),
            WriterConfig::default(),
        ));

        assert_eq!(
            peer.recv_text().await.unwrap(),
            r#"{"type":"data","data":{"eventId":"e1"}}"#
        );
        let err_frame = peer.recv_text().await.unwrap();
        assert!(err_frame.contains(r#""type":"error""#));
        assert!(err_frame.contains("upstream exploded"));

        peer.disconnect();
        join.await.unwrap();
    }
}
