use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use wire_codec::Codec;
use wire_transport::{ReadError, TransportRead};

/// A single event produced by the reader task for the controller to act on.
pub enum ReaderEvent<I> {
    /// A successfully decoded payload.
    Payload(I),
    /// A frame arrived but failed to decode.
    DecodeError(Box<dyn std::error::Error + Send + Sync>),
    /// The transport's read side ended, classified.
    Closed(ReadError),
}

/// Spawn the reader producer task: the exclusive owner of the transport's
/// read half for the life of the connection (spec invariant 1).
///
/// The silence deadline is owned and reset locally by this task -- every
/// successful or failed read pushes the deadline forward by
/// `silence_timeout`, matching spec §4.4's "reset read deadline to now +
/// silence-timeout" step without needing the controller to round-trip a
/// deadline update through a channel.
pub fn spawn<I, O, C, R>(
    codec: Arc<C>,
    mut transport: R,
    silence_timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> (mpsc::Receiver<ReaderEvent<I>>, tokio::task::JoinHandle<()>)
where
    C: Codec<I, O> + 'static,
    R: TransportRead + 'static,
    I: Send + 'static,
{
    let (tx, rx) = mpsc::channel(16);

    let handle = tokio::spawn(async move {
        transport.set_read_deadline(Instant::now() + silence_timeout);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                frame = transport.read() => {
                    transport.set_read_deadline(Instant::now() + silence_timeout);
                    match frame {
                        Ok(raw) => {
                            let event = match codec.decode(&raw.bytes, raw.kind) {
                                Ok(payload) => ReaderEvent::Payload(payload),
                                Err(e) => ReaderEvent::DecodeError(Box::new(e)),
                            };
                            if tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        // NormalClose/UnexpectedClose mean the transport is
                        // gone; stop reading. `Other` (protocol blip,
                        // deadline expiry) is reported but may be masked by
                        // the handler's on-error hook, so keep reading.
                        Err(e @ ReadError::Other(_)) => {
                            if tx.send(ReaderEvent::Closed(e)).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            let _ = tx.send(ReaderEvent::Closed(e)).await;
                            break;
                        }
                    }
                }
            }
        }
    });

    (rx, handle)
}
