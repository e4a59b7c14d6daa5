use tokio::sync::watch;

/// A one-shot cancellation signal, fired by controller-close or a peer
/// `cancel` envelope, observed by long-running tasks (forwarders, upstream
/// stream handles) to abort.
///
/// Implemented as a `tokio::sync::watch::channel(bool)` rather than pulling
/// in `tokio-util`'s `CancellationToken`: a `bool` watch channel is enough to
/// broadcast a one-shot firing to any number of observers without an extra
/// dependency.
#[derive(Clone)]
pub struct CancelToken {
    tx: watch::Sender<bool>,
}

/// The observing half of a [`CancelToken`].
#[derive(Clone)]
pub struct CancelWatcher {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> (Self, CancelWatcher) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, CancelWatcher { rx })
    }

    /// Fire the token. Safe to call more than once or concurrently.
    pub fn cancel(&self) {
        // `send` only errors if every receiver was dropped; there's nothing
        // left to observe the firing in that case, which is fine.
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn watcher(&self) -> CancelWatcher {
        CancelWatcher {
            rx: self.tx.subscribe(),
        }
    }
}

impl CancelWatcher {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the token fires. Resolves immediately if it already has.
    pub async fn cancelled(&mut self) {
        if *self.rx.borrow() {
            return;
        }
        let _ = self.rx.changed().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn watcher_observes_cancel_fired_after_subscribe() {
        let (token, mut watcher) = CancelToken::new();
        assert!(!watcher.is_cancelled());
        token.cancel();
        watcher.cancelled().await;
        assert!(watcher.is_cancelled());
    }

    #[tokio::test]
    async fn watcher_created_after_cancel_sees_it_immediately() {
        let (token, _first) = CancelToken::new();
        token.cancel();
        let mut late = token.watcher();
        assert!(late.is_cancelled());
        late.cancelled().await;
    }

    #[test]
    fn cancel_is_idempotent() {
        let (token, watcher) = CancelToken::new();
        token.cancel();
        token.cancel();
        assert!(watcher.is_cancelled());
    }
}
