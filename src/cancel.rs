//! A single root cancellation signal shared by the supervisor and every
//! long-lived task beneath it.
//!
//! A thin wrapper over `tokio::sync::watch<bool>` rather than a dedicated
//! crate, since `tokio` is already a dependency and this needs nothing
//! `tokio-util`'s `CancellationToken` would add.

use tokio::sync::watch;

#[derive(Clone)]
pub struct CancelToken {
    tx: watch::Sender<bool>,
}

#[derive(Clone)]
pub struct CancelWatch {
    rx: watch::Receiver<bool>,
}

pub fn cancel_pair() -> (CancelToken, CancelWatch) {
    let (tx, rx) = watch::channel(false);
    (CancelToken { tx }, CancelWatch { rx })
}

impl CancelToken {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn watch(&self) -> CancelWatch {
        CancelWatch {
            rx: self.tx.subscribe(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl CancelWatch {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation fires. Safe to await repeatedly or select! on.
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
    async fn cancelled_resolves_after_cancel_is_called() {
        let (token, mut watch) = cancel_pair();
        assert!(!watch.is_cancelled());
        token.cancel();
        watch.cancelled().await;
        assert!(watch.is_cancelled());
    }
}
