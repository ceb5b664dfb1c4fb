use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// One-shot close flag shared between a watcher, its fetcher, and handles.
#[derive(Debug, Default)]
pub struct CloseSignal {
    closed: AtomicBool,
    notify: Notify,
}

impl CloseSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag and wake every pending `closed()` waiter. Idempotent.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Resolves once `close()` has been called.
    pub async fn closed(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent close is not missed
        notified.as_mut().enable();
        if self.is_closed() {
            return;
        }
        notified.await;
    }
}
