use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;

/// Cooperative cancellation signal shared by a run and whoever may stop it.
#[derive(Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
    sender: broadcast::Sender<()>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelHandle {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            sender,
        }
    }

    /// Returns `false` if the handle was already cancelled.
    pub fn cancel(&self) -> bool {
        if self.flag.swap(true, Ordering::SeqCst) {
            return false;
        }
        let _ = self.sender.send(());
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.subscribe();
        if self.is_cancelled() {
            return;
        }
        // `self` keeps the sender alive, so any wake-up is a cancellation.
        let _ = rx.recv().await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn cancel_is_idempotent() {
        let handle = CancelHandle::new();
        assert!(!handle.is_cancelled());
        assert!(handle.cancel());
        assert!(!handle.cancel());
        assert!(handle.clone().is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_resolves_when_already_cancelled() {
        let handle = CancelHandle::new();
        handle.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle.cancelled())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cancelled_wakes_waiters() {
        let handle = CancelHandle::new();
        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.cancelled().await })
        };
        tokio::task::yield_now().await;
        handle.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_stays_pending_without_signal() {
        let handle = CancelHandle::new();
        let result = tokio::time::timeout(Duration::from_millis(50), handle.cancelled()).await;
        assert!(result.is_err());
    }
}
