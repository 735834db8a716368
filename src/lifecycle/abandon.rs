//! Abandon coordination for confirmation waits.

use std::sync::Arc;

use tokio::sync::watch;

/// Latched signal that tells confirmation waits to stop.
///
/// Once triggered it stays triggered: a submission that reaches Confirming
/// after the trigger abandons its wait immediately.
#[derive(Clone)]
pub struct AbandonSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl AbandonSignal {
    /// Create a new, untriggered abandon signal.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Resolve once the signal has been triggered, immediately if it already was.
    pub async fn triggered(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|triggered| *triggered).await;
    }

    /// Abandon every wait, current and future.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Number of confirmation waits currently listening.
    pub fn waiting(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for AbandonSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AbandonSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbandonSignal")
            .field("triggered", &self.is_triggered())
            .field("waiting", &self.waiting())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_reaches_waiters() {
        let signal = AbandonSignal::new();
        let first = tokio::spawn({
            let signal = signal.clone();
            async move { signal.triggered().await }
        });
        let second = tokio::spawn({
            let signal = signal.clone();
            async move { signal.triggered().await }
        });
        while signal.waiting() < 2 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        signal.trigger();
        first.await.unwrap();
        second.await.unwrap();
        assert_eq!(signal.waiting(), 0);
    }

    #[tokio::test]
    async fn test_trigger_is_latched() {
        let signal = AbandonSignal::default();
        assert!(!signal.is_triggered());
        signal.trigger();
        assert!(signal.is_triggered());

        // A wait that starts after the trigger still sees it.
        tokio::time::timeout(Duration::from_secs(1), signal.triggered())
            .await
            .unwrap();
    }
}
