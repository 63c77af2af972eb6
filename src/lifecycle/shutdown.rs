//! Shutdown coordination for the gateway.

use tokio::sync::broadcast;

/// One-shot shutdown signal fanned out to every long-running task.
///
/// The server's accept loop and any background tasks each hold a receiver;
/// [`Shutdown::trigger`] wakes them all, after which in-flight requests
/// drain and the server future resolves.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        // Capacity 1 is enough: the signal is sent once and never again.
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Receiver for one task. Subscribe before spawning the task so a
    /// trigger in between cannot be missed.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Signal every subscriber. Safe to call with none listening.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_the_trigger() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();

        shutdown.trigger();
        assert!(rx.recv().await.is_ok());
    }

    #[test]
    fn trigger_without_subscribers_is_harmless() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
    }
}
