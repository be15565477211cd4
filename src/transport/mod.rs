//! Receiver transport selection
//!
//! Exactly one transport writes the frame buffer at a time: the peer
//! data channel while it is open, the HTTP polling fallback otherwise.
//! The selector is the single switch both sides observe; the polling
//! loop suspends itself (and cancels any in-flight request) whenever
//! the peer transport takes over.

pub mod fallback;

pub use fallback::PollingFallback;

use log::info;
use tokio::sync::watch;

/// Which transport currently owns the frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveTransport {
    /// HTTP polling fallback (the default)
    Polling,
    /// Peer data channel
    Peer,
}

/// Two-state transport switch with observers.
pub struct TransportSelector {
    tx: watch::Sender<ActiveTransport>,
}

impl TransportSelector {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ActiveTransport::Polling);
        Self { tx }
    }

    /// Peer channel opened: suspend polling.
    pub fn activate_peer(&self) {
        self.switch(ActiveTransport::Peer);
    }

    /// Peer channel closed or failed: resume polling.
    pub fn activate_polling(&self) {
        self.switch(ActiveTransport::Polling);
    }

    fn switch(&self, next: ActiveTransport) {
        self.tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                info!("Active transport: {:?} -> {:?}", *current, next);
                *current = next;
                true
            }
        });
    }

    pub fn current(&self) -> ActiveTransport {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ActiveTransport> {
        self.tx.subscribe()
    }
}

impl Default for TransportSelector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_on_polling() {
        let selector = TransportSelector::new();
        assert_eq!(selector.current(), ActiveTransport::Polling);
    }

    #[tokio::test]
    async fn switch_notifies_subscribers() {
        let selector = TransportSelector::new();
        let mut rx = selector.subscribe();

        selector.activate_peer();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), ActiveTransport::Peer);

        selector.activate_polling();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), ActiveTransport::Polling);
    }

    #[tokio::test]
    async fn redundant_switch_does_not_notify() {
        let selector = TransportSelector::new();
        let mut rx = selector.subscribe();

        selector.activate_polling();
        assert!(!rx.has_changed().unwrap());
    }
}
