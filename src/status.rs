//! Connection status indicator
//!
//! Tracks the furthest state a receiving endpoint has reached so a UI
//! layer can show one coarse banner. Progress only moves forward
//! within one pairing attempt; `fail` can interrupt at any point and
//! `reset` rewinds for the next reconnect.

use log::info;
use tokio::sync::watch;

/// Coarse endpoint states, ordered by progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionStatus {
    /// Establishing the relay link
    Connecting,
    /// Registered, queued for a peer
    Waiting,
    /// Peer assigned, negotiating the data channel
    Paired,
    /// Frames arriving over the peer channel
    Receiving,
    /// Negotiation or channel failure; retry pending
    Failed,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Waiting => "waiting",
            ConnectionStatus::Paired => "paired",
            ConnectionStatus::Receiving => "receiving",
            ConnectionStatus::Failed => "failed",
        }
    }
}

/// Furthest-state tracker observable through a watch channel.
pub struct StatusTracker {
    tx: watch::Sender<ConnectionStatus>,
}

impl StatusTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ConnectionStatus::Connecting);
        Self { tx }
    }

    /// Move forward to `next`; backwards transitions are ignored so
    /// the indicator always shows the furthest state reached.
    pub fn advance(&self, next: ConnectionStatus) {
        self.tx.send_if_modified(|current| {
            if next > *current && *current != ConnectionStatus::Failed {
                info!("Status: {} -> {}", current.as_str(), next.as_str());
                *current = next;
                true
            } else {
                false
            }
        });
    }

    /// Record a failure regardless of progress.
    pub fn fail(&self) {
        self.tx.send_if_modified(|current| {
            if *current != ConnectionStatus::Failed {
                info!("Status: {} -> failed", current.as_str());
                *current = ConnectionStatus::Failed;
                true
            } else {
                false
            }
        });
    }

    /// Rewind to `Connecting` for a fresh pairing attempt.
    pub fn reset(&self) {
        self.tx.send_if_modified(|current| {
            if *current != ConnectionStatus::Connecting {
                info!("Status: {} -> connecting", current.as_str());
                *current = ConnectionStatus::Connecting;
                true
            } else {
                false
            }
        });
    }

    pub fn current(&self) -> ConnectionStatus {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.tx.subscribe()
    }
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_forward_only() {
        let tracker = StatusTracker::new();
        tracker.advance(ConnectionStatus::Paired);
        tracker.advance(ConnectionStatus::Waiting);
        assert_eq!(tracker.current(), ConnectionStatus::Paired);
    }

    #[test]
    fn failure_sticks_until_reset() {
        let tracker = StatusTracker::new();
        tracker.advance(ConnectionStatus::Receiving);
        tracker.fail();
        tracker.advance(ConnectionStatus::Receiving);
        assert_eq!(tracker.current(), ConnectionStatus::Failed);

        tracker.reset();
        assert_eq!(tracker.current(), ConnectionStatus::Connecting);
        tracker.advance(ConnectionStatus::Waiting);
        assert_eq!(tracker.current(), ConnectionStatus::Waiting);
    }
}
