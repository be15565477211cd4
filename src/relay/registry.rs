//! Endpoint registry and pairing queues
//!
//! All relay state lives behind one lock: the clients map, the two FIFO
//! waiting queues, and the active pair links. Every mutation goes
//! through the methods here, which is what upholds the structural
//! invariants: an endpoint is queued at most once, only while
//! registered and unpaired, and is paired with at most one peer.

use crate::signaling::{RelayMessage, Role};
use log::{debug, info};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use tokio::sync::mpsc;

/// Outbound handle for one connected endpoint. Sends never block; a
/// closed channel marks the endpoint as dead for lazy cleanup.
pub type ClientSender = mpsc::UnboundedSender<RelayMessage>;

/// Result of a registration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// Matched with a waiting endpoint of the opposite role
    Paired { peer_id: String },
    /// Queued until an opposite-role endpoint registers
    Waiting,
    /// The endpoint already registered a role; ignored
    AlreadyRegistered,
}

#[derive(Default)]
struct Inner {
    clients: HashMap<String, ClientSender>,
    roles: HashMap<String, Role>,
    waiting_senders: VecDeque<String>,
    waiting_receivers: VecDeque<String>,
    pairs: HashMap<String, String>,
}

impl Inner {
    fn queue_mut(&mut self, role: Role) -> &mut VecDeque<String> {
        match role {
            Role::Sender => &mut self.waiting_senders,
            Role::Receiver => &mut self.waiting_receivers,
        }
    }
}

/// Owned relay state with exclusive-access methods.
#[derive(Default)]
pub struct Registry {
    inner: Mutex<Inner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a newly accepted connection under its endpoint id.
    pub fn connect(&self, id: &str, tx: ClientSender) {
        let mut inner = self.inner.lock();
        inner.clients.insert(id.to_string(), tx);
    }

    /// Register a role for `id` and attempt to pair it.
    ///
    /// Pops the opposite queue until a live endpoint is found; stale
    /// entries whose connections are gone are dropped on the spot. The
    /// pair link is formed and both endpoints are notified while the
    /// lock is held, so two concurrent registrations can never claim
    /// the same peer. An unmatched endpoint is queued and told to wait.
    pub fn register(&self, id: &str, role: Role) -> RegisterOutcome {
        let mut inner = self.inner.lock();

        if inner.roles.contains_key(id) {
            return RegisterOutcome::AlreadyRegistered;
        }

        while let Some(other) = inner.queue_mut(role.opposite()).pop_front() {
            let live = inner
                .clients
                .get(&other)
                .map(|tx| !tx.is_closed())
                .unwrap_or(false);
            if !live {
                debug!("Skipping stale queue entry {}", other);
                continue;
            }

            inner.roles.insert(id.to_string(), role);
            inner.pairs.insert(id.to_string(), other.clone());
            inner.pairs.insert(other.clone(), id.to_string());

            if let Some(tx) = inner.clients.get(&other) {
                let _ = tx.send(RelayMessage::Paired {
                    peer_id: id.to_string(),
                });
            }
            if let Some(tx) = inner.clients.get(id) {
                let _ = tx.send(RelayMessage::Paired {
                    peer_id: other.clone(),
                });
            }

            info!("Paired {} {} with {} {}", role.as_str(), id, role.opposite().as_str(), other);
            return RegisterOutcome::Paired { peer_id: other };
        }

        inner.roles.insert(id.to_string(), role);
        inner.queue_mut(role).push_back(id.to_string());
        if let Some(tx) = inner.clients.get(id) {
            let _ = tx.send(RelayMessage::waiting());
        }

        info!("{} {} waiting for a peer", role.as_str(), id);
        RegisterOutcome::Waiting
    }

    /// Deliver `message` to `target` if it is still connected. Unknown
    /// or disconnected targets are dropped silently; the return value
    /// exists only for logging at the call site.
    pub fn forward(&self, target: &str, message: RelayMessage) -> bool {
        let inner = self.inner.lock();
        match inner.clients.get(target) {
            Some(tx) => tx.send(message).is_ok(),
            None => false,
        }
    }

    /// Remove `id` from every structure. Idempotent; the paired peer,
    /// if any, is not notified and discovers the loss through its own
    /// channel.
    pub fn disconnect(&self, id: &str) {
        let mut inner = self.inner.lock();
        inner.clients.remove(id);
        inner.roles.remove(id);
        inner.waiting_senders.retain(|entry| entry != id);
        inner.waiting_receivers.retain(|entry| entry != id);
        if let Some(peer) = inner.pairs.remove(id) {
            inner.pairs.remove(&peer);
        }
    }

    /// Connected endpoint count, for the health endpoint.
    pub fn connection_count(&self) -> usize {
        self.inner.lock().clients.len()
    }

    /// Waiting queue lengths `(senders, receivers)`.
    pub fn waiting_counts(&self) -> (usize, usize) {
        let inner = self.inner.lock();
        (inner.waiting_senders.len(), inner.waiting_receivers.len())
    }

    /// The id `id` is currently paired with, if any.
    pub fn peer_of(&self, id: &str) -> Option<String> {
        self.inner.lock().pairs.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn client(registry: &Registry, id: &str) -> UnboundedReceiver<RelayMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        registry.connect(id, tx);
        rx
    }

    fn expect_paired(rx: &mut UnboundedReceiver<RelayMessage>) -> String {
        match rx.try_recv().expect("message expected") {
            RelayMessage::Paired { peer_id } => peer_id,
            other => panic!("expected Paired, got {:?}", other),
        }
    }

    #[test]
    fn opposite_roles_pair_in_either_order() {
        let registry = Registry::new();
        let mut s1 = client(&registry, "s1");
        let mut r1 = client(&registry, "r1");

        assert_eq!(registry.register("s1", Role::Sender), RegisterOutcome::Waiting);
        assert!(matches!(s1.try_recv(), Ok(RelayMessage::Waiting { .. })));

        assert_eq!(
            registry.register("r1", Role::Receiver),
            RegisterOutcome::Paired {
                peer_id: "s1".to_string()
            }
        );
        assert_eq!(expect_paired(&mut s1), "r1");
        assert_eq!(expect_paired(&mut r1), "s1");

        assert_eq!(registry.peer_of("s1").as_deref(), Some("r1"));
        assert_eq!(registry.peer_of("r1").as_deref(), Some("s1"));
    }

    #[test]
    fn pairing_is_fifo() {
        let registry = Registry::new();
        let _r1 = client(&registry, "r1");
        let _r2 = client(&registry, "r2");
        let _s1 = client(&registry, "s1");

        registry.register("r1", Role::Receiver);
        registry.register("r2", Role::Receiver);

        assert_eq!(
            registry.register("s1", Role::Sender),
            RegisterOutcome::Paired {
                peer_id: "r1".to_string()
            }
        );
    }

    #[test]
    fn stale_queue_head_is_skipped() {
        let registry = Registry::new();
        let r1 = client(&registry, "r1");
        let _r2 = client(&registry, "r2");
        let _s1 = client(&registry, "s1");

        registry.register("r1", Role::Receiver);
        registry.register("r2", Role::Receiver);

        // r1's channel closes but its queue entry lingers.
        drop(r1);

        assert_eq!(
            registry.register("s1", Role::Sender),
            RegisterOutcome::Paired {
                peer_id: "r2".to_string()
            }
        );
    }

    #[test]
    fn sole_stale_entry_leaves_registrant_waiting() {
        let registry = Registry::new();
        let r1 = client(&registry, "r1");
        let _s1 = client(&registry, "s1");

        registry.register("r1", Role::Receiver);
        drop(r1);

        assert_eq!(registry.register("s1", Role::Sender), RegisterOutcome::Waiting);
        let (senders, _) = registry.waiting_counts();
        assert_eq!(senders, 1);
    }

    #[test]
    fn reregistration_is_ignored() {
        let registry = Registry::new();
        let _s1 = client(&registry, "s1");

        registry.register("s1", Role::Sender);
        assert_eq!(
            registry.register("s1", Role::Receiver),
            RegisterOutcome::AlreadyRegistered
        );

        // Still only in the sender queue.
        assert_eq!(registry.waiting_counts(), (1, 0));
    }

    #[test]
    fn paired_endpoint_never_reenters_a_queue() {
        let registry = Registry::new();
        let _s1 = client(&registry, "s1");
        let _r1 = client(&registry, "r1");

        registry.register("s1", Role::Sender);
        registry.register("r1", Role::Receiver);

        assert_eq!(registry.waiting_counts(), (0, 0));
        assert_eq!(
            registry.register("s1", Role::Sender),
            RegisterOutcome::AlreadyRegistered
        );
        assert_eq!(registry.waiting_counts(), (0, 0));
    }

    #[test]
    fn disconnect_is_idempotent_and_silent_for_peer() {
        let registry = Registry::new();
        let mut s1 = client(&registry, "s1");
        let mut r1 = client(&registry, "r1");

        registry.register("s1", Role::Sender);
        registry.register("r1", Role::Receiver);
        assert!(matches!(s1.try_recv(), Ok(RelayMessage::Waiting { .. })));
        expect_paired(&mut s1);
        expect_paired(&mut r1);

        registry.disconnect("s1");
        registry.disconnect("s1");

        assert_eq!(registry.connection_count(), 1);
        assert_eq!(registry.peer_of("r1"), None);
        // The relay sends the surviving peer nothing.
        assert!(r1.try_recv().is_err());
    }

    #[test]
    fn forward_to_unknown_target_is_dropped() {
        let registry = Registry::new();
        assert!(!registry.forward(
            "ghost",
            RelayMessage::Offer {
                from: "s1".to_string(),
                payload: serde_json::json!({}),
            }
        ));
    }

    #[test]
    fn forward_delivers_verbatim_payload() {
        let registry = Registry::new();
        let mut r1 = client(&registry, "r1");
        let payload = serde_json::json!({"sdp": "v=0", "type": "offer"});

        assert!(registry.forward(
            "r1",
            RelayMessage::Offer {
                from: "s1".to_string(),
                payload: payload.clone(),
            }
        ));

        match r1.try_recv().unwrap() {
            RelayMessage::Offer { from, payload: p } => {
                assert_eq!(from, "s1");
                assert_eq!(p, payload);
            }
            other => panic!("unexpected message {:?}", other),
        }
    }
}
