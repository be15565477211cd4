//! Relay client connection
//!
//! Maintains the persistent WebSocket to the relay for one endpoint.
//! On every (re)connection the relay assigns a fresh id, the client
//! re-registers its role, and pairing starts over. Reconnects use a
//! fixed delay and never give up; a lost connection therefore costs at
//! most one backoff interval plus a new pairing round.

use crate::signaling::{ClientMessage, RelayMessage, Role};
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;

/// Relay-side events surfaced to the endpoint driver.
#[derive(Debug, Clone)]
pub enum SignalingEvent {
    /// Relay link established (id not yet assigned)
    Connected,
    /// Identity assigned by the relay
    Assigned { id: String },
    /// Queued, no opposite-role endpoint available yet
    Waiting,
    /// Matched with a peer
    Paired { peer_id: String },
    /// Forwarded connection offer
    Offer { from: String, payload: serde_json::Value },
    /// Forwarded answer
    Answer { from: String, payload: serde_json::Value },
    /// Forwarded ICE candidate
    IceCandidate { from: String, payload: serde_json::Value },
    /// Relay link lost; a reconnect is scheduled
    Disconnected,
}

enum Outbound {
    Message(ClientMessage),
    Reconnect,
}

/// Handle for sending through the relay link.
///
/// Messages queued while the link is down target an id from the old
/// pairing; the relay drops them silently once that id is gone, which
/// is the intended abandonment semantics.
#[derive(Clone)]
pub struct SignalingHandle {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl SignalingHandle {
    pub fn send(&self, message: ClientMessage) {
        let _ = self.tx.send(Outbound::Message(message));
    }

    /// Drop the current relay connection and re-enter pairing with a
    /// fresh id after the reconnect backoff.
    pub fn reconnect(&self) {
        let _ = self.tx.send(Outbound::Reconnect);
    }
}

/// Client side of the relay link.
pub struct SignalingClient {
    url: String,
    role: Role,
    backoff: Duration,
}

impl SignalingClient {
    pub fn new(url: String, role: Role, backoff: Duration) -> Self {
        Self { url, role, backoff }
    }

    /// Spawn the connection task. Returns the send handle and the
    /// stream of signaling events.
    pub fn spawn(self) -> (SignalingHandle, mpsc::UnboundedReceiver<SignalingEvent>) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        tokio::spawn(self.run(out_rx, event_tx));
        (SignalingHandle { tx: out_tx }, event_rx)
    }

    async fn run(
        self,
        mut outbound: mpsc::UnboundedReceiver<Outbound>,
        events: mpsc::UnboundedSender<SignalingEvent>,
    ) {
        loop {
            match connect_async(self.url.as_str()).await {
                Ok((stream, _)) => {
                    info!("Connected to signaling relay at {}", self.url);
                    let _ = events.send(SignalingEvent::Connected);
                    self.drive_connection(stream, &mut outbound, &events).await;
                    let _ = events.send(SignalingEvent::Disconnected);
                }
                Err(e) => {
                    warn!("Relay connection to {} failed: {}", self.url, e);
                }
            }

            if events.is_closed() {
                return;
            }
            info!("Reconnecting to relay in {:?}", self.backoff);
            tokio::time::sleep(self.backoff).await;
        }
    }

    async fn drive_connection<S>(
        &self,
        stream: tokio_tungstenite::WebSocketStream<S>,
        outbound: &mut mpsc::UnboundedReceiver<Outbound>,
        events: &mpsc::UnboundedSender<SignalingEvent>,
    ) where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
    {
        let (mut sink, mut inbound) = stream.split();

        loop {
            tokio::select! {
                message = inbound.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            if !self.handle_relay_message(&text, &mut sink, events).await {
                                return;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            info!("Relay closed the connection");
                            return;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!("Relay link error: {}", e);
                            return;
                        }
                    }
                }
                queued = outbound.recv() => {
                    match queued {
                        Some(Outbound::Message(message)) => {
                            let Ok(text) = message.to_json() else { continue };
                            if sink.send(Message::Text(text)).await.is_err() {
                                return;
                            }
                        }
                        Some(Outbound::Reconnect) => {
                            info!("Dropping relay connection for re-pairing");
                            let _ = sink.send(Message::Close(None)).await;
                            return;
                        }
                        None => return,
                    }
                }
            }
        }
    }

    /// Returns false when the connection should be abandoned.
    async fn handle_relay_message<S>(
        &self,
        text: &str,
        sink: &mut futures::stream::SplitSink<tokio_tungstenite::WebSocketStream<S>, Message>,
        events: &mpsc::UnboundedSender<SignalingEvent>,
    ) -> bool
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
    {
        let message = match RelayMessage::from_json(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Invalid relay message: {}", e);
                return true;
            }
        };

        let event = match message {
            RelayMessage::Id { id } => {
                info!("Assigned endpoint id {}", id);
                // Register immediately; the role is fixed for this
                // connection's lifetime.
                let register = ClientMessage::Register { role: self.role };
                match register.to_json() {
                    Ok(text) => {
                        if sink.send(Message::Text(text)).await.is_err() {
                            return false;
                        }
                    }
                    Err(e) => warn!("Failed to serialize register: {}", e),
                }
                SignalingEvent::Assigned { id }
            }
            RelayMessage::Waiting { message } => {
                debug!("Relay: {}", message);
                SignalingEvent::Waiting
            }
            RelayMessage::Paired { peer_id } => {
                info!("Paired with peer {}", peer_id);
                SignalingEvent::Paired { peer_id }
            }
            RelayMessage::Offer { from, payload } => SignalingEvent::Offer { from, payload },
            RelayMessage::Answer { from, payload } => SignalingEvent::Answer { from, payload },
            RelayMessage::IceCandidate { from, payload } => {
                SignalingEvent::IceCandidate { from, payload }
            }
        };

        events.send(event).is_ok()
    }
}
