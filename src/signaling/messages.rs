//! Relay wire messages
//!
//! One JSON object per WebSocket text message, tagged by `type`.
//! Negotiation payloads are carried verbatim: the relay rewrites only
//! the envelope (`target` on the way in, `from` on the way out) and
//! never inspects `payload`.

use super::SignalError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Endpoint role, fixed at registration for the connection's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Sender,
    Receiver,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Sender => "sender",
            Role::Receiver => "receiver",
        }
    }

    pub fn opposite(&self) -> Role {
        match self {
            Role::Sender => Role::Receiver,
            Role::Receiver => Role::Sender,
        }
    }
}

/// Messages sent from an endpoint to the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Declare this connection's role and enter pairing
    Register { role: Role },

    /// Connection offer for the paired peer
    Offer { target: String, payload: Value },

    /// Answer to a previously forwarded offer
    Answer { target: String, payload: Value },

    /// Trickled ICE candidate
    IceCandidate { target: String, payload: Value },
}

/// Messages sent from the relay to an endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RelayMessage {
    /// Identity announcement, first message on every connection
    Id { id: String },

    /// No opposite-role endpoint available yet
    Waiting { message: String },

    /// Paired with the endpoint identified by `peerId`
    Paired {
        #[serde(rename = "peerId")]
        peer_id: String,
    },

    /// Forwarded offer from `from`
    Offer { from: String, payload: Value },

    /// Forwarded answer from `from`
    Answer { from: String, payload: Value },

    /// Forwarded ICE candidate from `from`
    IceCandidate { from: String, payload: Value },
}

impl ClientMessage {
    pub fn from_json(json: &str) -> Result<Self, SignalError> {
        serde_json::from_str(json).map_err(|e| SignalError::Parse(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, SignalError> {
        serde_json::to_string(self).map_err(|e| SignalError::Parse(e.to_string()))
    }
}

impl RelayMessage {
    pub fn from_json(json: &str) -> Result<Self, SignalError> {
        serde_json::from_str(json).map_err(|e| SignalError::Parse(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, SignalError> {
        serde_json::to_string(self).map_err(|e| SignalError::Parse(e.to_string()))
    }

    pub fn waiting() -> Self {
        RelayMessage::Waiting {
            message: "Waiting for a peer".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn register_wire_format() {
        let msg = ClientMessage::Register { role: Role::Receiver };
        let json = msg.to_json().unwrap();
        assert_eq!(json, r#"{"type":"register","role":"receiver"}"#);
    }

    #[test]
    fn ice_candidate_tag_is_kebab_case() {
        let msg = ClientMessage::IceCandidate {
            target: "abc".to_string(),
            payload: json!({"candidate": "candidate:1"}),
        };
        let json = msg.to_json().unwrap();
        assert!(json.contains(r#""type":"ice-candidate""#));
    }

    #[test]
    fn paired_uses_peer_id_field() {
        let msg = RelayMessage::Paired {
            peer_id: "xyz".to_string(),
        };
        let json = msg.to_json().unwrap();
        assert!(json.contains(r#""peerId":"xyz""#));

        let parsed = RelayMessage::from_json(&json).unwrap();
        match parsed {
            RelayMessage::Paired { peer_id } => assert_eq!(peer_id, "xyz"),
            _ => panic!("expected Paired"),
        }
    }

    #[test]
    fn payload_survives_forwarding_untouched() {
        let payload = json!({"type": "offer", "sdp": "v=0\r\n..."});
        let inbound = ClientMessage::Offer {
            target: "peer-1".to_string(),
            payload: payload.clone(),
        };
        let parsed = ClientMessage::from_json(&inbound.to_json().unwrap()).unwrap();
        match parsed {
            ClientMessage::Offer { payload: p, .. } => assert_eq!(p, payload),
            _ => panic!("expected Offer"),
        }
    }

    #[test]
    fn role_opposite() {
        assert_eq!(Role::Sender.opposite(), Role::Receiver);
        assert_eq!(Role::Receiver.opposite(), Role::Sender);
    }
}
