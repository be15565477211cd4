//! Signaling over the relay link
//!
//! JSON message types exchanged with the relay plus the client side of
//! the persistent WebSocket connection. Negotiation payloads (SDP and
//! ICE candidates) are opaque JSON values end to end; only the relay
//! envelope is interpreted here.

pub mod client;
pub mod messages;

pub use client::{SignalingClient, SignalingEvent, SignalingHandle};
pub use messages::{ClientMessage, RelayMessage, Role};

use std::error::Error;
use std::fmt;

/// Signaling-related errors
#[derive(Debug)]
pub enum SignalError {
    /// Message could not be parsed or serialized
    Parse(String),
    /// WebSocket transport failure
    Transport(String),
}

impl fmt::Display for SignalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalError::Parse(msg) => write!(f, "Parse error: {}", msg),
            SignalError::Transport(msg) => write!(f, "Transport error: {}", msg),
        }
    }
}

impl Error for SignalError {}
