//! Peer data channel transport
//!
//! webrtc-rs glue for the direct sender/receiver channel. Negotiation
//! runs through the signaling relay; once the data channel is open the
//! relay is out of the path and frames flow peer to peer.

pub mod receiver;
pub mod sender;

pub use receiver::run_receiver;
pub use sender::run_sender;

use crate::config::IceConfig;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::RTCPeerConnection;

/// Peer transport errors
#[derive(Debug)]
pub enum PeerError {
    /// Peer connection creation failed
    ConnectionFailed(String),
    /// SDP processing failed
    SdpError(String),
    /// ICE candidate processing failed
    IceError(String),
    /// Data channel error
    DataChannelError(String),
}

impl fmt::Display for PeerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerError::ConnectionFailed(msg) => write!(f, "Connection failed: {}", msg),
            PeerError::SdpError(msg) => write!(f, "SDP error: {}", msg),
            PeerError::IceError(msg) => write!(f, "ICE error: {}", msg),
            PeerError::DataChannelError(msg) => write!(f, "DataChannel error: {}", msg),
        }
    }
}

impl Error for PeerError {}

/// Build a peer connection configured for data-only use.
pub(crate) async fn build_peer_connection(
    ice: &IceConfig,
) -> Result<Arc<RTCPeerConnection>, PeerError> {
    // A media engine is required even for data-only connections.
    let mut media_engine = MediaEngine::default();
    media_engine
        .register_default_codecs()
        .map_err(|e| PeerError::ConnectionFailed(format!("Failed to register codecs: {}", e)))?;

    let mut registry = Registry::new();
    registry = register_default_interceptors(registry, &mut media_engine)
        .map_err(|e| PeerError::ConnectionFailed(format!("Failed to register interceptors: {}", e)))?;

    let api = APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .build();

    let rtc_config = RTCConfiguration {
        ice_servers: ice_servers(ice),
        ..Default::default()
    };

    let peer_connection = api
        .new_peer_connection(rtc_config)
        .await
        .map_err(|e| PeerError::ConnectionFailed(format!("Failed to create peer connection: {}", e)))?;

    Ok(Arc::new(peer_connection))
}

/// ICE servers from configuration. A configured TURN server is listed
/// first so restrictive networks prefer it.
pub(crate) fn ice_servers(ice: &IceConfig) -> Vec<RTCIceServer> {
    let mut servers = Vec::new();

    if !ice.turn_url.is_empty() {
        servers.push(RTCIceServer {
            urls: vec![ice.turn_url.clone()],
            username: ice.turn_username.clone(),
            credential: ice.turn_password.clone(),
            ..Default::default()
        });
    }

    if !ice.stun_url.is_empty() {
        servers.push(RTCIceServer {
            urls: vec![ice.stun_url.clone()],
            ..Default::default()
        });
    }

    servers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_server_is_listed_first() {
        let ice = IceConfig {
            stun_url: "stun:stun.example.org:3478".to_string(),
            turn_url: "turn:turn.example.org:3478".to_string(),
            turn_username: "user".to_string(),
            turn_password: "pass".to_string(),
        };
        let servers = ice_servers(&ice);
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0].urls[0], "turn:turn.example.org:3478");
        assert_eq!(servers[0].username, "user");
        assert_eq!(servers[1].urls[0], "stun:stun.example.org:3478");
    }

    #[test]
    fn stun_only_by_default() {
        let servers = ice_servers(&IceConfig::default());
        assert_eq!(servers.len(), 1);
        assert!(servers[0].urls[0].starts_with("stun:"));
    }
}
