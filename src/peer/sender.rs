//! Sender-side negotiation and frame push
//!
//! The sender is the offering side: on pairing it creates the peer
//! connection and the frame data channel, sends the offer through the
//! relay, and once the channel opens streams every new frame as
//! alternating header/chunk messages. A dead channel or lost pairing
//! drops the session and re-enters pairing with a fresh relay
//! connection.

use crate::config::IceConfig;
use crate::peer::{build_peer_connection, PeerError};
use crate::protocol::chunk_frame;
use crate::signaling::{ClientMessage, SignalingEvent, SignalingHandle};
use bytes::Bytes;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

struct SenderSession {
    pc: Arc<RTCPeerConnection>,
    receiver_id: String,
}

/// Drive the sending endpoint until the event stream ends.
pub async fn run_sender(
    ice: IceConfig,
    chunk_size: usize,
    channel_label: String,
    frames: broadcast::Sender<Bytes>,
    handle: SignalingHandle,
    mut events: mpsc::UnboundedReceiver<SignalingEvent>,
) {
    let mut session: Option<SenderSession> = None;

    while let Some(event) = events.recv().await {
        match event {
            SignalingEvent::Connected => {
                debug!("Relay link up");
            }
            SignalingEvent::Assigned { id } => {
                debug!("Registered as sender with id {}", id);
            }
            SignalingEvent::Waiting => {
                info!("Waiting for a receiver");
            }
            SignalingEvent::Paired { peer_id } => {
                if let Some(old) = session.take() {
                    close_session(old);
                }
                match offer_to(&ice, chunk_size, &channel_label, &peer_id, &frames, &handle)
                    .await
                {
                    Ok(pc) => {
                        session = Some(SenderSession {
                            pc,
                            receiver_id: peer_id,
                        });
                    }
                    Err(e) => {
                        warn!("Negotiation with {} failed: {}", peer_id, e);
                        handle.reconnect();
                    }
                }
            }
            SignalingEvent::Answer { from, payload } => {
                let Some(current) = session.as_ref() else {
                    debug!("Ignoring answer without a session");
                    continue;
                };
                if current.receiver_id != from {
                    debug!("Ignoring answer from stale peer {}", from);
                    continue;
                }
                match serde_json::from_value::<RTCSessionDescription>(payload) {
                    Ok(answer) => {
                        if let Err(e) = current.pc.set_remote_description(answer).await {
                            warn!("Failed to apply answer from {}: {}", from, e);
                            handle.reconnect();
                        } else {
                            info!("Answer accepted from receiver {}", from);
                        }
                    }
                    Err(e) => warn!("Malformed answer from {}: {}", from, e),
                }
            }
            SignalingEvent::IceCandidate { from, payload } => {
                let Some(current) = session.as_ref() else {
                    debug!("Ignoring ICE candidate without a session");
                    continue;
                };
                if current.receiver_id != from {
                    debug!("Ignoring ICE candidate from stale peer {}", from);
                    continue;
                }
                match serde_json::from_value::<RTCIceCandidateInit>(payload) {
                    Ok(init) => {
                        if let Err(e) = current.pc.add_ice_candidate(init).await {
                            warn!("Failed to add ICE candidate: {}", e);
                        }
                    }
                    Err(e) => warn!("Malformed ICE candidate from {}: {}", from, e),
                }
            }
            SignalingEvent::Offer { from, .. } => {
                debug!("Ignoring unexpected offer from {}", from);
            }
            SignalingEvent::Disconnected => {
                if let Some(old) = session.take() {
                    close_session(old);
                }
            }
        }
    }
}

/// Create the peer connection and data channel for `receiver_id` and
/// send the offer through the relay.
async fn offer_to(
    ice: &IceConfig,
    chunk_size: usize,
    channel_label: &str,
    receiver_id: &str,
    frames: &broadcast::Sender<Bytes>,
    handle: &SignalingHandle,
) -> Result<Arc<RTCPeerConnection>, PeerError> {
    let pc = build_peer_connection(ice).await?;

    {
        let handle = handle.clone();
        pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            let handle = handle.clone();
            Box::pin(async move {
                info!("Peer connection state: {}", state);
                if matches!(
                    state,
                    RTCPeerConnectionState::Failed | RTCPeerConnectionState::Disconnected
                ) {
                    // The receiver is gone; re-enter pairing.
                    handle.reconnect();
                }
            })
        }));
    }

    let dc = pc
        .create_data_channel(channel_label, None)
        .await
        .map_err(|e| PeerError::DataChannelError(format!("Failed to create channel: {}", e)))?;

    {
        let dc_open = dc.clone();
        let frames = frames.clone();
        dc.on_open(Box::new(move || {
            let dc = dc_open.clone();
            let frames_rx = frames.subscribe();
            Box::pin(async move {
                info!("Data channel open, streaming frames");
                tokio::spawn(pump_frames(dc, frames_rx, chunk_size));
            })
        }));
    }

    // Trickle our candidates to the answering receiver.
    let ice_handle = handle.clone();
    let ice_target = receiver_id.to_string();
    pc.on_ice_candidate(Box::new(move |candidate| {
        let handle = ice_handle.clone();
        let target = ice_target.clone();
        Box::pin(async move {
            let Some(candidate) = candidate else { return };
            let init = match candidate.to_json() {
                Ok(init) => init,
                Err(e) => {
                    warn!("Failed to serialize ICE candidate: {}", e);
                    return;
                }
            };
            match serde_json::to_value(&init) {
                Ok(payload) => handle.send(ClientMessage::IceCandidate { target, payload }),
                Err(e) => warn!("Failed to encode ICE candidate: {}", e),
            }
        })
    }));

    let offer = pc
        .create_offer(None)
        .await
        .map_err(|e| PeerError::SdpError(format!("Failed to create offer: {}", e)))?;

    pc.set_local_description(offer)
        .await
        .map_err(|e| PeerError::SdpError(format!("Failed to set local description: {}", e)))?;

    let local = pc
        .local_description()
        .await
        .ok_or_else(|| PeerError::SdpError("Local description missing".to_string()))?;
    let payload = serde_json::to_value(&local)
        .map_err(|e| PeerError::SdpError(format!("Failed to encode offer: {}", e)))?;

    handle.send(ClientMessage::Offer {
        target: receiver_id.to_string(),
        payload,
    });
    info!("Offer sent to receiver {}", receiver_id);

    Ok(pc)
}

/// Push frames onto the open channel until it dies or the source ends.
async fn pump_frames(
    dc: Arc<RTCDataChannel>,
    mut frames: broadcast::Receiver<Bytes>,
    chunk_size: usize,
) {
    let mut frame_number: u32 = 0;

    loop {
        match frames.recv().await {
            Ok(frame) => {
                frame_number = frame_number.wrapping_add(1);
                if let Err(e) = send_frame(&dc, frame_number, &frame, chunk_size).await {
                    warn!("Stopping frame stream at #{}: {}", frame_number, e);
                    return;
                }
                if frame_number % 100 == 1 {
                    info!("Sent frame #{} ({} bytes)", frame_number, frame.len());
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                // Only the newest frame matters; skipping is harmless.
                debug!("Frame stream lagged, skipped {} frames", skipped);
            }
            Err(RecvError::Closed) => {
                info!("Frame source closed, stopping stream");
                return;
            }
        }
    }
}

async fn send_frame(
    dc: &Arc<RTCDataChannel>,
    frame_number: u32,
    frame: &Bytes,
    chunk_size: usize,
) -> Result<(), webrtc::Error> {
    for (header, chunk) in chunk_frame(frame_number, frame, chunk_size) {
        dc.send(&Bytes::copy_from_slice(&header.encode())).await?;
        dc.send(&chunk).await?;
    }
    Ok(())
}

fn close_session(session: SenderSession) {
    debug!("Closing session with receiver {}", session.receiver_id);
    tokio::spawn(async move {
        let _ = session.pc.close().await;
    });
}
