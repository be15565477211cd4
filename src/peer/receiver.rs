//! Receiver-side negotiation and frame intake
//!
//! The receiver is the answering side: it waits for an offer forwarded
//! through the relay, returns an answer, and accepts the data channel
//! the sender creates. Inbound channel messages run through a
//! per-connection reassembler; completed frames land in the shared
//! frame buffer. Channel loss flips the transport selector back to
//! polling and re-enters pairing over a fresh relay connection.

use crate::config::IceConfig;
use crate::frame::FrameBuffer;
use crate::peer::{build_peer_connection, PeerError};
use crate::protocol::ChunkReassembler;
use crate::signaling::{ClientMessage, SignalingEvent, SignalingHandle};
use crate::status::{ConnectionStatus, StatusTracker};
use crate::transport::TransportSelector;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

struct ReceiverSession {
    pc: Arc<RTCPeerConnection>,
    sender_id: String,
}

/// Drive the receiving endpoint until the event stream ends.
pub async fn run_receiver(
    ice: IceConfig,
    buffer: Arc<FrameBuffer>,
    selector: Arc<TransportSelector>,
    status: Arc<StatusTracker>,
    handle: SignalingHandle,
    mut events: mpsc::UnboundedReceiver<SignalingEvent>,
) {
    let mut session: Option<ReceiverSession> = None;

    while let Some(event) = events.recv().await {
        match event {
            SignalingEvent::Connected => {
                status.reset();
            }
            SignalingEvent::Assigned { id } => {
                debug!("Registered as receiver with id {}", id);
            }
            SignalingEvent::Waiting => {
                status.advance(ConnectionStatus::Waiting);
            }
            SignalingEvent::Paired { peer_id } => {
                status.advance(ConnectionStatus::Paired);
                info!("Awaiting offer from sender {}", peer_id);
            }
            SignalingEvent::Offer { from, payload } => {
                if let Some(old) = session.take() {
                    close_session(old);
                }
                match answer_offer(&ice, &from, payload, &buffer, &selector, &status, &handle)
                    .await
                {
                    Ok(pc) => {
                        session = Some(ReceiverSession {
                            pc,
                            sender_id: from,
                        });
                    }
                    Err(e) => {
                        warn!("Negotiation with {} failed: {}", from, e);
                        status.fail();
                        handle.reconnect();
                    }
                }
            }
            SignalingEvent::IceCandidate { from, payload } => {
                let Some(current) = session.as_ref() else {
                    debug!("Ignoring ICE candidate without a session");
                    continue;
                };
                if current.sender_id != from {
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
            SignalingEvent::Answer { from, .. } => {
                debug!("Ignoring unexpected answer from {}", from);
            }
            SignalingEvent::Disconnected => {
                status.fail();
                if let Some(old) = session.take() {
                    close_session(old);
                }
            }
        }
    }
}

/// Accept a forwarded offer and send the answer back through the relay.
async fn answer_offer(
    ice: &IceConfig,
    sender_id: &str,
    payload: serde_json::Value,
    buffer: &Arc<FrameBuffer>,
    selector: &Arc<TransportSelector>,
    status: &Arc<StatusTracker>,
    handle: &SignalingHandle,
) -> Result<Arc<RTCPeerConnection>, PeerError> {
    let offer: RTCSessionDescription = serde_json::from_value(payload)
        .map_err(|e| PeerError::SdpError(format!("Invalid SDP offer: {}", e)))?;

    let pc = build_peer_connection(ice).await?;

    setup_state_handler(&pc, selector, status, handle);
    setup_data_channel_handler(&pc, buffer, selector, status);

    // Trickle our candidates back to the offering sender.
    let ice_handle = handle.clone();
    let ice_target = sender_id.to_string();
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

    pc.set_remote_description(offer)
        .await
        .map_err(|e| PeerError::SdpError(format!("Failed to set remote description: {}", e)))?;

    let answer = pc
        .create_answer(None)
        .await
        .map_err(|e| PeerError::SdpError(format!("Failed to create answer: {}", e)))?;

    pc.set_local_description(answer)
        .await
        .map_err(|e| PeerError::SdpError(format!("Failed to set local description: {}", e)))?;

    let local = pc
        .local_description()
        .await
        .ok_or_else(|| PeerError::SdpError("Local description missing".to_string()))?;
    let payload = serde_json::to_value(&local)
        .map_err(|e| PeerError::SdpError(format!("Failed to encode answer: {}", e)))?;

    handle.send(ClientMessage::Answer {
        target: sender_id.to_string(),
        payload,
    });
    info!("Answer sent to sender {}", sender_id);

    Ok(pc)
}

fn setup_state_handler(
    pc: &Arc<RTCPeerConnection>,
    selector: &Arc<TransportSelector>,
    status: &Arc<StatusTracker>,
    handle: &SignalingHandle,
) {
    let selector = selector.clone();
    let status = status.clone();
    let handle = handle.clone();
    pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
        let selector = selector.clone();
        let status = status.clone();
        let handle = handle.clone();
        Box::pin(async move {
            info!("Peer connection state: {}", state);
            match state {
                RTCPeerConnectionState::Failed | RTCPeerConnectionState::Disconnected => {
                    selector.activate_polling();
                    status.fail();
                    // The pairing is dead; only a fresh registration
                    // can produce a new one.
                    handle.reconnect();
                }
                RTCPeerConnectionState::Closed => {
                    selector.activate_polling();
                }
                _ => {}
            }
        })
    }));
}

fn setup_data_channel_handler(
    pc: &Arc<RTCPeerConnection>,
    buffer: &Arc<FrameBuffer>,
    selector: &Arc<TransportSelector>,
    status: &Arc<StatusTracker>,
) {
    let buffer = buffer.clone();
    let selector = selector.clone();
    let status = status.clone();
    pc.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
        let buffer = buffer.clone();
        let selector = selector.clone();
        let status = status.clone();
        Box::pin(async move {
            info!("Data channel announced: {}", dc.label());
            let reassembler = Arc::new(Mutex::new(ChunkReassembler::new(buffer.expected_len())));

            {
                let selector = selector.clone();
                let status = status.clone();
                dc.on_open(Box::new(move || {
                    let selector = selector.clone();
                    let status = status.clone();
                    Box::pin(async move {
                        info!("Data channel open, receiving frames");
                        selector.activate_peer();
                        status.advance(ConnectionStatus::Receiving);
                    })
                }));
            }

            {
                let selector = selector.clone();
                dc.on_close(Box::new(move || {
                    let selector = selector.clone();
                    Box::pin(async move {
                        info!("Data channel closed");
                        selector.activate_polling();
                    })
                }));
            }

            dc.on_message(Box::new(move |msg: DataChannelMessage| {
                let buffer = buffer.clone();
                let reassembler = reassembler.clone();
                Box::pin(async move {
                    if msg.is_string {
                        debug!("Ignoring text message on frame channel");
                        return;
                    }
                    let (frame, published) = {
                        let mut reassembler = reassembler.lock();
                        let frame = reassembler.push(msg.data);
                        (frame, reassembler.stats().published)
                    };
                    if let Some(frame) = frame {
                        let len = frame.len();
                        if buffer.publish(frame) {
                            if published % 100 == 1 {
                                info!("Published frame #{} ({} bytes)", published, len);
                            }
                        }
                    }
                })
            }));
        })
    }));
}

fn close_session(session: ReceiverSession) {
    debug!("Closing session with sender {}", session.sender_id);
    tokio::spawn(async move {
        let _ = session.pc.close().await;
    });
}
