//! Relay WebSocket server
//!
//! One task per signaling connection. On accept, the endpoint gets a
//! fresh id; afterwards the relay only reacts to `register` and to the
//! three negotiation message types, which it re-envelopes and forwards
//! to their target. Negotiation payloads pass through untouched.

use crate::config::Config;
use crate::relay::registry::{RegisterOutcome, Registry};
use crate::signaling::{ClientMessage, RelayMessage};
use axum::{
    extract::ws::{Message, WebSocket},
    extract::{State, WebSocketUpgrade},
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Clone)]
struct RelayState {
    registry: Arc<Registry>,
    started: Instant,
}

/// Run the relay until the process is stopped.
pub async fn run_relay(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let state = RelayState {
        registry: Arc::new(Registry::new()),
        started: Instant::now(),
    };

    let app = Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    let addr = format!("{}:{}", config.relay.host, config.relay.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Signaling relay listening on ws://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<RelayState>) -> Response {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: RelayState) {
    let id = Uuid::new_v4().to_string();
    info!("Client connected: {}", id);

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<RelayMessage>();

    // Writer task: serialize queued relay messages onto the socket.
    let writer_id = id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match msg.to_json() {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to serialize message for {}: {}", writer_id, e);
                    continue;
                }
            };
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    state.registry.connect(&id, tx.clone());
    let _ = tx.send(RelayMessage::Id { id: id.clone() });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                handle_client_message(text.as_ref(), &id, &state.registry);
            }
            Ok(Message::Binary(_)) => {
                debug!("Ignoring binary message from {}", id);
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket error for {}: {}", id, e);
                break;
            }
        }
    }

    send_task.abort();
    state.registry.disconnect(&id);
    info!("Client disconnected: {}", id);
}

fn handle_client_message(text: &str, id: &str, registry: &Registry) {
    let message = match ClientMessage::from_json(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("Invalid message from {}: {}", id, e);
            return;
        }
    };

    match message {
        ClientMessage::Register { role } => match registry.register(id, role) {
            RegisterOutcome::Paired { peer_id } => {
                debug!("{} paired with {}", id, peer_id);
            }
            RegisterOutcome::Waiting => {
                debug!("{} queued as {}", id, role.as_str());
            }
            RegisterOutcome::AlreadyRegistered => {
                warn!("Ignoring re-registration from {}", id);
            }
        },
        ClientMessage::Offer { target, payload } => {
            relay_to(registry, id, &target, RelayMessage::Offer {
                from: id.to_string(),
                payload,
            });
        }
        ClientMessage::Answer { target, payload } => {
            relay_to(registry, id, &target, RelayMessage::Answer {
                from: id.to_string(),
                payload,
            });
        }
        ClientMessage::IceCandidate { target, payload } => {
            relay_to(registry, id, &target, RelayMessage::IceCandidate {
                from: id.to_string(),
                payload,
            });
        }
    }
}

fn relay_to(registry: &Registry, from: &str, target: &str, message: RelayMessage) {
    // Unknown or dead targets are dropped without signaling back.
    if !registry.forward(target, message) {
        debug!("Dropping message from {} for unknown target {}", from, target);
    }
}

/// Health check handler
async fn health_handler(State(state): State<RelayState>) -> String {
    let (waiting_senders, waiting_receivers) = state.registry.waiting_counts();
    format!(
        r#"{{
  "status": "healthy",
  "uptime_seconds": {:.2},
  "connections": {},
  "waiting_senders": {},
  "waiting_receivers": {},
  "version": "{}"
}}"#,
        state.started.elapsed().as_secs_f64(),
        state.registry.connection_count(),
        waiting_senders,
        waiting_receivers,
        env!("CARGO_PKG_VERSION")
    )
}
