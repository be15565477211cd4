//! Signaling relay server
//!
//! Introduces anonymous sender and receiver endpoints and forwards
//! their negotiation payloads without interpreting them. The relay
//! holds no frame data; once a peer channel is negotiated it plays no
//! further part in the transfer.

pub mod registry;
pub mod server;

pub use registry::{RegisterOutcome, Registry};
pub use server::run_relay;
