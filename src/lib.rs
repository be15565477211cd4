//! rastercast-core - raster streaming transport core
//!
//! Distributes a continuously updating binary raster from one sender
//! to one receiver over a WebRTC data channel, using a small signaling
//! relay for pairing and an HTTP polling fallback while no peer
//! channel is up.

pub mod args;
pub mod config;
pub mod frame;
pub mod peer;
pub mod protocol;
pub mod relay;
pub mod signaling;
pub mod source;
pub mod status;
pub mod transport;
pub mod web;

// Re-exports
pub use config::Config;
pub use frame::{FrameBuffer, RasterSpec};
pub use protocol::{chunk_frame, ChunkHeader, ChunkReassembler};
pub use signaling::{ClientMessage, RelayMessage, Role, SignalingClient};
pub use status::{ConnectionStatus, StatusTracker};
pub use transport::{ActiveTransport, PollingFallback, TransportSelector};
