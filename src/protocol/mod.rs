//! Binary frame transport protocol
//!
//! A frame is sent over the peer channel as alternating messages: a
//! 12-byte chunk header followed by the chunk payload it describes.
//! The receiver classifies a binary message as a header purely by its
//! length, so the chunker guarantees no data chunk is ever exactly
//! header-sized (see `chunker`).

pub mod chunker;
pub mod header;
pub mod reassembler;

pub use chunker::chunk_frame;
pub use header::{ChunkHeader, HEADER_LEN};
pub use reassembler::ChunkReassembler;

use std::error::Error;
use std::fmt;

/// Errors raised while decoding or reassembling chunked frames.
#[derive(Debug)]
pub enum ProtocolError {
    /// Header bytes were malformed
    BadHeader(String),
    /// Chunk arrived without a preceding header
    OrphanChunk,
    /// A chunk index required for reassembly was never received
    MissingChunk { frame_number: u32, chunk_index: u32 },
    /// Reassembled frame length does not match the raster size
    SizeMismatch { expected: usize, actual: usize },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::BadHeader(msg) => write!(f, "Bad chunk header: {}", msg),
            ProtocolError::OrphanChunk => write!(f, "Chunk received without a header"),
            ProtocolError::MissingChunk {
                frame_number,
                chunk_index,
            } => write!(
                f,
                "Frame {} is missing chunk {}",
                frame_number, chunk_index
            ),
            ProtocolError::SizeMismatch { expected, actual } => write!(
                f,
                "Frame size mismatch: expected {} bytes, got {}",
                expected, actual
            ),
        }
    }
}

impl Error for ProtocolError {}
