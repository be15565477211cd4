//! Chunk reassembly (receiver side)
//!
//! Consumes the alternating header/chunk message stream of one peer
//! channel and yields complete frames. State is per connection and the
//! inbound stream is processed strictly in arrival order, so no
//! internal locking is needed.
//!
//! A message is treated as a header iff it is exactly 12 bytes long;
//! the sender-side chunker guarantees no data chunk ever has that
//! length, which keeps the classification unambiguous.

use super::header::{ChunkHeader, HEADER_LEN};
use super::ProtocolError;
use crate::frame::FrameStats;
use bytes::Bytes;
use log::{debug, warn};
use std::collections::HashMap;

struct FrameAssembly {
    frame_number: u32,
    total_chunks: u32,
    chunks: HashMap<u32, Bytes>,
}

impl FrameAssembly {
    fn new(header: &ChunkHeader) -> Self {
        Self {
            frame_number: header.frame_number,
            total_chunks: header.total_chunks,
            chunks: HashMap::new(),
        }
    }
}

/// Reassembles chunked frames from one inbound binary message stream.
///
/// State machine: idle until a header arrives, then collects chunks for
/// that frame number until all are present. A header for a different
/// frame number pre-empts the frame in progress: the stale frame gets
/// one final reassembly attempt and is discarded if incomplete, so a
/// stalled frame never blocks newer ones.
pub struct ChunkReassembler {
    expected_len: usize,
    current: Option<FrameAssembly>,
    pending_index: Option<u32>,
    stats: FrameStats,
}

impl ChunkReassembler {
    /// `expected_len` is the exact byte length a frame must have to be
    /// accepted (the raster size).
    pub fn new(expected_len: usize) -> Self {
        Self {
            expected_len,
            current: None,
            pending_index: None,
            stats: FrameStats::default(),
        }
    }

    /// Feed one inbound binary message. Returns a complete, validated
    /// frame when this message finishes one.
    pub fn push(&mut self, message: Bytes) -> Option<Bytes> {
        if message.len() == HEADER_LEN {
            self.on_header(&message)
        } else {
            self.on_chunk(message)
        }
    }

    /// Delivery statistics accumulated since construction.
    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    fn on_header(&mut self, message: &Bytes) -> Option<Bytes> {
        let header = match ChunkHeader::decode(message) {
            Ok(header) => header,
            Err(e) => {
                warn!("Dropping malformed chunk header: {}", e);
                self.pending_index = None;
                return None;
            }
        };

        let mut completed = None;

        let start_new = match self.current.as_ref() {
            Some(assembly) if assembly.frame_number == header.frame_number => false,
            Some(assembly) => {
                // New frame pre-empts the one in progress; give the
                // stale frame a final chance before discarding it.
                if !assembly.chunks.is_empty() {
                    completed = self.finalize();
                }
                true
            }
            None => true,
        };

        if start_new {
            self.current = Some(FrameAssembly::new(&header));
            debug!(
                "Starting frame {} (expecting {} chunks)",
                header.frame_number, header.total_chunks
            );
        }

        self.pending_index = Some(header.chunk_index);
        completed
    }

    fn on_chunk(&mut self, chunk: Bytes) -> Option<Bytes> {
        let Some(index) = self.pending_index.take() else {
            warn!(
                "Dropping {}-byte chunk: {}",
                chunk.len(),
                ProtocolError::OrphanChunk
            );
            return None;
        };

        let Some(assembly) = self.current.as_mut() else {
            warn!("Dropping chunk {}: no frame in progress", index);
            return None;
        };

        if assembly.chunks.insert(index, chunk).is_some() {
            debug!(
                "Duplicate chunk {} for frame {}, keeping the newest",
                index, assembly.frame_number
            );
        }

        if assembly.chunks.len() as u32 == assembly.total_chunks {
            self.finalize()
        } else {
            None
        }
    }

    /// Attempt to reassemble the frame in progress. Clears the in-flight
    /// state either way; an incomplete or wrong-sized frame is discarded
    /// with a warning and never published.
    fn finalize(&mut self) -> Option<Bytes> {
        let assembly = self.current.take()?;
        self.pending_index = None;

        let frame_number = assembly.frame_number;
        let total_chunks = assembly.total_chunks;
        match assemble(assembly, self.expected_len) {
            Ok(frame) => {
                debug!(
                    "Frame {} complete: {} bytes from {} chunks",
                    frame_number,
                    frame.len(),
                    total_chunks
                );
                self.stats.record_publish(frame.len());
                Some(frame)
            }
            Err(e) => {
                warn!("Discarding frame {}: {}", frame_number, e);
                self.stats.record_discard();
                None
            }
        }
    }
}

/// Concatenate the chunks in index order. Gaps are never zero-filled;
/// any missing index fails the whole frame.
fn assemble(assembly: FrameAssembly, expected_len: usize) -> Result<Bytes, ProtocolError> {
    let mut payload = Vec::with_capacity(expected_len);
    for index in 0..assembly.total_chunks {
        match assembly.chunks.get(&index) {
            Some(chunk) => payload.extend_from_slice(chunk),
            None => {
                return Err(ProtocolError::MissingChunk {
                    frame_number: assembly.frame_number,
                    chunk_index: index,
                })
            }
        }
    }

    if payload.len() != expected_len {
        return Err(ProtocolError::SizeMismatch {
            expected: expected_len,
            actual: payload.len(),
        });
    }

    Ok(Bytes::from(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::chunker::chunk_frame;

    fn feed(
        reassembler: &mut ChunkReassembler,
        pairs: &[(ChunkHeader, Bytes)],
    ) -> Vec<Bytes> {
        let mut frames = Vec::new();
        for (header, chunk) in pairs {
            if let Some(frame) = reassembler.push(Bytes::copy_from_slice(&header.encode())) {
                frames.push(frame);
            }
            if let Some(frame) = reassembler.push(chunk.clone()) {
                frames.push(frame);
            }
        }
        frames
    }

    #[test]
    fn in_order_round_trip() {
        let payload = Bytes::from((0..255u8).cycle().take(300).collect::<Vec<_>>());
        let pairs = chunk_frame(7, &payload, 100);

        let mut reassembler = ChunkReassembler::new(300);
        let frames = feed(&mut reassembler, &pairs);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0], payload);
        assert_eq!(reassembler.stats().published, 1);
    }

    #[test]
    fn out_of_order_chunks_round_trip() {
        let payload = Bytes::from(vec![42u8; 300]);
        let mut pairs = chunk_frame(1, &payload, 100);
        pairs.swap(0, 2);

        let mut reassembler = ChunkReassembler::new(300);
        let frames = feed(&mut reassembler, &pairs);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0], payload);
    }

    #[test]
    fn missing_chunk_discards_frame() {
        let payload = Bytes::from(vec![1u8; 300]);
        let mut pairs = chunk_frame(1, &payload, 100);
        pairs.remove(1);

        let mut reassembler = ChunkReassembler::new(300);
        let mut frames = feed(&mut reassembler, &pairs);

        // Next frame's header pre-empts and discards the stale frame.
        let next = chunk_frame(2, &payload, 100);
        frames.extend(feed(&mut reassembler, &next));

        assert_eq!(frames.len(), 1);
        assert_eq!(reassembler.stats().discarded, 1);
        assert_eq!(reassembler.stats().published, 1);
    }

    #[test]
    fn size_mismatch_discards_frame() {
        let payload = Bytes::from(vec![1u8; 300]);
        let pairs = chunk_frame(1, &payload, 100);

        let mut reassembler = ChunkReassembler::new(3_110_400);
        let frames = feed(&mut reassembler, &pairs);

        assert!(frames.is_empty());
        assert_eq!(reassembler.stats().discarded, 1);
    }

    #[test]
    fn chunk_without_header_is_dropped() {
        let mut reassembler = ChunkReassembler::new(300);
        assert!(reassembler.push(Bytes::from(vec![0u8; 100])).is_none());
        assert_eq!(reassembler.stats().published, 0);
        assert_eq!(reassembler.stats().discarded, 0);
    }

    #[test]
    fn preempting_header_resets_state() {
        let first = Bytes::from(vec![1u8; 300]);
        let second = Bytes::from(vec![2u8; 300]);

        let mut reassembler = ChunkReassembler::new(300);

        // Only the first chunk of frame 1 arrives.
        let pairs = chunk_frame(1, &first, 100);
        let (header, chunk) = &pairs[0];
        assert!(reassembler
            .push(Bytes::copy_from_slice(&header.encode()))
            .is_none());
        assert!(reassembler.push(chunk.clone()).is_none());

        // Frame 2 arrives complete and publishes cleanly.
        let frames = feed(&mut reassembler, &chunk_frame(2, &second, 100));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0], second);
        assert_eq!(reassembler.stats().discarded, 1);
    }

    #[test]
    fn arbitrary_partition_round_trip() {
        let payload = Bytes::from((0..=255u8).cycle().take(1000).collect::<Vec<_>>());
        for chunk_size in [13, 64, 250, 999, 2000] {
            let pairs = chunk_frame(5, &payload, chunk_size);
            let mut reassembler = ChunkReassembler::new(1000);
            let frames = feed(&mut reassembler, &pairs);
            assert_eq!(frames.len(), 1, "chunk_size {}", chunk_size);
            assert_eq!(frames[0], payload);
        }
    }
}
