//! Chunk header codec
//!
//! Wire layout: three little-endian u32 fields,
//! `(frame_number, chunk_index, total_chunks)`, 12 bytes total.

use super::ProtocolError;

/// Encoded header length in bytes.
pub const HEADER_LEN: usize = 12;

/// Describes the chunk payload that follows it in the message stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    /// Logical frame this chunk belongs to
    pub frame_number: u32,

    /// Position of the chunk within the frame, 0-based
    pub chunk_index: u32,

    /// Number of chunks the frame was split into
    pub total_chunks: u32,
}

impl ChunkHeader {
    pub fn new(frame_number: u32, chunk_index: u32, total_chunks: u32) -> Self {
        Self {
            frame_number,
            chunk_index,
            total_chunks,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..4].copy_from_slice(&self.frame_number.to_le_bytes());
        buf[4..8].copy_from_slice(&self.chunk_index.to_le_bytes());
        buf[8..12].copy_from_slice(&self.total_chunks.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() != HEADER_LEN {
            return Err(ProtocolError::BadHeader(format!(
                "expected {} bytes, got {}",
                HEADER_LEN,
                buf.len()
            )));
        }

        let frame_number = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let chunk_index = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let total_chunks = u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]);

        if total_chunks == 0 {
            return Err(ProtocolError::BadHeader(
                "total_chunks must be non-zero".to_string(),
            ));
        }
        if chunk_index >= total_chunks {
            return Err(ProtocolError::BadHeader(format!(
                "chunk_index {} out of range for {} chunks",
                chunk_index, total_chunks
            )));
        }

        Ok(Self {
            frame_number,
            chunk_index,
            total_chunks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let header = ChunkHeader::new(7, 2, 5);
        let decoded = ChunkHeader::decode(&header.encode()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn encoding_is_little_endian() {
        let header = ChunkHeader::new(1, 2, 3);
        let buf = header.encode();
        assert_eq!(buf, [1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0]);
    }

    #[test]
    fn decode_rejects_wrong_length() {
        assert!(ChunkHeader::decode(&[0u8; 11]).is_err());
        assert!(ChunkHeader::decode(&[0u8; 13]).is_err());
    }

    #[test]
    fn decode_rejects_out_of_range_index() {
        let header = ChunkHeader::new(0, 3, 3);
        assert!(ChunkHeader::decode(&header.encode()).is_err());
    }

    #[test]
    fn decode_rejects_zero_total() {
        let buf = [0u8; HEADER_LEN];
        assert!(ChunkHeader::decode(&buf).is_err());
    }
}
