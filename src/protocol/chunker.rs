//! Frame splitting (sender side)
//!
//! Splits a frame payload into header/chunk message pairs. The receiver
//! recognizes headers by their 12-byte length alone, so a data chunk of
//! exactly that length would be misread as a header. The split is
//! rebalanced so that case can never be produced: when the tail chunk
//! would land on the header length, bytes are moved from the chunk
//! before it.

use super::header::{ChunkHeader, HEADER_LEN};
use bytes::Bytes;

/// Split `frame` into `(header, chunk)` message pairs for transmission.
///
/// Chunks cover the payload contiguously in index order; `chunk_size`
/// bounds the chunk payload length. Returns an empty vec for an empty
/// frame (nothing to send).
pub fn chunk_frame(frame_number: u32, frame: &Bytes, chunk_size: usize) -> Vec<(ChunkHeader, Bytes)> {
    assert!(chunk_size > HEADER_LEN, "chunk_size must exceed the header length");

    if frame.is_empty() {
        return Vec::new();
    }

    let mut boundaries = Vec::new();
    let mut offset = 0usize;
    while offset < frame.len() {
        let end = (offset + chunk_size).min(frame.len());
        boundaries.push((offset, end));
        offset = end;
    }

    // A header-sized tail would be classified as a header on the wire.
    // Shift bytes out of the previous chunk to avoid the collision, or
    // split a lone header-sized frame in two. The shift must not leave
    // the previous chunk header-sized either (chunk_size of 13).
    if let Some(&(start, end)) = boundaries.last() {
        if end - start == HEADER_LEN {
            if boundaries.len() >= 2 {
                let last = boundaries.len() - 1;
                let prev_len = boundaries[last - 1].1 - boundaries[last - 1].0;
                let shift = if prev_len - 1 == HEADER_LEN { 2 } else { 1 };
                boundaries[last - 1].1 -= shift;
                boundaries[last].0 -= shift;
            } else {
                boundaries[0].1 -= 1;
                boundaries.push((end - 1, end));
            }
        }
    }

    let total_chunks = boundaries.len() as u32;
    boundaries
        .into_iter()
        .enumerate()
        .map(|(index, (start, end))| {
            let header = ChunkHeader::new(frame_number, index as u32, total_chunks);
            (header, frame.slice(start..end))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reassemble(pairs: &[(ChunkHeader, Bytes)]) -> Vec<u8> {
        let mut out = Vec::new();
        for (_, chunk) in pairs {
            out.extend_from_slice(chunk);
        }
        out
    }

    #[test]
    fn exact_multiple_split() {
        let frame = Bytes::from(vec![5u8; 300]);
        let pairs = chunk_frame(1, &frame, 100);
        assert_eq!(pairs.len(), 3);
        assert!(pairs.iter().all(|(h, _)| h.total_chunks == 3));
        assert_eq!(pairs[2].0.chunk_index, 2);
        assert_eq!(reassemble(&pairs), frame.as_ref());
    }

    #[test]
    fn uneven_tail_split() {
        let frame = Bytes::from((0..=254u8).collect::<Vec<_>>());
        let pairs = chunk_frame(3, &frame, 100);
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[2].1.len(), 55);
        assert_eq!(reassemble(&pairs), frame.as_ref());
    }

    #[test]
    fn header_sized_tail_is_rebalanced() {
        // 100 + 12 would leave a 12-byte tail chunk
        let frame = Bytes::from(vec![9u8; 112]);
        let pairs = chunk_frame(2, &frame, 100);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].1.len(), 99);
        assert_eq!(pairs[1].1.len(), 13);
        assert!(pairs.iter().all(|(_, c)| c.len() != HEADER_LEN));
        assert_eq!(reassemble(&pairs), frame.as_ref());
    }

    #[test]
    fn empty_frame_yields_nothing() {
        assert!(chunk_frame(0, &Bytes::new(), 64).is_empty());
    }

    #[test]
    fn rebalance_never_leaves_previous_chunk_header_sized() {
        // 76 * 13 + 12: a 13-byte chunk size puts the tail on the
        // header length, and a one-byte shift would do the same to the
        // chunk before it.
        let frame = Bytes::from(vec![1u8; 1000]);
        let pairs = chunk_frame(4, &frame, 13);
        assert!(pairs.iter().all(|(_, c)| c.len() != HEADER_LEN));
        assert_eq!(reassemble(&pairs), frame.as_ref());
    }

    #[test]
    fn lone_header_sized_frame_is_split() {
        let frame = Bytes::from(vec![4u8; HEADER_LEN]);
        let pairs = chunk_frame(1, &frame, 64);
        assert_eq!(pairs.len(), 2);
        assert!(pairs.iter().all(|(_, c)| c.len() != HEADER_LEN));
        assert_eq!(reassemble(&pairs), frame.as_ref());
    }

    #[test]
    fn indices_are_sequential() {
        let frame = Bytes::from(vec![1u8; 1000]);
        let pairs = chunk_frame(9, &frame, 64);
        for (i, (header, _)) in pairs.iter().enumerate() {
            assert_eq!(header.chunk_index as usize, i);
            assert_eq!(header.frame_number, 9);
        }
    }
}
