//! Raster frame data structures
//!
//! Defines the fixed raster geometry and the single-slot frame buffer
//! shared between the transport layer and the rendering consumer.

use bytes::Bytes;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Fixed geometry of the transported raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterSpec {
    /// Raster width in pixels
    pub width: u32,

    /// Raster height in pixels
    pub height: u32,

    /// Bytes per pixel (3 for RGB)
    pub channels: u32,
}

impl RasterSpec {
    pub const fn new(width: u32, height: u32, channels: u32) -> Self {
        Self {
            width,
            height,
            channels,
        }
    }

    /// Expected byte length of one complete frame.
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }
}

impl Default for RasterSpec {
    fn default() -> Self {
        // 1440x720 RGB, 3,110,400 bytes per frame
        Self::new(1440, 720, 3)
    }
}

impl fmt::Display for RasterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.channels)
    }
}

/// Single-slot buffer holding the most recent complete frame.
///
/// Writers publish a fully assembled frame; the slot is swapped in one
/// step so a reader never observes a partially written frame. `Bytes`
/// is immutable once published, so readers hold a cheap reference to a
/// consistent snapshot even while newer frames arrive.
pub struct FrameBuffer {
    expected_len: usize,
    slot: RwLock<Option<Bytes>>,
    version: AtomicU64,
}

impl FrameBuffer {
    pub fn new(spec: RasterSpec) -> Self {
        Self {
            expected_len: spec.byte_len(),
            slot: RwLock::new(None),
            version: AtomicU64::new(0),
        }
    }

    /// Byte length a frame must have to be accepted.
    pub fn expected_len(&self) -> usize {
        self.expected_len
    }

    /// Publish a frame. Returns false (and leaves the current frame in
    /// place) if the payload length does not match the raster size.
    pub fn publish(&self, frame: Bytes) -> bool {
        if frame.len() != self.expected_len {
            return false;
        }
        *self.slot.write() = Some(frame);
        self.version.fetch_add(1, Ordering::Release);
        true
    }

    /// Snapshot of the most recent frame, if any has been published.
    pub fn latest(&self) -> Option<Bytes> {
        self.slot.read().clone()
    }

    /// Monotonic publish counter. Lets a consumer detect new frames
    /// without comparing payloads.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("expected_len", &self.expected_len)
            .field("version", &self.version())
            .finish()
    }
}

/// Frame delivery statistics for monitoring
#[derive(Debug, Default, Clone)]
pub struct FrameStats {
    /// Frames published to the buffer
    pub published: u64,

    /// Frames discarded before publication (incomplete or wrong size)
    pub discarded: u64,

    /// Total payload bytes published
    pub bytes_published: u64,
}

impl FrameStats {
    pub fn record_publish(&mut self, bytes: usize) {
        self.published += 1;
        self.bytes_published += bytes as u64;
    }

    pub fn record_discard(&mut self) {
        self.discarded += 1;
    }
}
