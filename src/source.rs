//! Raster frame source
//!
//! Re-reads the raster file the simulation writes and emits a frame
//! whenever its content changes. The producer itself is an external
//! collaborator; this side only watches its output file. Change
//! detection is by content hash so republishing an identical file
//! costs nothing downstream.

use crate::frame::FrameBuffer;
use bytes::Bytes;
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};
use xxhash_rust::xxh64::xxh64;

/// Watch `path` and publish each new frame to the local buffer (for
/// the HTTP fallback endpoint) and the broadcast channel (for the peer
/// transport).
pub async fn run_source(
    path: PathBuf,
    interval: Duration,
    buffer: Arc<FrameBuffer>,
    frames: broadcast::Sender<Bytes>,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_hash: Option<u64> = None;
    let mut announced = false;

    info!("Watching raster source {:?} every {:?}", path, interval);

    loop {
        ticker.tick().await;

        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) => {
                debug!("Raster source read failed: {}", e);
                continue;
            }
        };

        if data.len() != buffer.expected_len() {
            warn!(
                "Raster source is {} bytes, expected {}; skipping",
                data.len(),
                buffer.expected_len()
            );
            continue;
        }

        let hash = xxh64(&data, 0);
        if last_hash == Some(hash) {
            continue;
        }
        last_hash = Some(hash);

        let frame = Bytes::from(data);
        buffer.publish(frame.clone());
        let subscribers = frames.send(frame).unwrap_or(0);

        if !announced {
            announced = true;
            info!(
                "First frame loaded ({} bytes, {} subscriber(s))",
                buffer.expected_len(),
                subscribers
            );
        } else {
            debug!("New frame ({} subscriber(s))", subscribers);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::RasterSpec;

    #[tokio::test]
    async fn unchanged_file_is_published_once() {
        let dir = std::env::temp_dir().join("rastercast-source-test");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("frame.bin");
        let spec = RasterSpec::new(4, 2, 3);
        tokio::fs::write(&path, vec![7u8; spec.byte_len()])
            .await
            .unwrap();

        let buffer = Arc::new(FrameBuffer::new(spec));
        let (tx, mut rx) = broadcast::channel(4);
        let handle = tokio::spawn(run_source(
            path.clone(),
            Duration::from_millis(5),
            buffer.clone(),
            tx,
        ));

        let first = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("first frame")
            .unwrap();
        assert_eq!(first.len(), spec.byte_len());

        // Several more ticks pass without the file changing.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(buffer.version(), 1);

        // A content change is picked up.
        tokio::fs::write(&path, vec![9u8; spec.byte_len()])
            .await
            .unwrap();
        let second = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("second frame")
            .unwrap();
        assert_eq!(second.as_ref(), &vec![9u8; spec.byte_len()][..]);

        handle.abort();
        let _ = tokio::fs::remove_file(&path).await;
    }
}
