//! HTTP polling fallback
//!
//! Fetches the latest complete frame from the sender's `/frame`
//! endpoint on a fixed interval while the peer channel is inactive.
//! At most one request is in flight: a new tick aborts the previous
//! fetch before issuing its own, and suspending the fallback aborts
//! whatever is outstanding.

use crate::frame::FrameBuffer;
use crate::transport::ActiveTransport;
use log::{debug, info};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Polling client writing into the shared frame buffer.
pub struct PollingFallback {
    url: String,
    interval: Duration,
    buffer: Arc<FrameBuffer>,
    selector: watch::Receiver<ActiveTransport>,
}

impl PollingFallback {
    pub fn new(
        url: String,
        interval: Duration,
        buffer: Arc<FrameBuffer>,
        selector: watch::Receiver<ActiveTransport>,
    ) -> Self {
        Self {
            url,
            interval,
            buffer,
            selector,
        }
    }

    /// Poll until the selector channel closes (receiver shutdown).
    pub async fn run(mut self) {
        let client = reqwest::Client::new();
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut in_flight: Option<JoinHandle<()>> = None;

        info!(
            "Polling fallback ready: {} every {:?}",
            self.url, self.interval
        );

        loop {
            if *self.selector.borrow() == ActiveTransport::Peer {
                // Suspended: nothing may be outstanding while the peer
                // channel owns the buffer.
                if let Some(handle) = in_flight.take() {
                    handle.abort();
                }
                debug!("Polling suspended while peer channel is active");
                if self.selector.changed().await.is_err() {
                    break;
                }
                debug!("Polling resumed");
                ticker.reset();
                continue;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    // Supersede the previous poll; only one may be
                    // outstanding.
                    if let Some(handle) = in_flight.take() {
                        handle.abort();
                    }
                    in_flight = Some(tokio::spawn(poll_once(
                        client.clone(),
                        self.url.clone(),
                        self.buffer.clone(),
                    )));
                }
                changed = self.selector.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        if let Some(handle) = in_flight.take() {
            handle.abort();
        }
    }
}

/// One fetch attempt. Every failure mode is "no new data this tick":
/// the buffer keeps its last good frame and the next tick retries.
async fn poll_once(client: reqwest::Client, url: String, buffer: Arc<FrameBuffer>) {
    let request_url = format!("{}?cb={}", url, cache_buster());

    let response = match client.get(&request_url).send().await {
        Ok(response) => response,
        Err(e) => {
            debug!("Fallback poll failed: {}", e);
            return;
        }
    };

    if !response.status().is_success() {
        debug!("Fallback poll returned {}", response.status());
        return;
    }

    match response.bytes().await {
        Ok(body) => {
            let len = body.len();
            if !buffer.publish(body) {
                debug!(
                    "Ignoring fallback body of {} bytes (expected {})",
                    len,
                    buffer.expected_len()
                );
            }
        }
        Err(e) => debug!("Fallback body read failed: {}", e),
    }
}

fn cache_buster() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::RasterSpec;
    use crate::transport::TransportSelector;

    #[tokio::test]
    async fn run_exits_when_selector_is_dropped() {
        let buffer = Arc::new(FrameBuffer::new(RasterSpec::default()));
        let selector = TransportSelector::new();
        let fallback = PollingFallback::new(
            "http://127.0.0.1:1/frame".to_string(),
            Duration::from_millis(10),
            buffer,
            selector.subscribe(),
        );

        let handle = tokio::spawn(fallback.run());
        drop(selector);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("fallback loop should stop")
            .unwrap();
    }
}
