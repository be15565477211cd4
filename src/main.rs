//! rastercast-core - Main entry point
//!
//! One binary, three roles: the signaling relay, the sending endpoint,
//! and the receiving endpoint.

use bytes::Bytes;
use clap::Parser;
use log::{error, info, warn};
use rastercast_core::args::{Args, Command};
use rastercast_core::config::Config;
use rastercast_core::frame::FrameBuffer;
use rastercast_core::signaling::{Role, SignalingClient};
use rastercast_core::status::StatusTracker;
use rastercast_core::transport::{PollingFallback, TransportSelector};
use rastercast_core::{peer, relay, source, web};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging with noise filtering for third-party WebRTC crates
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::new()
        .parse_filters(&std::env::var("RASTERCAST_LOG").unwrap_or_else(|_| log_level.to_string()))
        .filter_module("webrtc_ice", log::LevelFilter::Error)
        .filter_module("webrtc_dtls", log::LevelFilter::Error)
        .filter_module("webrtc_mdns", log::LevelFilter::Error)
        .init();

    info!("rastercast-core v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match args.load_config() {
        Ok(cfg) => {
            info!("Loaded configuration from {:?}", args.config);
            cfg
        }
        Err(e) => {
            warn!("Failed to load config: {}, using defaults", e);
            Config::default()
        }
    };

    apply_overrides(&mut config, &args.command);

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(e);
    }

    match args.command {
        Command::Relay { .. } => run_relay(config).await,
        Command::Send { .. } => run_send(config).await,
        Command::Recv { .. } => run_recv(config).await,
    }
}

fn apply_overrides(config: &mut Config, command: &Command) {
    match command {
        Command::Relay { port } => {
            if let Some(port) = port {
                config.relay.port = *port;
            }
        }
        Command::Send {
            input,
            relay_url,
            http_port,
        } => {
            if let Some(input) = input {
                config.sender.input = input.clone();
            }
            if let Some(url) = relay_url {
                config.signaling.url = url.clone();
            }
            if let Some(port) = http_port {
                config.http.port = *port;
            }
        }
        Command::Recv {
            relay_url,
            fallback_url,
        } => {
            if let Some(url) = relay_url {
                config.signaling.url = url.clone();
            }
            if let Some(url) = fallback_url {
                config.transport.fallback_url = url.clone();
            }
        }
    }
}

async fn run_relay(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    tokio::select! {
        result = relay::run_relay(&config) => {
            if let Err(e) = result {
                error!("Relay error: {}", e);
                return Err(e);
            }
        }
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    info!("rastercast-core stopped");
    Ok(())
}

async fn run_send(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let spec = config.raster.spec();
    info!("Streaming {} raster ({} bytes per frame)", spec, spec.byte_len());

    let buffer = Arc::new(FrameBuffer::new(spec));
    let (frames_tx, _) = broadcast::channel::<Bytes>(4);

    let source_handle = tokio::spawn(source::run_source(
        config.sender.input.clone(),
        Duration::from_millis(config.sender.poll_ms),
        buffer.clone(),
        frames_tx.clone(),
    ));

    let http_host = config.http.host.clone();
    let http_port = config.http.port;
    let http_buffer = buffer.clone();
    let mut http_handle = tokio::spawn(async move {
        if let Err(e) = web::run_frame_server(&http_host, http_port, http_buffer).await {
            error!("Frame server error: {}", e);
        }
    });

    let client = SignalingClient::new(
        config.signaling.url.clone(),
        Role::Sender,
        Duration::from_secs(config.signaling.reconnect_backoff_secs),
    );
    let (handle, events) = client.spawn();

    let driver_handle = tokio::spawn(peer::run_sender(
        config.ice.clone(),
        config.transport.chunk_size,
        config.transport.data_channel_label.clone(),
        frames_tx,
        handle,
        events,
    ));

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        _ = &mut http_handle => {
            warn!("Frame server stopped unexpectedly");
        }
    }

    source_handle.abort();
    driver_handle.abort();
    http_handle.abort();
    info!("rastercast-core stopped");
    Ok(())
}

async fn run_recv(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let spec = config.raster.spec();
    info!("Receiving {} raster ({} bytes per frame)", spec, spec.byte_len());

    let buffer = Arc::new(FrameBuffer::new(spec));
    let selector = Arc::new(TransportSelector::new());
    let status = Arc::new(StatusTracker::new());

    // Surface status transitions; a UI layer would watch the same channel.
    let mut status_rx = status.subscribe();
    tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let current = *status_rx.borrow();
            info!("Connection status: {}", current.as_str());
        }
    });

    let fallback = PollingFallback::new(
        config.transport.fallback_url.clone(),
        Duration::from_millis(config.transport.poll_interval_ms),
        buffer.clone(),
        selector.subscribe(),
    );
    let fallback_handle = tokio::spawn(fallback.run());

    let client = SignalingClient::new(
        config.signaling.url.clone(),
        Role::Receiver,
        Duration::from_secs(config.signaling.reconnect_backoff_secs),
    );
    let (handle, events) = client.spawn();

    let driver_handle = tokio::spawn(peer::run_receiver(
        config.ice.clone(),
        buffer.clone(),
        selector.clone(),
        status.clone(),
        handle,
        events,
    ));

    // Stand-in for the rendering consumer: note each new frame version.
    let consumer_buffer = buffer.clone();
    tokio::spawn(async move {
        let mut seen = 0u64;
        let mut ticker = tokio::time::interval(Duration::from_secs(5));
        loop {
            ticker.tick().await;
            let version = consumer_buffer.version();
            if version != seen {
                seen = version;
                info!("Frame buffer at version {}", version);
            }
        }
    });

    signal::ctrl_c().await?;
    info!("Shutdown signal received");

    driver_handle.abort();
    fallback_handle.abort();
    info!("rastercast-core stopped");
    Ok(())
}
