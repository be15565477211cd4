//! Frame HTTP endpoint
//!
//! Serves the sender's latest complete frame for the polling fallback.
//! `GET /frame` returns the raw raster bytes; pollers append a
//! cache-busting query parameter which is simply ignored here. CORS is
//! wide open because the canonical consumer is a browser page on
//! another origin.

use crate::frame::FrameBuffer;
use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use log::info;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
struct FrameServerState {
    buffer: Arc<FrameBuffer>,
    started: Instant,
}

/// Serve `/frame` and `/health` until the process is stopped.
pub async fn run_frame_server(
    host: &str,
    port: u16,
    buffer: Arc<FrameBuffer>,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = FrameServerState {
        buffer,
        started: Instant::now(),
    };

    let app = Router::new()
        .route("/frame", get(frame_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Frame endpoint listening on http://{}/frame", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Latest frame, or 404 until the first one lands.
async fn frame_handler(State(state): State<FrameServerState>) -> Response {
    match state.buffer.latest() {
        Some(frame) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .header(header::CACHE_CONTROL, "no-store, max-age=0")
            .body(Body::from(frame))
            .unwrap_or_else(|_| Response::new(Body::empty())),
        None => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::from("no frame yet"))
            .unwrap_or_else(|_| Response::new(Body::empty())),
    }
}

/// Health check handler
async fn health_handler(State(state): State<FrameServerState>) -> String {
    format!(
        r#"{{
  "status": "healthy",
  "uptime_seconds": {:.2},
  "frame_version": {},
  "version": "{}"
}}"#,
        state.started.elapsed().as_secs_f64(),
        state.buffer.version(),
        env!("CARGO_PKG_VERSION")
    )
}
