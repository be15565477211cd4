//! Configuration management for rastercast-core

use crate::frame::RasterSpec;
use crate::protocol::HEADER_LEN;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Relay server configuration
    #[serde(default)]
    pub relay: RelayConfig,

    /// Endpoint-side signaling configuration
    #[serde(default)]
    pub signaling: SignalingConfig,

    /// Raster geometry
    #[serde(default)]
    pub raster: RasterConfig,

    /// Chunking and fallback transport configuration
    #[serde(default)]
    pub transport: TransportConfig,

    /// Frame HTTP endpoint configuration (sender side)
    #[serde(default)]
    pub http: HttpConfig,

    /// ICE server configuration
    #[serde(default)]
    pub ice: IceConfig,

    /// Frame source configuration (sender side)
    #[serde(default)]
    pub sender: SenderConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Relay bind address
    pub host: String,

    /// Relay port
    pub port: u16,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalingConfig {
    /// Relay WebSocket URL the endpoints connect to
    pub url: String,

    /// Fixed reconnect delay in seconds
    pub reconnect_backoff_secs: u64,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080/ws".to_string(),
            reconnect_backoff_secs: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasterConfig {
    /// Raster width in pixels
    pub width: u32,

    /// Raster height in pixels
    pub height: u32,

    /// Bytes per pixel
    pub channels: u32,
}

impl RasterConfig {
    pub fn spec(&self) -> RasterSpec {
        RasterSpec::new(self.width, self.height, self.channels)
    }
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            width: 1440,
            height: 720,
            channels: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Maximum chunk payload size in bytes
    pub chunk_size: usize,

    /// Data channel label
    pub data_channel_label: String,

    /// Fallback poll interval in milliseconds
    pub poll_interval_ms: u64,

    /// Frame endpoint the fallback polls
    pub fallback_url: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            chunk_size: 16 * 1024,
            data_channel_label: "frames".to_string(),
            poll_interval_ms: 250,
            fallback_url: "http://127.0.0.1:8081/frame".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// HTTP bind address
    pub host: String,

    /// HTTP port for the frame endpoint
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceConfig {
    /// STUN server URL
    pub stun_url: String,

    /// Optional TURN server URL (for NAT-restricted networks)
    #[serde(default)]
    pub turn_url: String,

    /// TURN username
    #[serde(default)]
    pub turn_username: String,

    /// TURN password
    #[serde(default)]
    pub turn_password: String,
}

impl Default for IceConfig {
    fn default() -> Self {
        Self {
            stun_url: "stun:stun.l.google.com:19302".to_string(),
            turn_url: String::new(),
            turn_username: String::new(),
            turn_password: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderConfig {
    /// Raster file the simulation writes
    pub input: PathBuf,

    /// Source re-read interval in milliseconds
    pub poll_ms: u64,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("frame.bin"),
            poll_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn load(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.raster.width == 0 || self.raster.height == 0 {
            return Err("Raster dimensions must be non-zero".into());
        }

        if self.raster.channels == 0 || self.raster.channels > 4 {
            return Err("Raster channels must be between 1 and 4".into());
        }

        if self.transport.chunk_size <= HEADER_LEN {
            return Err("Transport chunk_size must exceed the 12-byte header length".into());
        }

        if self.transport.poll_interval_ms == 0 {
            return Err("Transport poll_interval_ms must be non-zero".into());
        }

        if self.signaling.reconnect_backoff_secs == 0 {
            return Err("Signaling reconnect_backoff_secs must be non-zero".into());
        }

        if !self.ice.turn_url.is_empty()
            && self.ice.turn_username.is_empty() != self.ice.turn_password.is_empty()
        {
            return Err("TURN username and password must be set together".into());
        }

        if self.sender.poll_ms == 0 {
            return Err("Sender poll_ms must be non-zero".into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.raster.spec().byte_len(), 3_110_400);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [raster]
            width = 720
            height = 360
            channels = 3

            [transport]
            chunk_size = 32768
            data_channel_label = "frames"
            poll_interval_ms = 500
            fallback_url = "http://example.org/frame"
            "#,
        )
        .unwrap();

        assert_eq!(config.raster.width, 720);
        assert_eq!(config.transport.chunk_size, 32768);
        assert_eq!(config.relay.port, 8080);
        assert_eq!(config.signaling.reconnect_backoff_secs, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn header_sized_chunks_are_rejected() {
        let mut config = Config::default();
        config.transport.chunk_size = HEADER_LEN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn lopsided_turn_credentials_are_rejected() {
        let mut config = Config::default();
        config.ice.turn_url = "turn:turn.example.org:3478".to_string();
        config.ice.turn_username = "user".to_string();
        assert!(config.validate().is_err());

        config.ice.turn_password = "pass".to_string();
        assert!(config.validate().is_ok());
    }
}
