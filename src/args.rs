use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config;

#[derive(Parser, Debug)]
#[command(name = "rastercast-core")]
#[command(author = "Rastercast Team")]
#[command(version = "0.2.0")]
#[command(about = "Raster streaming over WebRTC data channels", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/rastercast-core.toml")]
    pub config: PathBuf,

    /// Verbose logging
    #[arg(short, long, action)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the signaling relay
    Relay {
        /// Relay port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run the sending endpoint
    Send {
        /// Raster file to stream
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Relay WebSocket URL
        #[arg(long)]
        relay_url: Option<String>,

        /// HTTP port for the frame fallback endpoint
        #[arg(long)]
        http_port: Option<u16>,
    },

    /// Run the receiving endpoint
    Recv {
        /// Relay WebSocket URL
        #[arg(long)]
        relay_url: Option<String>,

        /// Frame endpoint URL for the polling fallback
        #[arg(long)]
        fallback_url: Option<String>,
    },
}

impl Args {
    pub fn load_config(&self) -> Result<config::Config, Box<dyn std::error::Error>> {
        config::Config::load(&self.config)
    }
}
