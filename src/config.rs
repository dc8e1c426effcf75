//! Startup configuration
//!
//! Listen address and port from the command line.

use clap::Parser;

/// Default interface to listen on
pub const DEFAULT_IP: &str = "127.0.0.1";

/// Default port to listen on
pub const DEFAULT_PORT: u16 = 8181;

/// Multi-room line chat relay
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "chat_relay")]
#[command(about = "Multi-room line-oriented TCP chat relay")]
pub struct Config {
    /// IP address to listen on
    #[arg(long, default_value = DEFAULT_IP)]
    pub ip: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

impl Config {
    /// Address string passed to the listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}
