//! Configuration for palrcon
//!
//! Centralized configuration with sensible defaults.

use std::time::Duration;

use crate::error::{RconError, Result};
use crate::protocol::PACKET_OVERHEAD;

/// Default RCON port used by Palworld dedicated servers
pub const DEFAULT_PORT: u16 = 25575;

/// Default frame size limit
pub const DEFAULT_MAX_FRAME_SIZE: usize = 4096;

/// Main configuration for an RCON session
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Server Configuration
    // -------------------------------------------------------------------------
    /// Server host name or IP literal
    pub host: String,

    /// Server RCON port
    pub port: u16,

    /// Admin password sent in the auth packet
    pub password: String,

    // -------------------------------------------------------------------------
    // Protocol Configuration
    // -------------------------------------------------------------------------
    /// Largest frame (length field value) accepted or produced
    pub max_frame_size: usize,

    // -------------------------------------------------------------------------
    // Timing Configuration
    // -------------------------------------------------------------------------
    /// Timeout for each TCP connect attempt
    pub connect_timeout: Duration,

    /// Per-command reply deadline
    pub command_timeout: Duration,

    /// Deadline for the auth reply
    pub auth_timeout: Duration,

    /// Interval of the background player-list refresh (disabled when None)
    pub player_poll_interval: Option<Duration>,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// Size of the buffer used by the receive loop
    pub read_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            password: String::new(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(20),
            auth_timeout: Duration::from_secs(20),
            player_poll_interval: None,
            read_buffer_size: 8 * 1024,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// `host:port` for logging
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check the values a session cannot work without
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(RconError::Config("host is empty".to_string()));
        }
        if self.port == 0 {
            return Err(RconError::Config("port must be non-zero".to_string()));
        }
        // Room for the header, both terminators and at least one body byte
        if self.max_frame_size <= PACKET_OVERHEAD {
            return Err(RconError::Config(format!(
                "max_frame_size {} leaves no room for a body (overhead {})",
                self.max_frame_size, PACKET_OVERHEAD
            )));
        }
        if self.max_frame_size > i32::MAX as usize {
            return Err(RconError::Config(format!(
                "max_frame_size {} does not fit the length field",
                self.max_frame_size
            )));
        }
        if self.read_buffer_size == 0 {
            return Err(RconError::Config("read_buffer_size must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the server host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the server RCON port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the admin password
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = password.into();
        self
    }

    /// Set the frame size limit (in bytes)
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.config.max_frame_size = size;
        self
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the per-command timeout
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.config.command_timeout = timeout;
        self
    }

    /// Set the auth reply timeout
    pub fn auth_timeout(mut self, timeout: Duration) -> Self {
        self.config.auth_timeout = timeout;
        self
    }

    /// Enable the background player refresh
    pub fn player_poll_interval(mut self, interval: Duration) -> Self {
        self.config.player_poll_interval = Some(interval);
        self
    }

    /// Set the receive buffer size (in bytes)
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = size;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
