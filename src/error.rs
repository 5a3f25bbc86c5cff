//! Error types for palrcon
//!
//! Provides a unified error type for all operations.

use std::time::Duration;

use thiserror::Error;

use crate::network::CloseKind;
use crate::protocol::PacketType;

/// Result type alias using RconError
pub type Result<T> = std::result::Result<T, RconError>;

/// Unified error type for palrcon operations
#[derive(Debug, Error)]
pub enum RconError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Connection Errors
    // -------------------------------------------------------------------------
    /// Refused, unresolvable host, or connect timeout
    #[error("Connection error: {0}")]
    Connection(String),

    /// The link went away while a request was outstanding
    #[error("Connection lost ({0})")]
    TransportLost(CloseKind),

    #[error("Not connected")]
    NotConnected,

    // -------------------------------------------------------------------------
    // Framing Errors
    // -------------------------------------------------------------------------
    /// Declared length on the wire is outside `1..=max`
    #[error("Invalid frame length: {length} (max {max})")]
    InvalidFrameLength { length: i32, max: usize },

    /// Outgoing payload does not fit in a single frame
    #[error("Frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Reply type does not match the head of the in-order request queue
    #[error("Protocol mismatch: expected {expected:?} reply, got {actual:?}")]
    ProtocolMismatch {
        expected: PacketType,
        actual: PacketType,
    },

    #[error("Unexpected reply: {0:?}")]
    UnexpectedReply(String),

    // -------------------------------------------------------------------------
    // Session Errors
    // -------------------------------------------------------------------------
    #[error("Authentication failed")]
    AuthFailure,

    #[error("Command timed out after {0:?}")]
    CommandTimeout(Duration),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RconError {
    /// Whether the connection has to be torn down after this error.
    ///
    /// Framing and type errors leave the stream in an unknown position; a
    /// rejected password ends the session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RconError::InvalidFrameLength { .. }
                | RconError::ProtocolMismatch { .. }
                | RconError::AuthFailure
        )
    }
}
