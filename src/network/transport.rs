//! Transport contract
//!
//! What the session needs from a connection, independent of the socket type.

use std::fmt;

use crate::error::Result;

/// How a connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseKind {
    /// Closed locally by `disconnect()`
    Closed,

    /// The server closed the connection (zero-length read)
    Disconnected,

    /// Socket fault, or the stream could no longer be trusted
    Lost,
}

impl fmt::Display for CloseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CloseKind::Closed => "closed",
            CloseKind::Disconnected => "disconnected by server",
            CloseKind::Lost => "lost",
        };
        f.write_str(name)
    }
}

/// Outgoing half of a connection
pub trait Transport: Send + Sync {
    /// Write a complete frame. Fails with `NotConnected` once closed.
    fn send(&self, frame: &[u8]) -> Result<()>;

    /// Close the connection. Idempotent.
    fn disconnect(&self);

    fn is_connected(&self) -> bool;
}

/// Receives everything the read loop produces.
///
/// Owned by the receive thread; `on_close` is called exactly once.
pub trait StreamHandler: Send + 'static {
    /// Raw bytes as read from the socket.
    ///
    /// An error closes the connection with `CloseKind::Lost`.
    fn on_data(&mut self, chunk: &[u8]) -> Result<()>;

    fn on_close(&mut self, kind: CloseKind, reason: Option<String>);
}
