//! Connection state and session notifications

use std::fmt;

use crate::network::CloseKind;
use crate::protocol::{Player, ServerInfo};

/// Lifecycle of a session's connection
///
/// ```text
/// NotConnected → Connecting → Connected → Authenticating → Authenticated
///       ▲             │            │              │               │
///       └─────────────┴────────────┴──────────────┴───────────────┘
///                         any failure or disconnect
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    NotConnected,
    Connecting,
    Connected,
    Authenticating,
    Authenticated,
}

impl ConnectionState {
    /// Commands other than auth may only go out once authenticated
    pub fn accepts_commands(self) -> bool {
        self == ConnectionState::Authenticated
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::NotConnected => "not connected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Authenticating => "authenticating",
            ConnectionState::Authenticated => "authenticated",
        };
        f.write_str(name)
    }
}

/// Notification for the host application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// TCP connection established, auth about to start
    Connected,

    ConnectionFailed { reason: String },

    Disconnected { kind: CloseKind, reason: Option<String> },

    /// Outcome of the auth handshake
    Authenticated { success: bool },

    ServerInfoUpdated(ServerInfo),

    /// Fresh player list from the background poller
    PlayersUpdated(Vec<Player>),
}
