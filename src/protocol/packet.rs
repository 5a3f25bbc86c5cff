//! Packet definitions
//!
//! The decoded `{request_id, type, body}` carried inside a frame.

use crate::error::{RconError, Result};

/// Request id the server answers with when the password was rejected
pub const AUTH_FAILED_ID: i32 = -1;

/// Packet types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum PacketType {
    /// Reply to any non-auth command
    Response = 0,

    /// Reply to an auth attempt
    AuthReply = 2,

    /// Client to server only, body carries the password
    Auth = 3,
}

impl TryFrom<i32> for PacketType {
    type Error = RconError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(PacketType::Response),
            2 => Ok(PacketType::AuthReply),
            3 => Ok(PacketType::Auth),
            other => Err(RconError::Protocol(format!("Unknown packet type: {}", other))),
        }
    }
}

/// A single RCON packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Opaque for commands; `AUTH_FAILED_ID` on a rejected auth reply
    pub request_id: i32,

    pub kind: PacketType,

    pub body: String,
}

impl Packet {
    pub fn new(request_id: i32, kind: PacketType, body: impl Into<String>) -> Self {
        Self {
            request_id,
            kind,
            body: body.into(),
        }
    }

    /// Auth request carrying the password
    pub fn auth(password: &str) -> Self {
        Self::new(0, PacketType::Auth, password)
    }

    /// Command request; outgoing command ids are always 0
    pub fn command(body: impl Into<String>) -> Self {
        Self::new(0, PacketType::Response, body)
    }

    /// Whether this is the server's "wrong password" answer
    pub fn is_auth_failure(&self) -> bool {
        self.kind == PacketType::AuthReply && self.request_id == AUTH_FAILED_ID
    }
}
