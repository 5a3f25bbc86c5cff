//! Packet codec
//!
//! Encoding and decoding of the payload carried inside a frame.
//!
//! ## Payload Format
//! ```text
//! ┌──────────────┬──────────┬──────────────────┬────┬────┐
//! │ RequestId(4) │ Type (4) │   Body (UTF-8)   │ 00 │ 00 │
//! └──────────────┴──────────┴──────────────────┴────┴────┘
//! ```
//!
//! `encode_packet` writes the body terminator; the framer appends the second
//! null. Servers send both, so `decode_packet` strips a two byte tail.

use crate::error::{RconError, Result};
use super::{Packet, PacketType};

/// Header size: 4 bytes request id + 4 bytes type
pub const HEADER_SIZE: usize = 8;

/// Trailing bytes after the body on the wire (body terminator + pad)
pub const TRAILER_SIZE: usize = 2;

/// Fixed bytes in every frame besides the body
pub const PACKET_OVERHEAD: usize = HEADER_SIZE + TRAILER_SIZE;

/// Encode a packet to a frame payload
///
/// Format: request_id (4) + type (4) + body + 0x00
pub fn encode_packet(packet: &Packet) -> Vec<u8> {
    let body = packet.body.as_bytes();

    let mut payload = Vec::with_capacity(HEADER_SIZE + body.len() + 1);
    payload.extend_from_slice(&packet.request_id.to_le_bytes());
    payload.extend_from_slice(&(packet.kind as i32).to_le_bytes());
    payload.extend_from_slice(body);
    payload.push(0);

    payload
}

/// Decode a packet from a frame payload
pub fn decode_packet(payload: &[u8]) -> Result<Packet> {
    if payload.len() < PACKET_OVERHEAD {
        return Err(RconError::Protocol(format!(
            "Truncated packet: expected at least {} bytes, got {}",
            PACKET_OVERHEAD,
            payload.len()
        )));
    }

    let request_id = i32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
    let raw_type = i32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]);
    let kind = PacketType::try_from(raw_type)?;

    let body_bytes = &payload[HEADER_SIZE..payload.len() - TRAILER_SIZE];
    let body = std::str::from_utf8(body_bytes)
        .map_err(|e| RconError::Protocol(format!("Packet body is not UTF-8: {}", e)))?
        .to_string();

    Ok(Packet {
        request_id,
        kind,
        body,
    })
}
