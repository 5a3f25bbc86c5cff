//! Frame codec for the RCON byte stream.
//!
//! Incoming bytes arrive in arbitrary chunks from the socket. The framer is a
//! two-state machine:
//! - `Length`: collecting the 4 byte little-endian length field
//! - `Payload`: length validated, collecting exactly that many bytes
//!
//! A framer holds state for exactly one connection and must not be reused
//! after its connection goes away.

use bytes::{BufMut, Bytes, BytesMut};

use crate::config::DEFAULT_MAX_FRAME_SIZE;
use crate::error::{RconError, Result};

/// Size of the length prefix
pub const LENGTH_FIELD_SIZE: usize = 4;

#[derive(Debug)]
enum State {
    Length { buf: [u8; LENGTH_FIELD_SIZE], filled: usize },
    Payload { buf: BytesMut, remaining: usize },
}

impl State {
    fn awaiting_length() -> Self {
        State::Length {
            buf: [0; LENGTH_FIELD_SIZE],
            filled: 0,
        }
    }
}

/// Incremental encoder/decoder for length-prefixed frames
#[derive(Debug)]
pub struct Framer {
    state: State,
    max_frame_size: usize,
}

impl Framer {
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            state: State::awaiting_length(),
            max_frame_size,
        }
    }

    /// Wrap a payload in a frame: length (payload + 1) + payload + 0x00.
    ///
    /// Nothing is produced when the frame would exceed the size limit.
    pub fn encode(&self, payload: &[u8]) -> Result<Bytes> {
        let length = payload.len() + 1;
        if length > self.max_frame_size {
            return Err(RconError::FrameTooLarge {
                size: length,
                max: self.max_frame_size,
            });
        }

        let mut frame = BytesMut::with_capacity(LENGTH_FIELD_SIZE + length);
        frame.put_i32_le(length as i32);
        frame.put_slice(payload);
        frame.put_u8(0);

        Ok(frame.freeze())
    }

    /// Feed a chunk of stream bytes, returning every payload it completes.
    ///
    /// A chunk may hold part of a length field, part of a payload, one frame
    /// or several. Partial data is kept for the next call.
    ///
    /// # Errors
    ///
    /// An out-of-range length field means the stream can no longer be
    /// trusted; the caller must drop the connection.
    pub fn decode(&mut self, chunk: &[u8]) -> Result<Vec<Bytes>> {
        let mut frames = Vec::new();
        let mut input = chunk;

        while !input.is_empty() {
            match &mut self.state {
                State::Length { buf, filled } => {
                    let take = (LENGTH_FIELD_SIZE - *filled).min(input.len());
                    buf[*filled..*filled + take].copy_from_slice(&input[..take]);
                    *filled += take;
                    input = &input[take..];

                    if *filled == LENGTH_FIELD_SIZE {
                        let length = i32::from_le_bytes(*buf);
                        if length <= 0 || length as usize > self.max_frame_size {
                            return Err(RconError::InvalidFrameLength {
                                length,
                                max: self.max_frame_size,
                            });
                        }

                        let length = length as usize;
                        self.state = State::Payload {
                            buf: BytesMut::with_capacity(length),
                            remaining: length,
                        };
                    }
                }

                State::Payload { buf, remaining } => {
                    let take = (*remaining).min(input.len());
                    buf.put_slice(&input[..take]);
                    *remaining -= take;
                    input = &input[take..];

                    if *remaining == 0 {
                        let payload = std::mem::take(buf).freeze();
                        self.state = State::awaiting_length();
                        frames.push(payload);
                    }
                }
            }
        }

        Ok(frames)
    }

    /// Whether a frame is partially buffered
    pub fn has_partial(&self) -> bool {
        match &self.state {
            State::Length { filled, .. } => *filled > 0,
            State::Payload { .. } => true,
        }
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}
