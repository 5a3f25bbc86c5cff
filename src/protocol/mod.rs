//! Protocol Module
//!
//! Wire format of the RCON protocol.
//!
//! ## Frame Format
//! ```text
//! ┌──────────┬──────────────┬──────────┬──────────────┬────┬────┐
//! │ Len (4)  │ RequestId(4) │ Type (4) │     Body     │ 00 │ 00 │
//! └──────────┴──────────────┴──────────┴──────────────┴────┴────┘
//! ```
//! All integers are little-endian. `Len` counts everything after itself.
//!
//! ### Packet Types
//! - 0: RESPONSE   - reply to a command (also used for outgoing commands)
//! - 2: AUTH_REPLY - reply to an auth attempt, id -1 on failure
//! - 3: AUTH       - password, client to server only
//!
//! Replies carry no usable correlation id. The server answers in the order
//! requests were sent and the client relies on that.

mod packet;
mod codec;
mod framer;
mod command;
mod response;

pub use packet::{Packet, PacketType, AUTH_FAILED_ID};
pub use codec::{encode_packet, decode_packet, HEADER_SIZE, PACKET_OVERHEAD, TRAILER_SIZE};
pub use framer::{Framer, LENGTH_FIELD_SIZE};
pub use command::Command;
pub use response::{parse_player_list, Player, ServerInfo, PLAYER_LIST_HEADER};
