//! Network Module
//!
//! TCP transport for the client side of an RCON session.
//!
//! ## Architecture
//! - Blocking connect with per-address timeout
//! - One receive thread per connection, feeding a `StreamHandler`
//! - Writers serialized behind a mutex

mod transport;
mod connection;

pub use transport::{CloseKind, StreamHandler, Transport};
pub use connection::TcpConnection;
