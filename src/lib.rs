//! # palrcon
//!
//! A client for the RCON protocol spoken by Palworld dedicated servers:
//! - Incremental length-prefixed framing over a persistent TCP stream
//! - Packet codec with the server's two-byte body trailer
//! - In-order request/reply correlation with per-request timeouts
//! - Connect / authenticate state machine with a typed command API
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Session                               │
//! │        (state machine, commands, reply parsing)              │
//! └──────────────┬──────────────────────────────▲───────────────┘
//!                │ submit                        │ resolve
//! ┌──────────────▼──────────────────────────────┴───────────────┐
//! │                       Correlator                             │
//! │                 (FIFO of pending requests)                   │
//! └──────────────┬──────────────────────────────▲───────────────┘
//!                │                               │
//!          ┌─────▼─────┐                   ┌─────┴─────┐
//!          │  Encode   │                   │  Decode   │
//!          │  (Codec + │                   │ (Framer + │
//!          │  Framer)  │                   │  Codec)   │
//!          └─────┬─────┘                   └─────▲─────┘
//!                │                               │
//! ┌──────────────▼──────────────────────────────┴───────────────┐
//! │                     TCP Connection                           │
//! │              (writer mutex + receive thread)                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod network;
pub mod session;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{RconError, Result};
pub use config::Config;
pub use network::CloseKind;
pub use protocol::{Command, Player, ServerInfo};
pub use session::{ConnectionState, Session, SessionEvent};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of palrcon
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
