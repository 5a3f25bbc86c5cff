//! Command definitions
//!
//! Admin commands understood by the server, rendered as plain text bodies.

use std::fmt;

/// A server command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show a message to every player
    Broadcast { message: String },

    /// Shut the server down after a delay
    Shutdown { seconds: u32, message: String },

    /// Persist the world
    Save,

    /// List connected players
    ShowPlayers,

    /// Kick a player by steam id
    KickPlayer { id: String },

    /// Ban a player by steam id
    BanPlayer { id: String },

    /// Server version and name
    Info,

    /// Passed through verbatim
    Raw(String),
}

impl Command {
    /// The text sent as the packet body
    pub fn body(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Broadcast { message } => write!(f, "Broadcast {}", message),
            Command::Shutdown { seconds, message } => write!(f, "Shutdown {} {}", seconds, message),
            Command::Save => f.write_str("Save"),
            Command::ShowPlayers => f.write_str("ShowPlayers"),
            Command::KickPlayer { id } => write!(f, "KickPlayer {}", id),
            Command::BanPlayer { id } => write!(f, "BanPlayer {}", id),
            Command::Info => f.write_str("info"),
            Command::Raw(text) => f.write_str(text),
        }
    }
}
