//! Reply parsing
//!
//! Structured views of the well-known reply bodies.

use crate::error::{RconError, Result};

/// First columns of the `ShowPlayers` header row
pub const PLAYER_LIST_HEADER: &str = "name,playeruid,steamid";

/// A connected player
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Player {
    pub name: String,
    pub character_id: String,
    pub steam_id: String,
}

impl Player {
    pub fn new(
        name: impl Into<String>,
        character_id: impl Into<String>,
        steam_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            character_id: character_id.into(),
            steam_id: steam_id.into(),
        }
    }
}

/// Parse a `ShowPlayers` reply.
///
/// One `name,playeruid,steamid` row per line. The header row and rows
/// without three fields are skipped. Names may contain commas, so the ids
/// are taken from the right.
pub fn parse_player_list(body: &str) -> Vec<Player> {
    let mut players = Vec::new();

    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(PLAYER_LIST_HEADER) {
            continue;
        }

        let mut fields = line.rsplitn(3, ',');
        let (steam_id, character_id, name) = match (fields.next(), fields.next(), fields.next()) {
            (Some(steam_id), Some(character_id), Some(name)) => (steam_id, character_id, name),
            _ => {
                tracing::debug!("Skipping malformed player row: {:?}", line);
                continue;
            }
        };

        players.push(Player::new(name.trim(), character_id.trim(), steam_id.trim()));
    }

    players
}

/// Server version and name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub version: String,
    pub name: String,
}

impl ServerInfo {
    pub fn new(version: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            name: name.into(),
        }
    }

    /// Parse an `info` reply of the form `[<version>] <name>`.
    ///
    /// Servers may put a greeting in front of the bracket.
    pub fn parse(body: &str) -> Result<Self> {
        let body = body.trim_end();

        let rest = body
            .find('[')
            .map(|start| &body[start + 1..])
            .ok_or_else(|| RconError::UnexpectedReply(body.to_string()))?;

        let (version, name) = rest
            .split_once("] ")
            .ok_or_else(|| RconError::UnexpectedReply(body.to_string()))?;

        Ok(Self::new(version, name.trim()))
    }
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self::new("v0.0.0.0", "Disconnected")
    }
}
