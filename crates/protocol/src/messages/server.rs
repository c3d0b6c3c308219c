//! Server -> Client message building.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{FishStats, ProtocolError, SessionId};

/// One player's entry in the authoritative room snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: SessionId,
    pub tier: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub stats: FishStats,
    /// Host this parasite is latched onto, if any.
    pub attached_to: Option<SessionId>,
    pub is_dashing: bool,
}

/// Message pushed from the server.
///
/// `State` goes to every connection each tick. `Welcome`, `TierDowngrade`
/// and `Detach` are addressed to a single session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// First message on a new session, carrying its id.
    Welcome { id: SessionId },
    /// Full snapshot of every player in the room.
    State {
        players: BTreeMap<SessionId, PlayerSnapshot>,
    },
    /// The simulation forced this fish down a tier. The addressed client
    /// reloads its model; everyone else learns it from the next `State`.
    TierDowngrade { id: SessionId, tier: u32, xp: f32 },
    /// This parasite was shaken off its host.
    Detach,
}

impl ServerMessage {
    /// Serialize for sending as a text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a server message. Used by test and bot clients.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}
