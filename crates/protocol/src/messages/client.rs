//! Client -> Server message parsing.

use serde::{Deserialize, Serialize};

use crate::{ProtocolError, SessionId};

/// Parsed client message.
///
/// Clients fire these without waiting for a reply. The server either
/// mutates the room or drops the message; it never answers one directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Position delta in world units. Ignored while attached to a host.
    Move { dx: f32, dy: f32, dz: f32 },
    /// Begin a dash. XP burns twice as fast until the dash ends.
    StartDash,
    /// End a dash.
    EndDash,
    /// Latch onto another player's fish. Tier-0 only.
    #[serde(rename_all = "camelCase")]
    Attach { target_id: SessionId },
    /// Let go of the current host. Tier-0 only.
    Detach,
    /// Swap to the given tier's base stats, keeping position.
    Evolve { tier: u32 },
}

impl ClientMessage {
    /// Parse a client message from a text frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serialize for sending. Used by test and bot clients.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}
