//! Player session state.

use std::net::SocketAddr;

use protocol::messages::PlayerSnapshot;
use protocol::{FishStats, Position, SessionId};

/// A player record owned by the room.
#[derive(Debug)]
pub struct Player {
    /// Session id, unique within the room.
    pub id: SessionId,
    /// Remote address.
    pub addr: SocketAddr,
    /// World position. Client-reported deltas accumulate here unclamped.
    pub position: Position,
    /// Current catalog tier.
    pub tier: u32,
    /// Live stat block. Starts as the tier's base stats; `energy` and `xp`
    /// drift under the simulation; replaced wholesale on tier transitions.
    pub stats: FishStats,
    /// Host this player is latched onto (tier-0 parasites only).
    pub attached_to: Option<SessionId>,
    /// Whether a dash is in progress.
    pub is_dashing: bool,
    /// Last activity timestamp.
    pub last_activity: std::time::Instant,
}

impl Player {
    /// Create a new record at the given spawn point.
    pub fn new(
        id: SessionId,
        addr: SocketAddr,
        position: Position,
        tier: u32,
        stats: FishStats,
    ) -> Self {
        Self {
            id,
            addr,
            position,
            tier,
            stats,
            attached_to: None,
            is_dashing: false,
            last_activity: std::time::Instant::now(),
        }
    }

    /// Update activity timestamp.
    pub fn touch(&mut self) {
        self.last_activity = std::time::Instant::now();
    }

    /// Entry for the state broadcast.
    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id.clone(),
            tier: self.tier,
            x: self.position.x,
            y: self.position.y,
            z: self.position.z,
            stats: self.stats,
            attached_to: self.attached_to.clone(),
            is_dashing: self.is_dashing,
        }
    }
}
