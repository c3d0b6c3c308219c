//! Shared protocol crate for fathom.
//!
//! This crate contains:
//! - Message definitions and the JSON codec
//! - The per-tier fish stat block
//! - Shared types (SessionId, Position, PlayVolume)

mod error;
mod stats;
mod volume;
pub mod messages;

pub use error::ProtocolError;
pub use stats::FishStats;
pub use volume::{PlayVolume, CHUNK_DEPTH, CHUNK_HEIGHT, CHUNK_WIDTH};

use std::fmt;

use serde::{Deserialize, Serialize};

/// Session identifier handed out when a connection joins the room.
///
/// Nine alphanumeric characters, unique within the room. On the wire it is
/// a plain JSON string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

/// Length of a generated session id.
pub const SESSION_ID_LEN: usize = 9;

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Represents a 3D position using glam's Vec3.
pub type Position = glam::Vec3;
