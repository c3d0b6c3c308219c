//! Fathom game room server library.

pub mod catalog;
pub mod config;
pub mod server;

// Re-export commonly used types
pub use catalog::{FishCatalog, FishDefinition};
pub use config::Config;
pub use server::{
    run, run_room_loop, PendingBroadcasts, Rejection, Room, StateBroadcast, TargetedEvent,
};
