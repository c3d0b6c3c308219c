//! Message definitions for the room protocol.
//!
//! This module contains both client->server and server->client message
//! types. Every message is a single JSON object in a websocket text frame,
//! discriminated by its `type` field.

mod client;
mod server;

pub use client::*;
pub use server::*;
