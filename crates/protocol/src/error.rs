//! Protocol error types.

use thiserror::Error;

/// Errors that can occur during message decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Binary frames are not part of this protocol")]
    BinaryFrame,
}
