//! Node-level errors.

use session_protocol::ProtocolError;
use thiserror::Error;

use crate::container::ConfigError;

/// Errors surfaced by the node runtime.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Bad configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A protocol operation failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A chat payload could not be encoded.
    #[error("Failed to encode chat message: {0}")]
    Encode(#[from] serde_json::Error),

    /// No peer with this nickname.
    #[error("Unknown peer: {0}")]
    UnknownPeer(String),
}
