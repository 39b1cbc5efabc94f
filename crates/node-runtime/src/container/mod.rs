//! # Peer Container
//!
//! Node configuration and the peers built from it.

pub mod config;
pub mod peers;

pub use config::{ChannelSection, ConfigError, NodeConfig, PeerSection};
pub use peers::ChatPeer;
