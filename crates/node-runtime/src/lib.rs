//! # Peerlink Chat Node
//!
//! Runs several chat peers against one in-process router. Each peer owns a
//! bus attachment, a session coordinator worker and a chat history.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (file, then environment)
//! 2. Start the router and one worker per configured peer
//! 3. Per peer: connect → host channel → start discovery → use channel
//!
//! ## Shutdown Sequence
//!
//! 1. Tear down every peer (unbind, leave, cancel discovery and adverts,
//!    release names)
//! 2. Stop the router
//! 3. Stop the workers

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod container;
pub mod error;
pub mod handlers;

use session_protocol::{ChannelConfig, SendOutcome};
use shared_bus::InMemoryRouter;
use tracing::{info, warn};

pub use container::{ChatPeer, ConfigError, NodeConfig, PeerSection};
pub use error::NodeError;
pub use handlers::{ChatHistory, ChatLine, ChatMessage};

/// The node runtime: one router, many peers.
pub struct NodeRuntime {
    router: InMemoryRouter,
    channel: ChannelConfig,
    peers: Vec<ChatPeer>,
}

impl NodeRuntime {
    /// Validate `config`, start the router and every peer's worker.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        config.validate()?;
        let channel = config.channel.to_channel_config()?;
        let router = InMemoryRouter::new();
        let peers = config
            .peers
            .into_iter()
            .map(|section| ChatPeer::spawn(&router, &channel, section))
            .collect::<Result<Vec<_>, _>>()?;
        info!(guid = %router.guid(), peers = peers.len(), "Node runtime created");
        Ok(Self {
            router,
            channel,
            peers,
        })
    }

    /// Start every peer in configuration order.
    pub async fn start(&self) -> Result<(), NodeError> {
        for peer in &self.peers {
            peer.start().await?;
        }
        info!(prefix = %self.channel.name_prefix, "Node runtime started");
        Ok(())
    }

    /// Send `text` from the peer called `nickname`.
    pub async fn say(&self, nickname: &str, text: &str) -> Result<SendOutcome, NodeError> {
        self.peer(nickname)
            .ok_or_else(|| NodeError::UnknownPeer(nickname.to_string()))?
            .say(text)
            .await
    }

    /// Peer by nickname.
    pub fn peer(&self, nickname: &str) -> Option<&ChatPeer> {
        self.peers.iter().find(|p| p.nickname() == nickname)
    }

    /// All peers, in configuration order.
    pub fn peers(&self) -> &[ChatPeer] {
        &self.peers
    }

    /// The shared router.
    pub fn router(&self) -> &InMemoryRouter {
        &self.router
    }

    /// Channel settings every peer runs with.
    pub fn channel(&self) -> &ChannelConfig {
        &self.channel
    }

    /// Tear down every peer, stop the router, stop the workers.
    ///
    /// Every peer is torn down even if an earlier one fails; the first
    /// failure is returned.
    pub async fn shutdown(self) -> Result<(), NodeError> {
        info!("Initiating graceful shutdown...");
        let mut first = None;
        for peer in &self.peers {
            if let Err(error) = peer.leave().await {
                warn!(nickname = %peer.nickname(), %error, "Teardown failed");
                first.get_or_insert(error);
            }
        }
        self.router.shutdown();
        for peer in self.peers {
            peer.stop().await;
        }
        info!("Shutdown complete");
        match first {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }
}
