//! # Chat Peers
//!
//! One peer = one bus attachment, one coordinator worker, one chat history.

use std::sync::Arc;

use session_protocol::{
    spawn, ChannelApi, ChannelConfig, ChannelStatus, CoordinatorHandle, ProtocolError,
    SendOutcome, SessionCoordinator, SignalTable,
};
use shared_bus::InMemoryRouter;
use shared_types::entities::WellKnownName;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::adapters::InMemoryBusAdapter;
use crate::container::PeerSection;
use crate::error::NodeError;
use crate::handlers::{ChatHistory, ChatMessage};

/// A running chat peer.
pub struct ChatPeer {
    section: PeerSection,
    name_prefix: String,
    handle: CoordinatorHandle,
    history: ChatHistory,
    worker: JoinHandle<()>,
}

impl ChatPeer {
    /// Attach to `router` and start the peer's protocol worker.
    ///
    /// Must be called inside a tokio runtime.
    pub fn spawn(
        router: &InMemoryRouter,
        channel: &ChannelConfig,
        section: PeerSection,
    ) -> Result<Self, ProtocolError> {
        let (attachment, notifications) = router.attach();
        let runtime = Arc::new(InMemoryBusAdapter::new(attachment));
        let history = ChatHistory::new();
        let signals = SignalTable::new().with(
            channel.interface.clone(),
            channel.member.clone(),
            history.handler(),
        )?;
        let coordinator = SessionCoordinator::new(runtime, channel.clone())?.with_signals(signals);
        let (handle, worker) = spawn(coordinator, notifications);
        info!(nickname = %section.nickname, unique_name = %handle.unique_name(), "Peer created");
        Ok(Self {
            section,
            name_prefix: channel.name_prefix.clone(),
            handle,
            history,
            worker,
        })
    }

    /// Connect, host the configured channel, discover, use the configured
    /// channel.
    pub async fn start(&self) -> Result<(), ProtocolError> {
        self.handle.connect().await?;
        if let Some(instance) = &self.section.host {
            self.handle.host_channel(instance).await?;
        }
        self.handle.start_discovery().await?;
        if let Some(instance) = &self.section.use_channel {
            let name = WellKnownName::from_prefix(&self.name_prefix, instance)?;
            self.handle.use_channel(&name).await?;
        }
        info!(nickname = %self.section.nickname, "Peer started");
        Ok(())
    }

    /// Echo `text` locally, then send it on the canonical session.
    pub async fn say(&self, text: &str) -> Result<SendOutcome, NodeError> {
        self.history.echo_local(text);
        let payload = ChatMessage::new(text).encode()?;
        let outcome = self.handle.send(payload).await?;
        if outcome == SendOutcome::NoPeers {
            warn!(nickname = %self.section.nickname, "Not in a channel; message stays local");
        }
        Ok(outcome)
    }

    /// Full teardown of this peer's protocol state.
    pub async fn leave(&self) -> Result<(), ProtocolError> {
        self.handle.leave().await
    }

    /// Stop the worker and wait for it.
    pub async fn stop(self) {
        self.handle.shutdown();
        if let Err(error) = self.worker.await {
            warn!(nickname = %self.section.nickname, %error, "Protocol worker ended abnormally");
        }
    }

    /// Protocol state snapshot.
    pub async fn status(&self) -> Result<ChannelStatus, ProtocolError> {
        self.handle.status().await
    }

    /// Configured nickname.
    pub fn nickname(&self) -> &str {
        &self.section.nickname
    }

    /// Handle driving this peer's coordinator.
    pub fn handle(&self) -> &CoordinatorHandle {
        &self.handle
    }

    /// Chat history.
    pub fn history(&self) -> &ChatHistory {
        &self.history
    }
}
