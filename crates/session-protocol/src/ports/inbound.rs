//! # Driving Ports (Inbound API)
//!
//! The API the application uses to drive one peer. Implemented by
//! [`CoordinatorHandle`](crate::service::CoordinatorHandle), which forwards
//! every call to the protocol worker and waits for its reply.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use shared_types::entities::{BusId, SessionId, SessionPort, WellKnownName};
use shared_types::policy::AcceptPolicy;

use crate::domain::{ChannelState, ProtocolError};

/// Counters kept by the messenger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MessengerStats {
    /// Payloads sent on the canonical session.
    pub sent: u64,
    /// Inbound signals handed to a handler.
    pub delivered: u64,
    /// Inbound signals dropped because they arrived on another session.
    pub dropped_cross_channel: u64,
    /// Inbound signals dropped because we sent them.
    pub dropped_self_echo: u64,
    /// Inbound signals with no registered handler.
    pub unhandled: u64,
}

/// Result of a send that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Emitted on the canonical session.
    Sent {
        /// Session the payload went out on.
        session_id: SessionId,
        /// Number of peers it was delivered to.
        recipients: usize,
    },
    /// No canonical session; nothing was sent.
    NoPeers,
}

/// Snapshot of a peer's protocol state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelStatus {
    /// Our unique name.
    pub unique_name: BusId,
    /// Whether the attachment is connected.
    pub connected: bool,
    /// Channel lifecycle state.
    pub state: ChannelState,
    /// Name we host, if any.
    pub hosted_name: Option<WellKnownName>,
    /// Contact port we bound for hosting, if any.
    pub bound_port: Option<SessionPort>,
    /// Session used for sending.
    pub canonical: Option<SessionId>,
    /// Explicitly joined sessions.
    pub joined_sessions: Vec<SessionId>,
    /// Implicit routing sessions.
    pub routing_sessions: Vec<SessionId>,
    /// Currently found channel names.
    pub found_names: Vec<WellKnownName>,
    /// Whether discovery is being torn down.
    pub stopping_discovery: bool,
    /// Messenger counters.
    pub messenger: MessengerStats,
}

/// Primary API for driving the session protocol of one peer.
///
/// Channel-level operations (`host_channel`, `use_channel`, `leave`, ...)
/// compose the component-level ones (`request_name`, `bind_port`,
/// `join_session`, ...), which are exposed as well.
#[async_trait]
pub trait ChannelApi: Send + Sync {
    /// Connect the attachment. Everything else fails with `NotConnected`
    /// until this succeeds.
    async fn connect(&self) -> Result<BusId, ProtocolError>;

    /// Request name → bind contact port → advertise. A failure rolls back
    /// the steps already taken.
    async fn host_channel(&self, instance: &str) -> Result<WellKnownName, ProtocolError>;

    /// Cancel advertisement → unbind → release name.
    async fn stop_hosting(&self) -> Result<(), ProtocolError>;

    /// Discover the configured name prefix.
    async fn start_discovery(&self) -> Result<(), ProtocolError>;

    /// Stop discovering the configured name prefix.
    async fn stop_discovery(&self) -> Result<(), ProtocolError>;

    /// Explicitly join a channel, possibly our own.
    async fn use_channel(&self, name: &WellKnownName) -> Result<SessionId, ProtocolError>;

    /// Leave the canonical session.
    async fn leave_channel(&self) -> Result<(), ProtocolError>;

    /// Send a payload on the canonical session.
    async fn send(&self, payload: Vec<u8>) -> Result<SendOutcome, ProtocolError>;

    /// Full teardown: stop discovery, unbind, leave every session, cancel
    /// discovery, cancel advertisements, release names.
    async fn leave(&self) -> Result<(), ProtocolError>;

    /// Tear down and disconnect.
    async fn disconnect(&self) -> Result<(), ProtocolError>;

    /// Snapshot of the protocol state.
    async fn status(&self) -> Result<ChannelStatus, ProtocolError>;

    /// Request a well-known name (never queued).
    async fn request_name(&self, name: WellKnownName) -> Result<(), ProtocolError>;

    /// Release a well-known name. Releasing a name not held is a no-op.
    async fn release_name(&self, name: WellKnownName) -> Result<(), ProtocolError>;

    /// Advertise an owned name.
    async fn advertise(&self, name: WellKnownName) -> Result<(), ProtocolError>;

    /// Withdraw an advertisement.
    async fn cancel_advertise(&self, name: WellKnownName) -> Result<(), ProtocolError>;

    /// Discover an arbitrary prefix.
    async fn find_prefix(&self, prefix: String) -> Result<(), ProtocolError>;

    /// Stop discovering a prefix (best-effort).
    async fn cancel_prefix(&self, prefix: String) -> Result<(), ProtocolError>;

    /// Bind a session port with the configured options template.
    async fn bind_port(
        &self,
        hint: SessionPort,
        policy: Arc<dyn AcceptPolicy>,
    ) -> Result<SessionPort, ProtocolError>;

    /// Unbind a session port.
    async fn unbind_port(&self, port: SessionPort) -> Result<(), ProtocolError>;

    /// Explicitly join `host` on `port`.
    async fn join_session(
        &self,
        host: WellKnownName,
        port: SessionPort,
    ) -> Result<SessionId, ProtocolError>;

    /// Leave one session membership. Unknown ids are a no-op.
    async fn leave_session(&self, session_id: SessionId) -> Result<(), ProtocolError>;
}
