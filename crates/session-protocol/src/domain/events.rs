//! Events published by the coordinator for observers (UI, logs, tests).

use shared_types::entities::{Advertisement, BusId, SessionId, WellKnownName};

use super::channel::ChannelState;
use super::errors::ProtocolError;
use super::session_table::SessionOrigin;

/// Something observable happened in the protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorEvent {
    /// The attachment connected.
    Connected {
        /// Our unique name.
        unique_name: BusId,
    },
    /// The channel lifecycle moved.
    ChannelStateChanged {
        /// Previous state.
        from: ChannelState,
        /// New state.
        to: ChannelState,
    },
    /// A channel was found under a discovery prefix.
    PeerFound(Advertisement),
    /// A found channel went away.
    PeerLost(Advertisement),
    /// An automatic join failed. Nobody is waiting for it, so it is only
    /// reported here.
    JoinFailed {
        /// The channel we tried to join.
        name: WellKnownName,
        /// Why it failed.
        error: ProtocolError,
    },
    /// A membership was added.
    SessionJoined {
        /// Session id.
        session_id: SessionId,
        /// Explicit join or admitted joiner.
        origin: SessionOrigin,
    },
    /// A session ended.
    SessionLost {
        /// Session id.
        session_id: SessionId,
    },
    /// The session used for sending changed.
    CanonicalChanged {
        /// Previous canonical id.
        previous: Option<SessionId>,
        /// New canonical id.
        current: Option<SessionId>,
    },
    /// The bus is shutting down; all protocol state was dropped.
    BusStopping,
}
