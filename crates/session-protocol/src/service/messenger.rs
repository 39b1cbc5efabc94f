//! # Multicast Messenger
//!
//! Sends application payloads on the canonical session and filters inbound
//! signals before dispatch:
//!
//! 1. **cross-channel**: drop when the signal's session is not the canonical
//!    one (this includes traffic on our own hosted routing sessions)
//! 2. **self-echo**: drop when we are the sender
//!
//! Local echo of sent payloads is the application's job.

use shared_types::entities::{BusId, SessionId};
use shared_types::ipc::InboundSignal;
use tracing::{debug, trace};

use crate::domain::ProtocolError;
use crate::ports::{BusRuntime, MessengerStats, SendOutcome};
use crate::service::signals::{SignalHandler, SignalTable};

/// What happened to an inbound signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to a registered handler.
    Delivered,
    /// Arrived on a session other than the canonical one.
    CrossChannel,
    /// Sent by us.
    SelfEcho,
    /// Passed the filters but nobody handles it.
    Unhandled,
}

/// Outbound send and inbound filtering for one peer.
pub struct MulticastMessenger {
    interface: String,
    member: String,
    signals: SignalTable,
    stats: MessengerStats,
}

impl MulticastMessenger {
    /// Create a messenger emitting on `interface.member`.
    pub fn new(interface: impl Into<String>, member: impl Into<String>, signals: SignalTable) -> Self {
        Self {
            interface: interface.into(),
            member: member.into(),
            signals,
            stats: MessengerStats::default(),
        }
    }

    /// Emit `payload` on the canonical session, if there is one.
    pub async fn send(
        &mut self,
        runtime: &dyn BusRuntime,
        canonical: Option<SessionId>,
        payload: &[u8],
    ) -> Result<SendOutcome, ProtocolError> {
        let Some(session_id) = canonical else {
            debug!("No canonical session; payload not sent");
            return Ok(SendOutcome::NoPeers);
        };
        let recipients = runtime
            .emit_signal(session_id, &self.interface, &self.member, payload)
            .await
            .map_err(|d| ProtocolError::runtime("send", d))?;
        self.stats.sent += 1;
        trace!(session_id = %session_id, recipients, bytes = payload.len(), "Payload sent");
        Ok(SendOutcome::Sent {
            session_id,
            recipients,
        })
    }

    /// Filter and dispatch one inbound signal.
    pub fn on_receive(
        &mut self,
        signal: &InboundSignal,
        canonical: Option<SessionId>,
        local: &BusId,
    ) -> Delivery {
        if canonical != Some(signal.session_id) {
            self.stats.dropped_cross_channel += 1;
            trace!(session_id = %signal.session_id, ?canonical, "Dropped cross-channel signal");
            return Delivery::CrossChannel;
        }
        if signal.sender == *local {
            self.stats.dropped_self_echo += 1;
            trace!(session_id = %signal.session_id, "Dropped self echo");
            return Delivery::SelfEcho;
        }
        if self.signals.dispatch(signal) {
            self.stats.delivered += 1;
            Delivery::Delivered
        } else {
            self.stats.unhandled += 1;
            debug!(
                interface = %signal.interface,
                member = %signal.member,
                "No handler registered for signal"
            );
            Delivery::Unhandled
        }
    }

    /// Register a handler after construction.
    pub fn register(
        &mut self,
        interface: impl Into<String>,
        member: impl Into<String>,
        handler: impl SignalHandler + 'static,
    ) -> Result<(), ProtocolError> {
        self.signals.register(interface, member, handler)
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> MessengerStats {
        self.stats
    }
}
