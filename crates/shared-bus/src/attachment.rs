//! # Bus Attachment
//!
//! One peer's handle on the router. Every call is synchronous, returns a
//! [`Disposition`], and fails with [`Disposition::Failed`] while the
//! attachment is not connected.

use std::sync::Arc;

use parking_lot::Mutex;
use shared_types::entities::{BusId, SessionId, SessionPort, WellKnownName};
use shared_types::ipc::Disposition;
use shared_types::policy::AcceptPolicy;
use shared_types::session::{SessionOptions, TransportMask};
use tracing::debug;

use crate::router::RouterState;

/// A peer's connection to an [`InMemoryRouter`](crate::InMemoryRouter).
#[derive(Clone)]
pub struct BusAttachment {
    id: BusId,
    state: Arc<Mutex<RouterState>>,
}

impl BusAttachment {
    pub(crate) fn new(id: BusId, state: Arc<Mutex<RouterState>>) -> Self {
        Self { id, state }
    }

    /// The unique name assigned at attach time.
    #[must_use]
    pub fn unique_name(&self) -> &BusId {
        &self.id
    }

    /// Whether the attachment is connected to a running router.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state.lock().is_connected(&self.id)
    }

    /// Connect. `AlreadyExists` if already connected, `Failed` once the
    /// router has stopped.
    pub fn connect(&self) -> Disposition {
        let disposition = self.state.lock().connect(&self.id);
        debug!(unique_name = %self.id, %disposition, "connect");
        disposition
    }

    /// Disconnect, dropping every name, advertisement, binding, discovery
    /// prefix and session membership this attachment holds.
    pub fn disconnect(&self) -> Disposition {
        let disposition = self.state.lock().disconnect(&self.id);
        debug!(unique_name = %self.id, %disposition, "disconnect");
        disposition
    }

    /// Request ownership of `name`. Never queues: an owned name yields
    /// `AlreadyExists`, even when this attachment is the owner.
    pub fn request_name(&self, name: &WellKnownName) -> Disposition {
        self.state.lock().request_name(&self.id, name)
    }

    /// Release `name`. `NotFound` if nobody owns it, `Rejected` if another
    /// attachment does. Also withdraws its advertisement.
    pub fn release_name(&self, name: &WellKnownName) -> Disposition {
        self.state.lock().release_name(&self.id, name)
    }

    /// Advertise an owned name over `transports`.
    pub fn advertise_name(&self, name: &WellKnownName, transports: TransportMask) -> Disposition {
        self.state.lock().advertise(&self.id, name, transports)
    }

    /// Withdraw an advertisement made by this attachment.
    pub fn cancel_advertise_name(&self, name: &WellKnownName) -> Disposition {
        self.state.lock().cancel_advertise(&self.id, name)
    }

    /// Start discovering names beginning with `prefix`. Current matches are
    /// reported immediately.
    pub fn find_advertised_name(&self, prefix: &str) -> Disposition {
        self.state.lock().find(&self.id, prefix)
    }

    /// Stop discovering `prefix`.
    pub fn cancel_find_advertised_name(&self, prefix: &str) -> Disposition {
        self.state.lock().cancel_find(&self.id, prefix)
    }

    /// Bind a session port; [`SessionPort::ANY`] picks a free one.
    pub fn bind_session_port(
        &self,
        port: SessionPort,
        options: SessionOptions,
        policy: Arc<dyn AcceptPolicy>,
    ) -> Result<SessionPort, Disposition> {
        self.state.lock().bind(&self.id, port, options, policy)
    }

    /// Unbind a session port. Existing sessions are unaffected.
    pub fn unbind_session_port(&self, port: SessionPort) -> Disposition {
        self.state.lock().unbind(&self.id, port)
    }

    /// Join the session hosted by `host` on `port`.
    ///
    /// The host's accept policy runs on this call path with the router
    /// unlocked; the binding is checked again before the joiner is placed,
    /// so a join racing an unbind fails with `NotFound`.
    pub fn join_session(
        &self,
        host: &WellKnownName,
        port: SessionPort,
        options: &SessionOptions,
    ) -> Result<SessionId, Disposition> {
        let ticket = self
            .state
            .lock()
            .prepare_join(&self.id, host, port, options)?;

        if !ticket.policy.accept(port, &self.id, options) {
            debug!(joiner = %self.id, host = %host, port = %port, "Join rejected by host policy");
            return Err(Disposition::Rejected);
        }

        self.state.lock().commit_join(&self.id, &ticket)
    }

    /// Leave one membership in `session_id`.
    pub fn leave_session(&self, session_id: SessionId) -> Disposition {
        self.state.lock().leave(&self.id, session_id)
    }

    /// Multicast a signal to the other members of `session_id`.
    ///
    /// Returns the number of peers the signal was delivered to.
    pub fn emit_signal(
        &self,
        session_id: SessionId,
        interface: &str,
        member: &str,
        payload: &[u8],
    ) -> Result<usize, Disposition> {
        self.state
            .lock()
            .emit(&self.id, session_id, interface, member, payload)
    }
}

impl std::fmt::Debug for BusAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusAttachment").field("id", &self.id).finish()
    }
}
