//! Session coordinator state and component-level operations.
//!
//! Each operation checks local bookkeeping first, calls the runtime, maps
//! the disposition, and only then records the outcome.

use std::sync::Arc;

use shared_types::entities::{validate_prefix, BusId, SessionId, SessionPort, WellKnownName};
use shared_types::ipc::Disposition;
use shared_types::policy::{AcceptPolicy, ContactPortOnly};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::domain::{
    CanonicalChange, ChannelConfig, ChannelState, CoordinatorEvent, DiscoveryEngine,
    JoinedSession, NameRegistry, ProtocolError, SessionOrigin, SessionPortBinder, SessionTable,
};
use crate::ports::{BusRuntime, ChannelStatus, SendOutcome};
use crate::service::messenger::MulticastMessenger;
use crate::service::signals::{SignalHandler, SignalTable};

/// Capacity of the observer event channel. Slow observers lag, the worker
/// never waits for them.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// The protocol state machine of one peer.
///
/// Owned by exactly one worker task (see [`spawn`](crate::service::spawn));
/// every method takes `&mut self`, so all protocol-affecting events are
/// applied in a single total order.
///
/// # Example
///
/// ```rust,ignore
/// let coordinator = SessionCoordinator::new(runtime, ChannelConfig::default())?
///     .with_signals(SignalTable::new().with("org.peerlink.chat", "Chat", on_chat)?);
/// let (handle, _task) = spawn(coordinator, notifications);
/// handle.connect().await?;
/// handle.host_channel("lobby").await?;
/// ```
pub struct SessionCoordinator {
    pub(crate) runtime: Arc<dyn BusRuntime>,
    pub(crate) config: ChannelConfig,
    pub(crate) policy: Arc<dyn AcceptPolicy>,
    pub(crate) local: BusId,
    pub(crate) connected: bool,
    pub(crate) stopping_discovery: bool,
    pub(crate) hosted_name: Option<WellKnownName>,
    pub(crate) hosted_port: Option<SessionPort>,
    pub(crate) names: NameRegistry,
    pub(crate) binder: SessionPortBinder,
    pub(crate) table: SessionTable,
    pub(crate) discovery: DiscoveryEngine,
    pub(crate) messenger: MulticastMessenger,
    pub(crate) state: ChannelState,
    pub(crate) events: broadcast::Sender<CoordinatorEvent>,
}

impl SessionCoordinator {
    /// Create a coordinator for `runtime`.
    ///
    /// The default admission policy accepts joiners on the contact port only.
    pub fn new(runtime: Arc<dyn BusRuntime>, config: ChannelConfig) -> Result<Self, ProtocolError> {
        config.validate()?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let local = runtime.unique_name();
        let messenger =
            MulticastMessenger::new(config.interface.clone(), config.member.clone(), SignalTable::new());
        Ok(Self {
            runtime,
            policy: Arc::new(ContactPortOnly(config.contact_port)),
            config,
            local,
            connected: false,
            stopping_discovery: false,
            hosted_name: None,
            hosted_port: None,
            names: NameRegistry::new(),
            binder: SessionPortBinder::new(),
            table: SessionTable::new(),
            discovery: DiscoveryEngine::new(),
            messenger,
            state: ChannelState::Idle,
            events,
        })
    }

    /// Replace the admission policy used when hosting.
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn AcceptPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the signal handler table.
    #[must_use]
    pub fn with_signals(mut self, signals: SignalTable) -> Self {
        self.messenger =
            MulticastMessenger::new(self.config.interface.clone(), self.config.member.clone(), signals);
        self
    }

    /// Register one more signal handler.
    pub fn register_handler(
        &mut self,
        interface: impl Into<String>,
        member: impl Into<String>,
        handler: impl SignalHandler + 'static,
    ) -> Result<(), ProtocolError> {
        self.messenger.register(interface, member, handler)
    }

    /// Subscribe to coordinator events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<CoordinatorEvent> {
        self.events.clone()
    }

    /// Our unique name.
    #[must_use]
    pub fn local(&self) -> &BusId {
        &self.local
    }

    /// Channel settings.
    #[must_use]
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Current channel state.
    #[must_use]
    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Canonical (send) session.
    #[must_use]
    pub fn canonical(&self) -> Option<SessionId> {
        self.table.canonical()
    }

    /// Snapshot of the protocol state.
    #[must_use]
    pub fn status(&self) -> ChannelStatus {
        ChannelStatus {
            unique_name: self.local.clone(),
            connected: self.connected,
            state: self.state,
            hosted_name: self.hosted_name.clone(),
            bound_port: self.hosted_port,
            canonical: self.table.canonical(),
            joined_sessions: self.table.joined_ids(),
            routing_sessions: self.table.routing_sessions(),
            found_names: self.discovery.found_names(),
            stopping_discovery: self.stopping_discovery,
            messenger: self.messenger.stats(),
        }
    }

    // =========================================================================
    // INTERNAL HELPERS
    // =========================================================================

    pub(crate) fn publish(&self, event: CoordinatorEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub(crate) fn publish_canonical(&self, change: Option<CanonicalChange>) {
        if let Some(change) = change {
            info!(previous = ?change.previous, current = ?change.current, "Canonical session changed");
            self.publish(CoordinatorEvent::CanonicalChanged {
                previous: change.previous,
                current: change.current,
            });
        }
    }

    /// Recompute the channel state and announce a transition.
    pub(crate) fn refresh_state(&mut self) {
        let hosted = self.hosted_name.as_ref();
        let next = ChannelState::derive(
            hosted.is_some_and(|n| self.names.is_owned(n)),
            self.hosted_port.is_some_and(|p| self.binder.is_bound(p)),
            hosted.is_some_and(|n| self.names.is_advertised(n)),
            !self.table.is_empty(),
        );
        if next != self.state {
            debug!(from = %self.state, to = %next, "Channel state changed");
            let from = std::mem::replace(&mut self.state, next);
            self.publish(CoordinatorEvent::ChannelStateChanged { from, to: next });
        }
    }

    pub(crate) fn ensure_connected(&self) -> Result<(), ProtocolError> {
        if self.connected {
            Ok(())
        } else {
            Err(ProtocolError::NotConnected)
        }
    }

    // =========================================================================
    // NAME REGISTRY
    // =========================================================================

    /// Request `name` without queueing.
    pub async fn request_name(&mut self, name: WellKnownName) -> Result<(), ProtocolError> {
        self.ensure_connected()?;
        self.names.check_request(&name)?;
        match self.runtime.request_name(&name).await {
            Disposition::Success => {
                debug!(name = %name, "Name acquired");
                self.names.record_owned(name);
                self.refresh_state();
                Ok(())
            }
            Disposition::AlreadyExists => Err(ProtocolError::NameConflict(name)),
            Disposition::Rejected => Err(ProtocolError::Rejected {
                operation: "request name",
            }),
            other => Err(ProtocolError::runtime("request name", other)),
        }
    }

    /// Release `name`. A name we do not hold, or one the runtime no longer
    /// knows, counts as released.
    pub async fn release_name(&mut self, name: WellKnownName) -> Result<(), ProtocolError> {
        self.ensure_connected()?;
        if !self.names.is_owned(&name) {
            debug!(name = %name, "Release of a name not held; nothing to do");
            return Ok(());
        }
        match self.runtime.release_name(&name).await {
            Disposition::Success | Disposition::NotFound => {
                debug!(name = %name, "Name released");
                self.names.record_released(&name);
                self.refresh_state();
                Ok(())
            }
            Disposition::Rejected => Err(ProtocolError::NotOwner(name)),
            other => Err(ProtocolError::runtime("release name", other)),
        }
    }

    /// Advertise an owned name over the configured transports.
    pub async fn advertise(&mut self, name: WellKnownName) -> Result<(), ProtocolError> {
        self.ensure_connected()?;
        self.names.check_advertise(&name)?;
        let transports = self.config.advertise_transports;
        match self.runtime.advertise_name(&name, transports).await {
            Disposition::Success => {
                debug!(name = %name, %transports, "Name advertised");
                self.names.record_advertised(name, transports);
                self.refresh_state();
                Ok(())
            }
            Disposition::AlreadyExists => Err(ProtocolError::invalid_state(
                "advertise",
                format!("{name} is already advertised"),
            )),
            Disposition::Rejected => Err(ProtocolError::Rejected {
                operation: "advertise",
            }),
            other => Err(ProtocolError::runtime("advertise", other)),
        }
    }

    /// Withdraw an advertisement.
    pub async fn cancel_advertise(&mut self, name: WellKnownName) -> Result<(), ProtocolError> {
        self.ensure_connected()?;
        match self.runtime.cancel_advertise_name(&name).await {
            Disposition::Success | Disposition::NotFound => {
                debug!(name = %name, "Advertisement cancelled");
                self.names.record_advert_cancelled(&name);
                self.refresh_state();
                Ok(())
            }
            other => Err(ProtocolError::runtime("cancel advertise", other)),
        }
    }

    // =========================================================================
    // DISCOVERY
    // =========================================================================

    /// Start discovering `prefix`.
    pub async fn find_prefix(&mut self, prefix: String) -> Result<(), ProtocolError> {
        self.ensure_connected()?;
        validate_prefix(&prefix)?;
        self.names.add_prefix(&prefix)?;
        match self.runtime.find_advertised_name(&prefix).await {
            Disposition::Success => {
                debug!(prefix = %prefix, "Discovery started");
                Ok(())
            }
            Disposition::AlreadyExists => {
                self.names.remove_prefix(&prefix);
                Err(ProtocolError::AlreadyDiscovering(prefix))
            }
            other => {
                self.names.remove_prefix(&prefix);
                Err(ProtocolError::runtime("find advertised name", other))
            }
        }
    }

    /// Stop discovering `prefix`. Best-effort: found events already in
    /// flight are dropped when they reach the worker.
    pub async fn cancel_prefix(&mut self, prefix: String) -> Result<(), ProtocolError> {
        self.ensure_connected()?;
        if !self.names.remove_prefix(&prefix) {
            debug!(prefix = %prefix, "Prefix not being discovered; nothing to cancel");
            return Ok(());
        }
        self.discovery.forget_prefix(&prefix);
        match self.runtime.cancel_find_advertised_name(&prefix).await {
            Disposition::Success | Disposition::NotFound => {
                debug!(prefix = %prefix, "Discovery cancelled");
                Ok(())
            }
            other => Err(ProtocolError::runtime("cancel find advertised name", other)),
        }
    }

    // =========================================================================
    // SESSION PORTS
    // =========================================================================

    /// Bind a session port with the configured options template.
    pub async fn bind_port(
        &mut self,
        hint: SessionPort,
        policy: Arc<dyn AcceptPolicy>,
    ) -> Result<SessionPort, ProtocolError> {
        self.ensure_connected()?;
        let gate = self.binder.prepare(hint, policy)?;
        let options = self.config.session_options;
        match self
            .runtime
            .bind_session_port(hint, options, Arc::new(gate.clone()))
            .await
        {
            Ok(port) => {
                debug!(port = %port, %options, "Session port bound");
                self.binder.record_bound(port, options, gate);
                self.refresh_state();
                Ok(port)
            }
            Err(Disposition::AlreadyExists) => Err(ProtocolError::AlreadyBound(hint)),
            Err(other) => Err(ProtocolError::runtime("bind session port", other)),
        }
    }

    /// Unbind a session port. The gate closes before the runtime is asked,
    /// so no join is admitted once this starts. Existing sessions survive.
    pub async fn unbind_port(&mut self, port: SessionPort) -> Result<(), ProtocolError> {
        self.ensure_connected()?;
        self.binder.close(port)?;
        match self.runtime.unbind_session_port(port).await {
            Disposition::Success | Disposition::NotFound => {
                debug!(port = %port, "Session port unbound");
                self.binder.remove(port);
                if self.hosted_port == Some(port) {
                    self.hosted_port = None;
                }
                self.refresh_state();
                Ok(())
            }
            other => Err(ProtocolError::runtime("unbind session port", other)),
        }
    }

    // =========================================================================
    // SESSIONS
    // =========================================================================

    /// Explicitly join `host` on `port`. In-flight joins cannot be cancelled.
    pub async fn join_session(
        &mut self,
        host: WellKnownName,
        port: SessionPort,
    ) -> Result<SessionId, ProtocolError> {
        self.ensure_connected()?;
        if let Some(id) = self.table.joined_to(&host) {
            return Err(ProtocolError::invalid_state(
                "join",
                format!("already joined {host} as session {id}"),
            ));
        }
        let options = self.config.session_options;
        info!(host = %host, port = %port, "Joining session");
        match self.runtime.join_session(&host, port, &options).await {
            Ok(id) => {
                info!(host = %host, session_id = %id, "Joined session");
                let change = self.table.record_joined(JoinedSession {
                    id,
                    host,
                    port,
                    options,
                });
                self.publish(CoordinatorEvent::SessionJoined {
                    session_id: id,
                    origin: SessionOrigin::Explicit,
                });
                self.publish_canonical(change);
                self.refresh_state();
                Ok(id)
            }
            Err(Disposition::AlreadyExists) => Err(ProtocolError::invalid_state(
                "join",
                format!("already a member of {host}"),
            )),
            Err(Disposition::Rejected) => Err(ProtocolError::Rejected { operation: "join" }),
            Err(Disposition::BadOptions) => Err(ProtocolError::IncompatibleOptions(host)),
            Err(Disposition::NotFound | Disposition::Failed) => Err(ProtocolError::Unreachable(host)),
            Err(other) => Err(ProtocolError::runtime("join session", other)),
        }
    }

    /// Leave one membership of `session_id`: the explicit one if we hold it,
    /// otherwise the routing one. Unknown ids are a no-op.
    pub async fn leave_session(&mut self, session_id: SessionId) -> Result<(), ProtocolError> {
        self.ensure_connected()?;
        let origin = if self.table.is_joined(session_id) {
            SessionOrigin::Explicit
        } else if self.table.is_hosted(session_id) {
            SessionOrigin::Implicit
        } else {
            debug!(session_id = %session_id, "Leave of an unknown session; nothing to do");
            return Ok(());
        };

        match self.runtime.leave_session(session_id).await {
            Disposition::Success | Disposition::NotFound => {}
            other => return Err(ProtocolError::runtime("leave session", other)),
        }

        info!(session_id = %session_id, ?origin, "Left session");
        match origin {
            SessionOrigin::Explicit => {
                let change = self.table.remove_joined(session_id);
                self.publish_canonical(change);
            }
            SessionOrigin::Implicit => {
                self.table.remove_hosted(session_id);
            }
        }
        self.refresh_state();
        Ok(())
    }

    // =========================================================================
    // MESSAGING
    // =========================================================================

    /// Send on the canonical session.
    pub async fn send(&mut self, payload: Vec<u8>) -> Result<SendOutcome, ProtocolError> {
        self.ensure_connected()?;
        let canonical = self.table.canonical();
        self.messenger
            .send(self.runtime.as_ref(), canonical, &payload)
            .await
    }
}
