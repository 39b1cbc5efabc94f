//! # In-Memory Router
//!
//! An in-process routing daemon. Every [`BusAttachment`] created by
//! [`InMemoryRouter::attach`] shares one routing table guarded by a single
//! lock; notifications leave the lock through per-attachment unbounded
//! queues, so no call ever blocks on a consumer.
//!
//! ## Session model
//!
//! - A multipoint port hosts at most one live session; later joiners are
//!   added to it and receive the same id.
//! - A point-to-point join always creates a fresh session.
//! - Membership is a list of endpoints `(peer, role)`. A host that joins its
//!   own multipoint port holds two endpoints in the same session.
//! - A session ends when fewer than two endpoints remain; every remaining
//!   peer receives one `SessionLost`.
//! - A signal reaches every member peer once; the sender hears its own
//!   signal only when it holds a second endpoint in the session.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use shared_types::entities::{Advertisement, BusId, SessionId, SessionPort, WellKnownName};
use shared_types::ipc::{BusNotification, Disposition, InboundSignal};
use shared_types::policy::AcceptPolicy;
use shared_types::session::{SessionOptions, TransportMask};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::attachment::BusAttachment;
use crate::notifications::NotificationStream;
use crate::FIRST_DYNAMIC_PORT;

/// Snapshot of router bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    /// Attachments created and not dropped by shutdown.
    pub attachments: usize,
    /// Attachments currently connected.
    pub connected: usize,
    /// Well-known names currently owned.
    pub names: usize,
    /// Names currently advertised.
    pub advertisements: usize,
    /// Live sessions.
    pub sessions: usize,
    /// Signal deliveries performed since start.
    pub signals_routed: u64,
}

/// In-process routing daemon shared by any number of attachments.
#[derive(Clone)]
pub struct InMemoryRouter {
    state: Arc<Mutex<RouterState>>,
}

impl InMemoryRouter {
    /// Create a router with a fresh guid.
    #[must_use]
    pub fn new() -> Self {
        let guid: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
        info!(guid = %guid, "Router started");
        Self {
            state: Arc::new(Mutex::new(RouterState::new(guid))),
        }
    }

    /// Create a new attachment and the stream of notifications addressed to it.
    ///
    /// The attachment starts disconnected.
    #[must_use]
    pub fn attach(&self) -> (BusAttachment, NotificationStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.state.lock().attach(tx);
        debug!(unique_name = %id, "Attachment created");
        (
            BusAttachment::new(id.clone(), self.state.clone()),
            NotificationStream::new(id, rx),
        )
    }

    /// Stop the router: every attachment receives `BusStopping`, then all
    /// state is dropped and every later call fails.
    pub fn shutdown(&self) {
        self.state.lock().shutdown();
        info!("Router stopped");
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }

    /// Router guid, the prefix of every unique name it issues.
    #[must_use]
    pub fn guid(&self) -> String {
        self.state.lock().guid.clone()
    }

    /// Current bookkeeping counters.
    #[must_use]
    pub fn stats(&self) -> RouterStats {
        self.state.lock().stats()
    }
}

impl Default for InMemoryRouter {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ROUTING TABLE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Host,
    Joiner,
}

#[derive(Debug, Clone)]
struct Endpoint {
    peer: BusId,
    role: Role,
}

struct SessionEntry {
    host: BusId,
    port: SessionPort,
    endpoints: Vec<Endpoint>,
}

struct Binding {
    generation: u64,
    options: SessionOptions,
    policy: Arc<dyn AcceptPolicy>,
    hosted: Option<SessionId>,
}

struct PeerEntry {
    connected: bool,
    tx: mpsc::UnboundedSender<BusNotification>,
    finds: BTreeSet<String>,
    ports: BTreeMap<SessionPort, Binding>,
}

struct Advertised {
    owner: BusId,
    transports: TransportMask,
}

/// Admission work handed back to the joiner between the two phases of a join.
pub(crate) struct JoinTicket {
    pub(crate) host: BusId,
    pub(crate) port: SessionPort,
    pub(crate) generation: u64,
    pub(crate) policy: Arc<dyn AcceptPolicy>,
}

pub(crate) struct RouterState {
    guid: String,
    stopped: bool,
    next_serial: u32,
    next_session: u32,
    next_generation: u64,
    peers: HashMap<BusId, PeerEntry>,
    owners: BTreeMap<WellKnownName, BusId>,
    adverts: BTreeMap<WellKnownName, Advertised>,
    sessions: BTreeMap<SessionId, SessionEntry>,
    signals_routed: u64,
}

impl RouterState {
    fn new(guid: String) -> Self {
        Self {
            guid,
            stopped: false,
            next_serial: 1,
            next_session: 1,
            next_generation: 1,
            peers: HashMap::new(),
            owners: BTreeMap::new(),
            adverts: BTreeMap::new(),
            sessions: BTreeMap::new(),
            signals_routed: 0,
        }
    }

    fn attach(&mut self, tx: mpsc::UnboundedSender<BusNotification>) -> BusId {
        let id = BusId::new(&self.guid, self.next_serial);
        self.next_serial = self.next_serial.wrapping_add(1);
        if !self.stopped {
            self.peers.insert(
                id.clone(),
                PeerEntry {
                    connected: false,
                    tx,
                    finds: BTreeSet::new(),
                    ports: BTreeMap::new(),
                },
            );
        }
        id
    }

    fn stats(&self) -> RouterStats {
        RouterStats {
            attachments: self.peers.len(),
            connected: self.peers.values().filter(|p| p.connected).count(),
            names: self.owners.len(),
            advertisements: self.adverts.len(),
            sessions: self.sessions.len(),
            signals_routed: self.signals_routed,
        }
    }

    pub(crate) fn is_connected(&self, id: &BusId) -> bool {
        !self.stopped && self.peers.get(id).is_some_and(|p| p.connected)
    }

    fn notify(&self, peer: &BusId, notification: BusNotification) {
        let Some(entry) = self.peers.get(peer) else {
            return;
        };
        let kind = notification.kind();
        if entry.tx.send(notification).is_err() {
            trace!(peer = %peer, kind, "Notification dropped (stream closed)");
        }
    }

    fn broadcast_owner_change(
        &self,
        name: &WellKnownName,
        previous_owner: Option<BusId>,
        new_owner: Option<BusId>,
    ) {
        let connected: Vec<BusId> = self
            .peers
            .iter()
            .filter(|(_, p)| p.connected)
            .map(|(id, _)| id.clone())
            .collect();
        for peer in connected {
            self.notify(
                &peer,
                BusNotification::NameOwnerChanged {
                    name: name.clone(),
                    previous_owner: previous_owner.clone(),
                    new_owner: new_owner.clone(),
                },
            );
        }
    }

    /// Send found (or lost) for `name` to every connected finder whose
    /// prefix matches, once per matching prefix.
    fn announce(&self, name: &WellKnownName, transports: TransportMask, found: bool) {
        for (peer, entry) in &self.peers {
            if !entry.connected {
                continue;
            }
            for prefix in entry.finds.iter().filter(|p| name.has_prefix(p)) {
                let advert = Advertisement::new(name.clone(), transports, prefix.clone());
                let notification = if found {
                    BusNotification::FoundAdvertisedName(advert)
                } else {
                    BusNotification::LostAdvertisedName(advert)
                };
                self.notify(peer, notification);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    pub(crate) fn connect(&mut self, id: &BusId) -> Disposition {
        if self.stopped {
            return Disposition::Failed;
        }
        match self.peers.get_mut(id) {
            Some(entry) if entry.connected => Disposition::AlreadyExists,
            Some(entry) => {
                entry.connected = true;
                Disposition::Success
            }
            None => Disposition::Failed,
        }
    }

    /// Drop everything the attachment holds: memberships, bindings,
    /// advertisements, names and discovery prefixes.
    pub(crate) fn disconnect(&mut self, id: &BusId) -> Disposition {
        if !self.is_connected(id) {
            return Disposition::Failed;
        }

        let memberships: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|(_, s)| s.endpoints.iter().any(|e| e.peer == *id))
            .map(|(sid, _)| *sid)
            .collect();
        for session_id in memberships {
            if let Some(session) = self.sessions.get_mut(&session_id) {
                session.endpoints.retain(|e| e.peer != *id);
            }
            self.settle(session_id);
        }

        let advertised: Vec<WellKnownName> = self
            .adverts
            .iter()
            .filter(|(_, a)| a.owner == *id)
            .map(|(n, _)| n.clone())
            .collect();
        for name in advertised {
            if let Some(advert) = self.adverts.remove(&name) {
                self.announce(&name, advert.transports, false);
            }
        }

        let owned: Vec<WellKnownName> = self
            .owners
            .iter()
            .filter(|(_, owner)| *owner == id)
            .map(|(n, _)| n.clone())
            .collect();
        for name in owned {
            self.owners.remove(&name);
            self.broadcast_owner_change(&name, Some(id.clone()), None);
        }

        if let Some(entry) = self.peers.get_mut(id) {
            entry.connected = false;
            entry.finds.clear();
            entry.ports.clear();
        }
        Disposition::Success
    }

    fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        for peer in self.peers.keys() {
            self.notify(peer, BusNotification::BusStopping);
        }
        self.stopped = true;
        self.peers.clear();
        self.owners.clear();
        self.adverts.clear();
        self.sessions.clear();
    }

    // -------------------------------------------------------------------------
    // Names and advertisements
    // -------------------------------------------------------------------------

    pub(crate) fn request_name(&mut self, id: &BusId, name: &WellKnownName) -> Disposition {
        if !self.is_connected(id) {
            return Disposition::Failed;
        }
        if self.owners.contains_key(name) {
            return Disposition::AlreadyExists;
        }
        self.owners.insert(name.clone(), id.clone());
        self.broadcast_owner_change(name, None, Some(id.clone()));
        Disposition::Success
    }

    pub(crate) fn release_name(&mut self, id: &BusId, name: &WellKnownName) -> Disposition {
        if !self.is_connected(id) {
            return Disposition::Failed;
        }
        match self.owners.get(name) {
            None => return Disposition::NotFound,
            Some(owner) if owner != id => return Disposition::Rejected,
            Some(_) => {}
        }
        self.owners.remove(name);
        if let Some(advert) = self.adverts.remove(name) {
            self.announce(name, advert.transports, false);
        }
        self.broadcast_owner_change(name, Some(id.clone()), None);
        Disposition::Success
    }

    pub(crate) fn advertise(
        &mut self,
        id: &BusId,
        name: &WellKnownName,
        transports: TransportMask,
    ) -> Disposition {
        if !self.is_connected(id) {
            return Disposition::Failed;
        }
        if self.owners.get(name) != Some(id) {
            return Disposition::Rejected;
        }
        if transports.is_empty() {
            return Disposition::BadOptions;
        }
        if self.adverts.contains_key(name) {
            return Disposition::AlreadyExists;
        }
        self.adverts.insert(
            name.clone(),
            Advertised {
                owner: id.clone(),
                transports,
            },
        );
        self.announce(name, transports, true);
        Disposition::Success
    }

    pub(crate) fn cancel_advertise(&mut self, id: &BusId, name: &WellKnownName) -> Disposition {
        if !self.is_connected(id) {
            return Disposition::Failed;
        }
        match self.adverts.get(name) {
            Some(advert) if advert.owner == *id => {}
            _ => return Disposition::NotFound,
        }
        if let Some(advert) = self.adverts.remove(name) {
            self.announce(name, advert.transports, false);
        }
        Disposition::Success
    }

    /// Register a discovery prefix and replay every current match.
    pub(crate) fn find(&mut self, id: &BusId, prefix: &str) -> Disposition {
        if !self.is_connected(id) {
            return Disposition::Failed;
        }
        let Some(entry) = self.peers.get_mut(id) else {
            return Disposition::Failed;
        };
        if !entry.finds.insert(prefix.to_string()) {
            return Disposition::AlreadyExists;
        }
        for (name, advert) in self.adverts.iter().filter(|(n, _)| n.has_prefix(prefix)) {
            self.notify(
                id,
                BusNotification::FoundAdvertisedName(Advertisement::new(
                    name.clone(),
                    advert.transports,
                    prefix,
                )),
            );
        }
        Disposition::Success
    }

    pub(crate) fn cancel_find(&mut self, id: &BusId, prefix: &str) -> Disposition {
        if !self.is_connected(id) {
            return Disposition::Failed;
        }
        let removed = self
            .peers
            .get_mut(id)
            .is_some_and(|entry| entry.finds.remove(prefix));
        if removed {
            Disposition::Success
        } else {
            Disposition::NotFound
        }
    }

    // -------------------------------------------------------------------------
    // Ports
    // -------------------------------------------------------------------------

    pub(crate) fn bind(
        &mut self,
        id: &BusId,
        port: SessionPort,
        options: SessionOptions,
        policy: Arc<dyn AcceptPolicy>,
    ) -> Result<SessionPort, Disposition> {
        if !self.is_connected(id) {
            return Err(Disposition::Failed);
        }
        let generation = self.next_generation;
        let Some(entry) = self.peers.get_mut(id) else {
            return Err(Disposition::Failed);
        };
        let port = if port.is_any() {
            (FIRST_DYNAMIC_PORT..=u16::MAX)
                .map(SessionPort::new)
                .find(|p| !entry.ports.contains_key(p))
                .ok_or(Disposition::Failed)?
        } else if entry.ports.contains_key(&port) {
            return Err(Disposition::AlreadyExists);
        } else {
            port
        };
        entry.ports.insert(
            port,
            Binding {
                generation,
                options,
                policy,
                hosted: None,
            },
        );
        self.next_generation += 1;
        Ok(port)
    }

    /// Remove a binding. Sessions created under it are unaffected.
    pub(crate) fn unbind(&mut self, id: &BusId, port: SessionPort) -> Disposition {
        if !self.is_connected(id) {
            return Disposition::Failed;
        }
        let removed = self
            .peers
            .get_mut(id)
            .and_then(|entry| entry.ports.remove(&port))
            .is_some();
        if removed {
            Disposition::Success
        } else {
            Disposition::NotFound
        }
    }

    // -------------------------------------------------------------------------
    // Sessions
    // -------------------------------------------------------------------------

    /// First phase of a join: validate the target and hand out the policy.
    pub(crate) fn prepare_join(
        &self,
        id: &BusId,
        host_name: &WellKnownName,
        port: SessionPort,
        options: &SessionOptions,
    ) -> Result<JoinTicket, Disposition> {
        if !self.is_connected(id) {
            return Err(Disposition::Failed);
        }
        let host = self.owners.get(host_name).ok_or(Disposition::NotFound)?;
        let binding = self
            .peers
            .get(host)
            .and_then(|p| p.ports.get(&port))
            .ok_or(Disposition::NotFound)?;
        if !options.is_compatible(&binding.options) {
            return Err(Disposition::BadOptions);
        }
        let already_member = binding
            .hosted
            .and_then(|sid| self.sessions.get(&sid))
            .is_some_and(|s| {
                s.endpoints
                    .iter()
                    .any(|e| e.peer == *id && e.role == Role::Joiner)
            });
        if already_member {
            return Err(Disposition::AlreadyExists);
        }
        Ok(JoinTicket {
            host: host.clone(),
            port,
            generation: binding.generation,
            policy: binding.policy.clone(),
        })
    }

    /// Second phase of an admitted join: place the joiner in a session and
    /// tell the host.
    pub(crate) fn commit_join(
        &mut self,
        id: &BusId,
        ticket: &JoinTicket,
    ) -> Result<SessionId, Disposition> {
        if !self.is_connected(id) || !self.is_connected(&ticket.host) {
            return Err(Disposition::NotFound);
        }
        let (multipoint, hosted) = match self
            .peers
            .get(&ticket.host)
            .and_then(|p| p.ports.get(&ticket.port))
        {
            Some(b) if b.generation == ticket.generation => (b.options.multipoint, b.hosted),
            _ => return Err(Disposition::NotFound),
        };

        let existing = if multipoint {
            hosted.filter(|sid| self.sessions.contains_key(sid))
        } else {
            None
        };

        let session_id = match existing {
            Some(session_id) => {
                if let Some(session) = self.sessions.get_mut(&session_id) {
                    session.endpoints.push(Endpoint {
                        peer: id.clone(),
                        role: Role::Joiner,
                    });
                }
                session_id
            }
            None => {
                let session_id = self.allocate_session_id();
                self.sessions.insert(
                    session_id,
                    SessionEntry {
                        host: ticket.host.clone(),
                        port: ticket.port,
                        endpoints: vec![
                            Endpoint {
                                peer: ticket.host.clone(),
                                role: Role::Host,
                            },
                            Endpoint {
                                peer: id.clone(),
                                role: Role::Joiner,
                            },
                        ],
                    },
                );
                if multipoint {
                    if let Some(binding) = self
                        .peers
                        .get_mut(&ticket.host)
                        .and_then(|p| p.ports.get_mut(&ticket.port))
                    {
                        binding.hosted = Some(session_id);
                    }
                }
                session_id
            }
        };

        debug!(
            session_id = %session_id,
            host = %ticket.host,
            joiner = %id,
            port = %ticket.port,
            "Joiner admitted"
        );
        self.notify(
            &ticket.host,
            BusNotification::SessionJoined {
                port: ticket.port,
                session_id,
                joiner: id.clone(),
            },
        );
        Ok(session_id)
    }

    fn allocate_session_id(&mut self) -> SessionId {
        loop {
            let candidate = SessionId::new(self.next_session);
            self.next_session = self.next_session.wrapping_add(1).max(1);
            if !self.sessions.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// Remove one endpoint of the caller: its joiner endpoint when it has
    /// one, otherwise its host endpoint.
    pub(crate) fn leave(&mut self, id: &BusId, session_id: SessionId) -> Disposition {
        if !self.is_connected(id) {
            return Disposition::Failed;
        }
        let Some(session) = self.sessions.get_mut(&session_id) else {
            return Disposition::NotFound;
        };
        let position = session
            .endpoints
            .iter()
            .position(|e| e.peer == *id && e.role == Role::Joiner)
            .or_else(|| session.endpoints.iter().position(|e| e.peer == *id));
        let Some(position) = position else {
            return Disposition::NotFound;
        };
        session.endpoints.remove(position);
        self.settle(session_id);
        Disposition::Success
    }

    /// End the session if fewer than two endpoints remain, and detach it
    /// from its binding once the host endpoint is gone.
    fn settle(&mut self, session_id: SessionId) {
        let Some(session) = self.sessions.get(&session_id) else {
            return;
        };
        let host_present = session
            .endpoints
            .iter()
            .any(|e| e.role == Role::Host && e.peer == session.host);
        let ended = session.endpoints.len() < 2;

        if ended || !host_present {
            let (host, port) = (session.host.clone(), session.port);
            if let Some(binding) = self.peers.get_mut(&host).and_then(|p| p.ports.get_mut(&port)) {
                if binding.hosted == Some(session_id) {
                    binding.hosted = None;
                }
            }
        }
        if !ended {
            return;
        }

        if let Some(session) = self.sessions.remove(&session_id) {
            let remaining: BTreeSet<BusId> =
                session.endpoints.into_iter().map(|e| e.peer).collect();
            debug!(session_id = %session_id, remaining = remaining.len(), "Session ended");
            for peer in remaining {
                self.notify(&peer, BusNotification::SessionLost { session_id });
            }
        }
    }

    /// Deliver a signal to every member peer once, skipping one endpoint of
    /// the sender. Returns the number of deliveries.
    pub(crate) fn emit(
        &mut self,
        id: &BusId,
        session_id: SessionId,
        interface: &str,
        member: &str,
        payload: &[u8],
    ) -> Result<usize, Disposition> {
        if !self.is_connected(id) {
            return Err(Disposition::Failed);
        }
        let session = self.sessions.get(&session_id).ok_or(Disposition::NotFound)?;

        let mut counts: BTreeMap<&BusId, usize> = BTreeMap::new();
        for endpoint in &session.endpoints {
            *counts.entry(&endpoint.peer).or_insert(0) += 1;
        }
        match counts.get_mut(id) {
            Some(count) => *count -= 1,
            None => return Err(Disposition::NotFound),
        }
        let recipients: Vec<BusId> = counts
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(peer, _)| peer.clone())
            .collect();

        for peer in &recipients {
            self.notify(
                peer,
                BusNotification::Signal(InboundSignal {
                    sender: id.clone(),
                    session_id,
                    interface: interface.to_string(),
                    member: member.to_string(),
                    payload: payload.to_vec(),
                }),
            );
        }
        self.signals_routed += recipients.len() as u64;
        trace!(
            session_id = %session_id,
            sender = %id,
            recipients = recipients.len(),
            "Signal routed"
        );
        Ok(recipients.len())
    }
}
