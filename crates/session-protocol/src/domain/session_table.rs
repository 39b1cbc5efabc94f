//! # Session Table
//!
//! Two views of session membership, never merged:
//!
//! - **joined**: sessions this peer joined explicitly. One of them is the
//!   *canonical* session, the only target for outbound sends.
//! - **hosted**: sessions created implicitly when a joiner was admitted on one
//!   of our bound ports. They are routing paths for inbound traffic only.
//!
//! A host that joins its own multipoint channel sees the same id in both
//! views.
//!
//! ## Canonical selection
//!
//! Every successful explicit join becomes canonical, so the channel joined
//! last is the one sent on. When the canonical session is left or lost, the
//! lowest remaining explicit id is promoted.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use shared_types::entities::{BusId, SessionId, SessionPort, WellKnownName};
use shared_types::session::SessionOptions;

use super::errors::ProtocolError;
use super::port_binder::SessionPortBinder;

/// How a session came to exist for this peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOrigin {
    /// We joined it.
    Explicit,
    /// A joiner was admitted on one of our ports.
    Implicit,
}

/// A session joined explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedSession {
    /// Session id returned by the join.
    pub id: SessionId,
    /// Well-known name of the host.
    pub host: WellKnownName,
    /// Contact port used.
    pub port: SessionPort,
    /// Options requested.
    pub options: SessionOptions,
}

/// A session created implicitly on one of our ports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedSession {
    /// Session id reported by `sessionJoined`.
    pub id: SessionId,
    /// Bound port that admitted the joiners.
    pub port: SessionPort,
    /// Unique names of admitted joiners.
    pub joiners: BTreeSet<BusId>,
}

/// Change of the canonical session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalChange {
    /// Canonical id before the change.
    pub previous: Option<SessionId>,
    /// Canonical id after the change.
    pub current: Option<SessionId>,
}

/// What a `sessionLost` removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LostOutcome {
    /// The id was in the joined view.
    pub was_joined: bool,
    /// The id was in the hosted view.
    pub was_hosted: bool,
    /// Canonical change caused by the loss, if any.
    pub canonical: Option<CanonicalChange>,
}

impl LostOutcome {
    /// Whether the id was known at all.
    #[must_use]
    pub fn is_known(&self) -> bool {
        self.was_joined || self.was_hosted
    }
}

/// Active sessions of one peer.
#[derive(Debug, Default)]
pub struct SessionTable {
    joined: BTreeMap<SessionId, JoinedSession>,
    hosted: BTreeMap<SessionId, HostedSession>,
    canonical: Option<SessionId>,
}

impl SessionTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The session used for outbound sends.
    #[must_use]
    pub fn canonical(&self) -> Option<SessionId> {
        self.canonical
    }

    /// Record an explicit join and make it canonical. Returns the canonical
    /// change, if the id differs from the current one.
    pub fn record_joined(&mut self, session: JoinedSession) -> Option<CanonicalChange> {
        let id = session.id;
        self.joined.insert(id, session);
        let previous = self.canonical.replace(id);
        (previous != Some(id)).then_some(CanonicalChange {
            previous,
            current: Some(id),
        })
    }

    /// Record an admitted joiner on a bound port.
    ///
    /// Fails when the port is no longer admitting joiners; the caller must
    /// then leave the session instead of tracking it. Returns whether this
    /// created a new routing session.
    pub fn record_implicit(
        &mut self,
        binder: &SessionPortBinder,
        port: SessionPort,
        id: SessionId,
        joiner: BusId,
    ) -> Result<bool, ProtocolError> {
        if !binder.admits(port) {
            return Err(ProtocolError::invalid_state(
                "accept joiner",
                format!("port {port} is not bound"),
            ));
        }
        let mut created = false;
        let entry = self.hosted.entry(id).or_insert_with(|| {
            created = true;
            HostedSession {
                id,
                port,
                joiners: BTreeSet::new(),
            }
        });
        entry.joiners.insert(joiner);
        Ok(created)
    }

    /// Drop an explicit membership after leaving it.
    pub fn remove_joined(&mut self, id: SessionId) -> Option<CanonicalChange> {
        self.joined.remove(&id)?;
        self.promote_if_canonical(id)
    }

    /// Drop a routing session after leaving it.
    pub fn remove_hosted(&mut self, id: SessionId) -> bool {
        self.hosted.remove(&id).is_some()
    }

    /// Remove `id` from both views.
    pub fn on_lost(&mut self, id: SessionId) -> LostOutcome {
        let was_joined = self.joined.remove(&id).is_some();
        let was_hosted = self.hosted.remove(&id).is_some();
        let canonical = if was_joined {
            self.promote_if_canonical(id)
        } else {
            None
        };
        LostOutcome {
            was_joined,
            was_hosted,
            canonical,
        }
    }

    fn promote_if_canonical(&mut self, removed: SessionId) -> Option<CanonicalChange> {
        if self.canonical != Some(removed) {
            return None;
        }
        self.canonical = self.joined.keys().next().copied();
        Some(CanonicalChange {
            previous: Some(removed),
            current: self.canonical,
        })
    }

    /// Explicit session joined to `host`, if any.
    #[must_use]
    pub fn joined_to(&self, host: &WellKnownName) -> Option<SessionId> {
        self.joined
            .values()
            .find(|s| s.host == *host)
            .map(|s| s.id)
    }

    /// Whether `id` is in the joined view.
    #[must_use]
    pub fn is_joined(&self, id: SessionId) -> bool {
        self.joined.contains_key(&id)
    }

    /// Whether `id` is in the hosted view.
    #[must_use]
    pub fn is_hosted(&self, id: SessionId) -> bool {
        self.hosted.contains_key(&id)
    }

    /// Look up an explicit session.
    #[must_use]
    pub fn joined(&self, id: SessionId) -> Option<&JoinedSession> {
        self.joined.get(&id)
    }

    /// Look up a routing session.
    #[must_use]
    pub fn hosted(&self, id: SessionId) -> Option<&HostedSession> {
        self.hosted.get(&id)
    }

    /// Explicit session ids, in order.
    #[must_use]
    pub fn joined_ids(&self) -> Vec<SessionId> {
        self.joined.keys().copied().collect()
    }

    /// Routing (implicit) session ids, in order.
    #[must_use]
    pub fn routing_sessions(&self) -> Vec<SessionId> {
        self.hosted.keys().copied().collect()
    }

    /// Every membership this peer holds: explicit ones first, then routing
    /// ones. An id present in both views appears twice.
    #[must_use]
    pub fn memberships(&self) -> Vec<(SessionId, SessionOrigin)> {
        self.joined
            .keys()
            .map(|id| (*id, SessionOrigin::Explicit))
            .chain(self.hosted.keys().map(|id| (*id, SessionOrigin::Implicit)))
            .collect()
    }

    /// Whether any membership exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.joined.is_empty() && self.hosted.is_empty()
    }

    /// Drop everything.
    pub fn clear(&mut self) -> Option<CanonicalChange> {
        self.joined.clear();
        self.hosted.clear();
        let previous = self.canonical.take();
        previous.map(|previous| CanonicalChange {
            previous: Some(previous),
            current: None,
        })
    }
}
