//! # Name Registry
//!
//! Local bookkeeping of the well-known names this peer owns and advertises,
//! and of the prefixes it is discovering. The registry never talks to the
//! runtime; the coordinator consults it before a runtime call and records
//! the outcome after.

use std::collections::{BTreeMap, BTreeSet};

use shared_types::entities::{BusId, WellKnownName};
use shared_types::session::TransportMask;

use super::errors::ProtocolError;

/// Names owned and advertised by this peer, plus active discovery prefixes.
#[derive(Debug, Default)]
pub struct NameRegistry {
    owned: BTreeSet<WellKnownName>,
    advertised: BTreeMap<WellKnownName, TransportMask>,
    prefixes: BTreeSet<String>,
}

impl NameRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A name we already hold cannot be requested again.
    pub fn check_request(&self, name: &WellKnownName) -> Result<(), ProtocolError> {
        if self.owned.contains(name) {
            return Err(ProtocolError::NameConflict(name.clone()));
        }
        Ok(())
    }

    /// Record a successful name request.
    pub fn record_owned(&mut self, name: WellKnownName) {
        self.owned.insert(name);
    }

    /// Forget a name and its advertisement. Returns whether it was held.
    pub fn record_released(&mut self, name: &WellKnownName) -> bool {
        self.advertised.remove(name);
        self.owned.remove(name)
    }

    /// Whether this peer believes it owns `name`.
    #[must_use]
    pub fn is_owned(&self, name: &WellKnownName) -> bool {
        self.owned.contains(name)
    }

    /// Only owned names may be advertised.
    pub fn check_advertise(&self, name: &WellKnownName) -> Result<(), ProtocolError> {
        if !self.owned.contains(name) {
            return Err(ProtocolError::NotAdvertisable(name.clone()));
        }
        Ok(())
    }

    /// Record a successful advertisement.
    pub fn record_advertised(&mut self, name: WellKnownName, transports: TransportMask) {
        self.advertised.insert(name, transports);
    }

    /// Record a cancelled advertisement.
    pub fn record_advert_cancelled(&mut self, name: &WellKnownName) -> Option<TransportMask> {
        self.advertised.remove(name)
    }

    /// Whether `name` is currently advertised by this peer.
    #[must_use]
    pub fn is_advertised(&self, name: &WellKnownName) -> bool {
        self.advertised.contains_key(name)
    }

    /// Owned names, in order.
    pub fn owned_names(&self) -> impl Iterator<Item = &WellKnownName> {
        self.owned.iter()
    }

    /// Advertised names, in order.
    pub fn advertised_names(&self) -> impl Iterator<Item = &WellKnownName> {
        self.advertised.keys()
    }

    /// Register a discovery prefix.
    pub fn add_prefix(&mut self, prefix: &str) -> Result<(), ProtocolError> {
        if !self.prefixes.insert(prefix.to_string()) {
            return Err(ProtocolError::AlreadyDiscovering(prefix.to_string()));
        }
        Ok(())
    }

    /// Drop a discovery prefix. Returns whether it was registered.
    pub fn remove_prefix(&mut self, prefix: &str) -> bool {
        self.prefixes.remove(prefix)
    }

    /// Whether `prefix` is being discovered.
    #[must_use]
    pub fn is_discovering(&self, prefix: &str) -> bool {
        self.prefixes.contains(prefix)
    }

    /// Active discovery prefixes, in order.
    pub fn prefixes(&self) -> impl Iterator<Item = &String> {
        self.prefixes.iter()
    }

    /// Apply a name-owner change. If ownership of a name we hold moved to
    /// someone else, forget it. Returns whether the registry changed.
    pub fn on_owner_changed(
        &mut self,
        name: &WellKnownName,
        new_owner: Option<&BusId>,
        local: &BusId,
    ) -> bool {
        if new_owner == Some(local) || !self.owned.contains(name) {
            return false;
        }
        self.record_released(name)
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.owned.clear();
        self.advertised.clear();
        self.prefixes.clear();
    }
}
