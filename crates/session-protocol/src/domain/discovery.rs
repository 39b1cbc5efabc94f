//! # Discovery Engine
//!
//! Normalizes the runtime's found/lost stream:
//!
//! - events for a prefix that is no longer registered are dropped
//!   (`cancelPrefix` is best-effort, so stragglers are expected)
//! - a duplicate found for the same `(name, prefix)` is collapsed
//! - a lost without a preceding found is swallowed
//!
//! Own advertisements are *not* filtered here; that is the coordinator's
//! decision.

use std::collections::{BTreeMap, BTreeSet};

use shared_types::entities::{Advertisement, WellKnownName};

use super::name_registry::NameRegistry;

/// Found/lost normalizer keyed by `(name, prefix)`.
#[derive(Debug, Default)]
pub struct DiscoveryEngine {
    found: BTreeMap<WellKnownName, BTreeSet<String>>,
}

impl DiscoveryEngine {
    /// Create an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a found event. Returns the advertisement if it is new.
    pub fn on_found(
        &mut self,
        registry: &NameRegistry,
        advert: Advertisement,
    ) -> Option<Advertisement> {
        if !registry.is_discovering(&advert.prefix) {
            return None;
        }
        let prefixes = self.found.entry(advert.name.clone()).or_default();
        if !prefixes.insert(advert.prefix.clone()) {
            return None;
        }
        Some(advert)
    }

    /// Feed a lost event. Returns the advertisement if a found preceded it.
    pub fn on_lost(&mut self, advert: Advertisement) -> Option<Advertisement> {
        let prefixes = self.found.get_mut(&advert.name)?;
        if !prefixes.remove(&advert.prefix) {
            return None;
        }
        if prefixes.is_empty() {
            self.found.remove(&advert.name);
        }
        Some(advert)
    }

    /// Forget everything found under `prefix` after it was cancelled.
    pub fn forget_prefix(&mut self, prefix: &str) {
        self.found.retain(|_, prefixes| {
            prefixes.remove(prefix);
            !prefixes.is_empty()
        });
    }

    /// Whether `name` is currently found under any prefix.
    #[must_use]
    pub fn is_found(&self, name: &WellKnownName) -> bool {
        self.found.contains_key(name)
    }

    /// Currently found names, in order.
    #[must_use]
    pub fn found_names(&self) -> Vec<WellKnownName> {
        self.found.keys().cloned().collect()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.found.clear();
    }
}
