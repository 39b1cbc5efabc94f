//! # Session Port Binder
//!
//! Locally bound session ports and their admission policies.
//!
//! Each binding wraps the caller's [`AcceptPolicy`] in a [`GatedPolicy`].
//! Unbinding closes the gate before the runtime is asked to unbind, so from
//! that moment on every join attempt on the port is refused even if the
//! runtime has not yet dropped the binding.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use shared_types::entities::{BusId, SessionPort};
use shared_types::policy::AcceptPolicy;
use shared_types::session::SessionOptions;

use super::errors::ProtocolError;

/// An admission policy behind an on/off gate.
#[derive(Clone)]
pub struct GatedPolicy {
    open: Arc<AtomicBool>,
    inner: Arc<dyn AcceptPolicy>,
}

impl GatedPolicy {
    /// Wrap `inner` behind an open gate.
    #[must_use]
    pub fn new(inner: Arc<dyn AcceptPolicy>) -> Self {
        Self {
            open: Arc::new(AtomicBool::new(true)),
            inner,
        }
    }

    /// Refuse every later join attempt.
    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
    }

    /// Whether joins may still be admitted.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

impl AcceptPolicy for GatedPolicy {
    fn accept(&self, port: SessionPort, joiner: &BusId, options: &SessionOptions) -> bool {
        self.is_open() && self.inner.accept(port, joiner, options)
    }
}

/// A port bound on this attachment.
#[derive(Clone)]
pub struct BoundPort {
    /// The concrete port (never [`SessionPort::ANY`]).
    pub port: SessionPort,
    /// Options template joiners must be compatible with.
    pub options: SessionOptions,
    gate: GatedPolicy,
}

impl BoundPort {
    /// Whether joins on this port are still admitted.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.gate.is_open()
    }
}

/// Locally bound session ports.
#[derive(Default)]
pub struct SessionPortBinder {
    bound: BTreeMap<SessionPort, BoundPort>,
}

impl SessionPortBinder {
    /// Create an empty binder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a bind request and build the gated policy to hand the runtime.
    ///
    /// A specific port that is already bound locally fails with
    /// `AlreadyBound`; [`SessionPort::ANY`] always passes.
    pub fn prepare(
        &self,
        hint: SessionPort,
        policy: Arc<dyn AcceptPolicy>,
    ) -> Result<GatedPolicy, ProtocolError> {
        if !hint.is_any() && self.bound.contains_key(&hint) {
            return Err(ProtocolError::AlreadyBound(hint));
        }
        Ok(GatedPolicy::new(policy))
    }

    /// Record a binding the runtime accepted.
    pub fn record_bound(&mut self, port: SessionPort, options: SessionOptions, gate: GatedPolicy) {
        self.bound.insert(
            port,
            BoundPort {
                port,
                options,
                gate,
            },
        );
    }

    /// Close the gate of `port` ahead of unbinding it.
    pub fn close(&mut self, port: SessionPort) -> Result<(), ProtocolError> {
        let bound = self
            .bound
            .get(&port)
            .ok_or_else(|| ProtocolError::invalid_state("unbind", format!("port {port} is not bound")))?;
        bound.gate.close();
        Ok(())
    }

    /// Forget a binding after the runtime dropped it.
    pub fn remove(&mut self, port: SessionPort) -> Option<BoundPort> {
        self.bound.remove(&port)
    }

    /// Whether `port` is bound and still admitting joiners.
    ///
    /// A `sessionJoined` for a port that fails this check must not create
    /// an implicit session.
    #[must_use]
    pub fn admits(&self, port: SessionPort) -> bool {
        self.bound.get(&port).is_some_and(BoundPort::is_open)
    }

    /// Whether `port` is bound (gate open or not).
    #[must_use]
    pub fn is_bound(&self, port: SessionPort) -> bool {
        self.bound.contains_key(&port)
    }

    /// Look up a binding.
    #[must_use]
    pub fn get(&self, port: SessionPort) -> Option<&BoundPort> {
        self.bound.get(&port)
    }

    /// Bound ports, in order.
    #[must_use]
    pub fn ports(&self) -> Vec<SessionPort> {
        self.bound.keys().copied().collect()
    }

    /// Close every gate and forget every binding.
    pub fn clear(&mut self) {
        for bound in self.bound.values() {
            bound.gate.close();
        }
        self.bound.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::policy::{AcceptAll, ContactPortOnly};

    fn joiner() -> BusId {
        BusId::new("bb", 9)
    }

    #[test]
    fn test_prepare_rejects_locally_bound_port() {
        let mut binder = SessionPortBinder::new();
        let gate = binder.prepare(SessionPort::new(42), Arc::new(AcceptAll)).unwrap();
        binder.record_bound(SessionPort::new(42), SessionOptions::default(), gate);

        assert!(matches!(
            binder.prepare(SessionPort::new(42), Arc::new(AcceptAll)),
            Err(ProtocolError::AlreadyBound(p)) if p == SessionPort::new(42)
        ));
        assert!(binder.prepare(SessionPort::ANY, Arc::new(AcceptAll)).is_ok());
    }

    #[test]
    fn test_gate_wraps_inner_policy() {
        let gate = GatedPolicy::new(Arc::new(ContactPortOnly(SessionPort::new(42))));
        let opts = SessionOptions::multipoint_messages();
        assert!(gate.accept(SessionPort::new(42), &joiner(), &opts));
        assert!(!gate.accept(SessionPort::new(7), &joiner(), &opts));
    }

    #[test]
    fn test_close_refuses_later_joins() {
        let mut binder = SessionPortBinder::new();
        let gate = binder.prepare(SessionPort::new(42), Arc::new(AcceptAll)).unwrap();
        let runtime_copy = gate.clone();
        binder.record_bound(SessionPort::new(42), SessionOptions::default(), gate);
        assert!(binder.admits(SessionPort::new(42)));

        binder.close(SessionPort::new(42)).unwrap();
        assert!(!binder.admits(SessionPort::new(42)));
        assert!(binder.is_bound(SessionPort::new(42)));
        assert!(!runtime_copy.accept(SessionPort::new(42), &joiner(), &SessionOptions::default()));
    }

    #[test]
    fn test_close_unknown_port() {
        let mut binder = SessionPortBinder::new();
        assert!(matches!(
            binder.close(SessionPort::new(5)),
            Err(ProtocolError::InvalidState { operation: "unbind", .. })
        ));
    }

    #[test]
    fn test_clear_closes_all_gates() {
        let mut binder = SessionPortBinder::new();
        let gate = binder.prepare(SessionPort::new(1), Arc::new(AcceptAll)).unwrap();
        let runtime_copy = gate.clone();
        binder.record_bound(SessionPort::new(1), SessionOptions::default(), gate);

        binder.clear();
        assert!(binder.ports().is_empty());
        assert!(!runtime_copy.is_open());
    }
}
