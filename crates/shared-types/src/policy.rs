//! # Admission Policies
//!
//! A bound session port carries an [`AcceptPolicy`] that the runtime consults
//! once per incoming join attempt. The answer must be synchronous: the joiner
//! is blocked in its join call until the policy returns, and the session does
//! not exist before that.
//!
//! Policies are evaluated on the joiner's call path, not on the host's
//! protocol worker, so two peers joining each other at the same time cannot
//! deadlock. A policy must therefore be `Send + Sync` and must not touch the
//! host's protocol state.

use crate::entities::{BusId, SessionPort};
use crate::session::SessionOptions;

/// Admission-control decision for incoming joiners.
pub trait AcceptPolicy: Send + Sync {
    /// Decide whether `joiner` may join on `port` with `options`.
    fn accept(&self, port: SessionPort, joiner: &BusId, options: &SessionOptions) -> bool;
}

impl<F> AcceptPolicy for F
where
    F: Fn(SessionPort, &BusId, &SessionOptions) -> bool + Send + Sync,
{
    fn accept(&self, port: SessionPort, joiner: &BusId, options: &SessionOptions) -> bool {
        self(port, joiner, options)
    }
}

/// Accept every joiner.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl AcceptPolicy for AcceptAll {
    fn accept(&self, _port: SessionPort, _joiner: &BusId, _options: &SessionOptions) -> bool {
        true
    }
}

/// Refuse every joiner.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectAll;

impl AcceptPolicy for RejectAll {
    fn accept(&self, _port: SessionPort, _joiner: &BusId, _options: &SessionOptions) -> bool {
        false
    }
}

/// Accept anyone who gets the contact port right.
#[derive(Debug, Clone, Copy)]
pub struct ContactPortOnly(pub SessionPort);

impl AcceptPolicy for ContactPortOnly {
    fn accept(&self, port: SessionPort, _joiner: &BusId, _options: &SessionOptions) -> bool {
        port == self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joiner() -> BusId {
        BusId::new("cafe", 1)
    }

    #[test]
    fn test_builtin_policies() {
        let opts = SessionOptions::multipoint_messages();
        assert!(AcceptAll.accept(SessionPort::new(1), &joiner(), &opts));
        assert!(!RejectAll.accept(SessionPort::new(1), &joiner(), &opts));

        let contact = ContactPortOnly(SessionPort::new(42));
        assert!(contact.accept(SessionPort::new(42), &joiner(), &opts));
        assert!(!contact.accept(SessionPort::new(43), &joiner(), &opts));
    }

    #[test]
    fn test_closure_policy() {
        let allowed = joiner();
        let policy = move |_: SessionPort, who: &BusId, _: &SessionOptions| *who == allowed;
        let opts = SessionOptions::default();
        assert!(policy.accept(SessionPort::ANY, &joiner(), &opts));
        assert!(!policy.accept(SessionPort::ANY, &BusId::new("beef", 2), &opts));
    }
}
