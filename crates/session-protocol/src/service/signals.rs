//! Explicit `(interface, member) -> handler` registration table, built at
//! startup and owned by the protocol worker.

use std::collections::HashMap;

use shared_types::ipc::InboundSignal;

use crate::domain::ProtocolError;

/// Receives signals that passed the messenger's filters.
///
/// Handlers run on the protocol worker and must not block.
pub trait SignalHandler: Send {
    /// Handle one inbound signal.
    fn on_signal(&mut self, signal: &InboundSignal);
}

impl<F> SignalHandler for F
where
    F: FnMut(&InboundSignal) + Send,
{
    fn on_signal(&mut self, signal: &InboundSignal) {
        self(signal);
    }
}

/// Handlers keyed by interface and member name.
#[derive(Default)]
pub struct SignalTable {
    handlers: HashMap<(String, String), Box<dyn SignalHandler>>,
}

impl SignalTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Each `(interface, member)` pair takes one handler.
    pub fn register(
        &mut self,
        interface: impl Into<String>,
        member: impl Into<String>,
        handler: impl SignalHandler + 'static,
    ) -> Result<(), ProtocolError> {
        let key = (interface.into(), member.into());
        if self.handlers.contains_key(&key) {
            return Err(ProtocolError::invalid_state(
                "register signal handler",
                format!("{}.{} already has a handler", key.0, key.1),
            ));
        }
        self.handlers.insert(key, Box::new(handler));
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(
        mut self,
        interface: impl Into<String>,
        member: impl Into<String>,
        handler: impl SignalHandler + 'static,
    ) -> Result<Self, ProtocolError> {
        self.register(interface, member, handler)?;
        Ok(self)
    }

    /// Whether a handler exists for the pair.
    #[must_use]
    pub fn is_registered(&self, interface: &str, member: &str) -> bool {
        self.handlers
            .contains_key(&(interface.to_string(), member.to_string()))
    }

    /// Hand a signal to its handler. Returns `false` when none is registered.
    pub fn dispatch(&mut self, signal: &InboundSignal) -> bool {
        let key = (signal.interface.clone(), signal.member.clone());
        match self.handlers.get_mut(&key) {
            Some(handler) => {
                handler.on_signal(signal);
                true
            }
            None => false,
        }
    }
}
