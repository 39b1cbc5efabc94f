//! Test utilities for the session protocol.
//!
//! [`RecordingRuntime`] is a scripted [`BusRuntime`] that records every call
//! and answers `Success` unless a failure was queued for the operation.
//! Enable with the `test-utils` feature flag.
//!
//! # Example
//!
//! ```rust
//! use session_protocol::test_utils::RecordingRuntime;
//! use shared_types::Disposition;
//!
//! let runtime = RecordingRuntime::new();
//! runtime.fail_next("request_name", Disposition::AlreadyExists);
//! assert!(runtime.operations().is_empty());
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::entities::{BusId, SessionId, SessionPort, WellKnownName};
use shared_types::ipc::Disposition;
use shared_types::policy::AcceptPolicy;
use shared_types::session::{SessionOptions, TransportMask};

use crate::ports::BusRuntime;

/// First session id handed out by [`RecordingRuntime::join_session`].
pub const FIRST_RECORDED_SESSION: u32 = 100;

/// One call made against a [`RecordingRuntime`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    Connect,
    Disconnect,
    RequestName(WellKnownName),
    ReleaseName(WellKnownName),
    AdvertiseName(WellKnownName, TransportMask),
    CancelAdvertiseName(WellKnownName),
    FindAdvertisedName(String),
    CancelFindAdvertisedName(String),
    BindSessionPort(SessionPort, SessionOptions),
    UnbindSessionPort(SessionPort),
    JoinSession(WellKnownName, SessionPort),
    LeaveSession(SessionId),
    EmitSignal(SessionId, Vec<u8>),
}

impl RuntimeCall {
    /// Operation name, as accepted by [`RecordingRuntime::fail_next`].
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::RequestName(_) => "request_name",
            Self::ReleaseName(_) => "release_name",
            Self::AdvertiseName(..) => "advertise_name",
            Self::CancelAdvertiseName(_) => "cancel_advertise_name",
            Self::FindAdvertisedName(_) => "find_advertised_name",
            Self::CancelFindAdvertisedName(_) => "cancel_find_advertised_name",
            Self::BindSessionPort(..) => "bind_session_port",
            Self::UnbindSessionPort(_) => "unbind_session_port",
            Self::JoinSession(..) => "join_session",
            Self::LeaveSession(_) => "leave_session",
            Self::EmitSignal(..) => "emit_signal",
        }
    }
}

#[derive(Default)]
struct Recorded {
    calls: Vec<RuntimeCall>,
    failures: HashMap<&'static str, VecDeque<Disposition>>,
    policies: HashMap<SessionPort, Arc<dyn AcceptPolicy>>,
    next_session: u32,
    next_port: u16,
    recipients: usize,
}

/// Scripted bus runtime that records calls.
pub struct RecordingRuntime {
    unique_name: BusId,
    inner: Mutex<Recorded>,
}

impl Default for RecordingRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingRuntime {
    /// Create a runtime whose unique name is `:recorder.1`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_unique_name(BusId::new("recorder", 1))
    }

    /// Create a runtime with the given unique name.
    #[must_use]
    pub fn with_unique_name(unique_name: BusId) -> Self {
        Self {
            unique_name,
            inner: Mutex::new(Recorded {
                next_session: FIRST_RECORDED_SESSION,
                next_port: 0x8000,
                recipients: 1,
                ..Recorded::default()
            }),
        }
    }

    /// Make the next call of `operation` answer `disposition`. Queued
    /// failures are consumed in order.
    pub fn fail_next(&self, operation: &'static str, disposition: Disposition) {
        self.inner
            .lock()
            .failures
            .entry(operation)
            .or_default()
            .push_back(disposition);
    }

    /// Number of recipients reported by `emit_signal`.
    pub fn set_recipients(&self, recipients: usize) {
        self.inner.lock().recipients = recipients;
    }

    /// Every call so far.
    #[must_use]
    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.inner.lock().calls.clone()
    }

    /// Operation names of every call so far.
    #[must_use]
    pub fn operations(&self) -> Vec<&'static str> {
        self.inner
            .lock()
            .calls
            .iter()
            .map(RuntimeCall::operation)
            .collect()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    /// Policy most recently bound on `port`.
    #[must_use]
    pub fn policy(&self, port: SessionPort) -> Option<Arc<dyn AcceptPolicy>> {
        self.inner.lock().policies.get(&port).cloned()
    }

    fn record(&self, call: RuntimeCall) -> Option<Disposition> {
        let mut inner = self.inner.lock();
        let failure = inner
            .failures
            .get_mut(call.operation())
            .and_then(VecDeque::pop_front);
        inner.calls.push(call);
        failure
    }

    fn answer(&self, call: RuntimeCall) -> Disposition {
        self.record(call).unwrap_or(Disposition::Success)
    }
}

#[async_trait]
impl BusRuntime for RecordingRuntime {
    fn unique_name(&self) -> BusId {
        self.unique_name.clone()
    }

    async fn connect(&self) -> Disposition {
        self.answer(RuntimeCall::Connect)
    }

    async fn disconnect(&self) -> Disposition {
        self.answer(RuntimeCall::Disconnect)
    }

    async fn request_name(&self, name: &WellKnownName) -> Disposition {
        self.answer(RuntimeCall::RequestName(name.clone()))
    }

    async fn release_name(&self, name: &WellKnownName) -> Disposition {
        self.answer(RuntimeCall::ReleaseName(name.clone()))
    }

    async fn advertise_name(&self, name: &WellKnownName, transports: TransportMask) -> Disposition {
        self.answer(RuntimeCall::AdvertiseName(name.clone(), transports))
    }

    async fn cancel_advertise_name(&self, name: &WellKnownName) -> Disposition {
        self.answer(RuntimeCall::CancelAdvertiseName(name.clone()))
    }

    async fn find_advertised_name(&self, prefix: &str) -> Disposition {
        self.answer(RuntimeCall::FindAdvertisedName(prefix.to_string()))
    }

    async fn cancel_find_advertised_name(&self, prefix: &str) -> Disposition {
        self.answer(RuntimeCall::CancelFindAdvertisedName(prefix.to_string()))
    }

    async fn bind_session_port(
        &self,
        port: SessionPort,
        options: SessionOptions,
        policy: Arc<dyn AcceptPolicy>,
    ) -> Result<SessionPort, Disposition> {
        if let Some(failure) = self.record(RuntimeCall::BindSessionPort(port, options)) {
            return Err(failure);
        }
        let mut inner = self.inner.lock();
        let bound = if port.is_any() {
            let allocated = SessionPort(inner.next_port);
            inner.next_port = inner.next_port.wrapping_add(1);
            allocated
        } else {
            port
        };
        inner.policies.insert(bound, policy);
        Ok(bound)
    }

    async fn unbind_session_port(&self, port: SessionPort) -> Disposition {
        self.answer(RuntimeCall::UnbindSessionPort(port))
    }

    async fn join_session(
        &self,
        host: &WellKnownName,
        port: SessionPort,
        _options: &SessionOptions,
    ) -> Result<SessionId, Disposition> {
        if let Some(failure) = self.record(RuntimeCall::JoinSession(host.clone(), port)) {
            return Err(failure);
        }
        let mut inner = self.inner.lock();
        let id = SessionId(inner.next_session);
        inner.next_session += 1;
        Ok(id)
    }

    async fn leave_session(&self, session_id: SessionId) -> Disposition {
        self.answer(RuntimeCall::LeaveSession(session_id))
    }

    async fn emit_signal(
        &self,
        session_id: SessionId,
        _interface: &str,
        _member: &str,
        payload: &[u8],
    ) -> Result<usize, Disposition> {
        match self.record(RuntimeCall::EmitSignal(session_id, payload.to_vec())) {
            Some(failure) => Err(failure),
            None => Ok(self.inner.lock().recipients),
        }
    }
}
