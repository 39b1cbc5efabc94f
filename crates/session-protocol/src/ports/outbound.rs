//! # Driven Ports (Outbound SPI)
//!
//! What the protocol requires from a bus runtime. Every call returns a
//! [`Disposition`]; the coordinator maps it onto
//! [`ProtocolError`](crate::domain::ProtocolError) at the call site.
//!
//! Asynchronous runtime notifications are not part of this trait: they
//! arrive as a stream of [`BusNotification`](shared_types::BusNotification)s
//! handed to [`spawn`](crate::service::spawn).

use std::sync::Arc;

use async_trait::async_trait;
use shared_types::entities::{BusId, SessionId, SessionPort, WellKnownName};
use shared_types::ipc::Disposition;
use shared_types::policy::AcceptPolicy;
use shared_types::session::{SessionOptions, TransportMask};

/// Abstract interface to the bus runtime.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the coordinator holds one behind an
/// `Arc` on its worker task.
///
/// # Example Implementation
///
/// ```rust,ignore
/// struct DaemonRuntime { conn: DaemonConnection }
///
/// #[async_trait]
/// impl BusRuntime for DaemonRuntime {
///     async fn request_name(&self, name: &WellKnownName) -> Disposition {
///         self.conn.call("RequestName", (name.as_str(), DO_NOT_QUEUE)).await.into()
///     }
///     // ...
/// }
/// ```
#[async_trait]
pub trait BusRuntime: Send + Sync {
    /// Unique name of this attachment.
    fn unique_name(&self) -> BusId;

    /// Connect to the bus.
    async fn connect(&self) -> Disposition;

    /// Disconnect from the bus, dropping everything held.
    async fn disconnect(&self) -> Disposition;

    /// Request a well-known name with do-not-queue semantics.
    async fn request_name(&self, name: &WellKnownName) -> Disposition;

    /// Release a well-known name.
    async fn release_name(&self, name: &WellKnownName) -> Disposition;

    /// Advertise an owned name.
    async fn advertise_name(&self, name: &WellKnownName, transports: TransportMask)
        -> Disposition;

    /// Withdraw an advertisement.
    async fn cancel_advertise_name(&self, name: &WellKnownName) -> Disposition;

    /// Start discovering names beginning with `prefix`.
    async fn find_advertised_name(&self, prefix: &str) -> Disposition;

    /// Stop discovering `prefix`.
    async fn cancel_find_advertised_name(&self, prefix: &str) -> Disposition;

    /// Bind a session port. The policy is evaluated synchronously for every
    /// join attempt, off the protocol worker.
    async fn bind_session_port(
        &self,
        port: SessionPort,
        options: SessionOptions,
        policy: Arc<dyn AcceptPolicy>,
    ) -> Result<SessionPort, Disposition>;

    /// Unbind a session port.
    async fn unbind_session_port(&self, port: SessionPort) -> Disposition;

    /// Join the session hosted by `host` on `port`.
    async fn join_session(
        &self,
        host: &WellKnownName,
        port: SessionPort,
        options: &SessionOptions,
    ) -> Result<SessionId, Disposition>;

    /// Leave a session membership.
    async fn leave_session(&self, session_id: SessionId) -> Disposition;

    /// Multicast a signal on a session. Returns the number of recipients.
    async fn emit_signal(
        &self,
        session_id: SessionId,
        interface: &str,
        member: &str,
        payload: &[u8],
    ) -> Result<usize, Disposition>;
}
