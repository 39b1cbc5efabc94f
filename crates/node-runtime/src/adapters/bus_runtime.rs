//! # In-Process Bus Adapter
//!
//! Implements the coordinator's [`BusRuntime`] port on top of a
//! [`BusAttachment`] of the in-process router.

use std::sync::Arc;

use async_trait::async_trait;
use session_protocol::BusRuntime;
use shared_bus::BusAttachment;
use shared_types::entities::{BusId, SessionId, SessionPort, WellKnownName};
use shared_types::ipc::Disposition;
use shared_types::policy::AcceptPolicy;
use shared_types::session::{SessionOptions, TransportMask};

/// Adapter: `BusAttachment` → `BusRuntime`.
///
/// The router answers synchronously under a short lock, so every call
/// completes without suspending. Join admission runs the host's policy on
/// this call path with the router unlocked.
#[derive(Debug, Clone)]
pub struct InMemoryBusAdapter {
    attachment: BusAttachment,
}

impl InMemoryBusAdapter {
    /// Wrap an attachment.
    pub fn new(attachment: BusAttachment) -> Self {
        Self { attachment }
    }

    /// The wrapped attachment.
    pub fn attachment(&self) -> &BusAttachment {
        &self.attachment
    }
}

#[async_trait]
impl BusRuntime for InMemoryBusAdapter {
    fn unique_name(&self) -> BusId {
        self.attachment.unique_name().clone()
    }

    async fn connect(&self) -> Disposition {
        self.attachment.connect()
    }

    async fn disconnect(&self) -> Disposition {
        self.attachment.disconnect()
    }

    async fn request_name(&self, name: &WellKnownName) -> Disposition {
        self.attachment.request_name(name)
    }

    async fn release_name(&self, name: &WellKnownName) -> Disposition {
        self.attachment.release_name(name)
    }

    async fn advertise_name(&self, name: &WellKnownName, transports: TransportMask) -> Disposition {
        self.attachment.advertise_name(name, transports)
    }

    async fn cancel_advertise_name(&self, name: &WellKnownName) -> Disposition {
        self.attachment.cancel_advertise_name(name)
    }

    async fn find_advertised_name(&self, prefix: &str) -> Disposition {
        self.attachment.find_advertised_name(prefix)
    }

    async fn cancel_find_advertised_name(&self, prefix: &str) -> Disposition {
        self.attachment.cancel_find_advertised_name(prefix)
    }

    async fn bind_session_port(
        &self,
        port: SessionPort,
        options: SessionOptions,
        policy: Arc<dyn AcceptPolicy>,
    ) -> Result<SessionPort, Disposition> {
        self.attachment.bind_session_port(port, options, policy)
    }

    async fn unbind_session_port(&self, port: SessionPort) -> Disposition {
        self.attachment.unbind_session_port(port)
    }

    async fn join_session(
        &self,
        host: &WellKnownName,
        port: SessionPort,
        options: &SessionOptions,
    ) -> Result<SessionId, Disposition> {
        self.attachment.join_session(host, port, options)
    }

    async fn leave_session(&self, session_id: SessionId) -> Disposition {
        self.attachment.leave_session(session_id)
    }

    async fn emit_signal(
        &self,
        session_id: SessionId,
        interface: &str,
        member: &str,
        payload: &[u8],
    ) -> Result<usize, Disposition> {
        self.attachment
            .emit_signal(session_id, interface, member, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_bus::InMemoryRouter;

    #[tokio::test]
    async fn test_adapter_forwards_to_attachment() {
        let router = InMemoryRouter::new();
        let (attachment, _stream) = router.attach();
        let adapter = InMemoryBusAdapter::new(attachment);
        let name = WellKnownName::parse("org.peerlink.chat.alice").unwrap();

        assert_eq!(adapter.request_name(&name).await, Disposition::Failed);
        assert_eq!(adapter.connect().await, Disposition::Success);
        assert_eq!(adapter.request_name(&name).await, Disposition::Success);
        assert!(adapter.attachment().is_connected());
        assert_eq!(&adapter.unique_name(), adapter.attachment().unique_name());
    }
}
