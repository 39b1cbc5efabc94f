//! # Notification Stream
//!
//! The receiving side of one bus attachment. Every attachment owns exactly
//! one stream; notifications are queued without bound so a slow consumer
//! never loses a `SessionLost`.

use std::pin::Pin;
use std::task::{Context, Poll};

use shared_types::entities::BusId;
use shared_types::ipc::BusNotification;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tracing::trace;

/// Errors from the receiving side of an attachment.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// The router dropped this attachment (shutdown or router dropped).
    #[error("Router closed")]
    Closed,
}

/// Asynchronous notifications addressed to one attachment.
pub struct NotificationStream {
    owner: BusId,
    receiver: mpsc::UnboundedReceiver<BusNotification>,
}

impl NotificationStream {
    pub(crate) fn new(owner: BusId, receiver: mpsc::UnboundedReceiver<BusNotification>) -> Self {
        Self { owner, receiver }
    }

    /// Unique name of the attachment this stream belongs to.
    #[must_use]
    pub fn owner(&self) -> &BusId {
        &self.owner
    }

    /// Receive the next notification.
    ///
    /// Returns `None` once the router has dropped this attachment and the
    /// queue is drained.
    pub async fn recv(&mut self) -> Option<BusNotification> {
        let notification = self.receiver.recv().await?;
        trace!(owner = %self.owner, kind = notification.kind(), "Notification received");
        Some(notification)
    }

    /// Try to receive the next notification without waiting.
    ///
    /// - `Ok(Some(n))`: a notification was available
    /// - `Ok(None)`: nothing queued right now
    /// - `Err(RouterError::Closed)`: the router dropped this attachment
    pub fn try_recv(&mut self) -> Result<Option<BusNotification>, RouterError> {
        match self.receiver.try_recv() {
            Ok(notification) => Ok(Some(notification)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(RouterError::Closed),
        }
    }
}

impl Stream for NotificationStream {
    type Item = BusNotification;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
