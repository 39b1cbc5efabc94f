//! Domain Errors for the Session Protocol
//!
//! Every runtime disposition is mapped onto this taxonomy at the call site
//! that issued it; nothing is retried automatically.

use shared_types::entities::{SessionPort, WellKnownName};
use shared_types::errors::NameError;
use shared_types::ipc::Disposition;
use thiserror::Error;

/// Errors surfaced by protocol operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The name is already owned (possibly by this peer). Never queued.
    #[error("Name already owned: {0}")]
    NameConflict(WellKnownName),

    /// Discovery is already running for this prefix.
    #[error("Already discovering prefix: {0}")]
    AlreadyDiscovering(String),

    /// The session port is already bound on this attachment.
    #[error("Session port already bound: {0}")]
    AlreadyBound(SessionPort),

    /// Release of a name that another peer owns.
    #[error("Name owned by another peer: {0}")]
    NotOwner(WellKnownName),

    /// The operation needs a connected bus attachment.
    #[error("Not connected to the bus")]
    NotConnected,

    /// The runtime or the remote host refused the request.
    #[error("{operation} rejected")]
    Rejected { operation: &'static str },

    /// The join target could not be reached. A fresh `found` may be retried.
    #[error("Channel unreachable: {0}")]
    Unreachable(WellKnownName),

    /// The requested session options are not acceptable to the host.
    #[error("Incompatible session options for {0}")]
    IncompatibleOptions(WellKnownName),

    /// Advertising a name this peer does not own.
    #[error("Cannot advertise a name that is not owned: {0}")]
    NotAdvertisable(WellKnownName),

    /// The operation does not apply in the current protocol state.
    #[error("Cannot {operation}: {reason}")]
    InvalidState {
        operation: &'static str,
        reason: String,
    },

    /// Any runtime failure without a more specific mapping.
    #[error("{operation} failed: {disposition}")]
    Runtime {
        operation: &'static str,
        disposition: Disposition,
    },

    /// The protocol worker is gone; no further operations are possible.
    #[error("Protocol worker stopped")]
    WorkerStopped,

    /// A name or prefix failed validation.
    #[error(transparent)]
    InvalidName(#[from] NameError),
}

impl ProtocolError {
    /// Generic runtime failure.
    #[must_use]
    pub fn runtime(operation: &'static str, disposition: Disposition) -> Self {
        Self::Runtime {
            operation,
            disposition,
        }
    }

    /// Operation not applicable in the current state.
    #[must_use]
    pub fn invalid_state(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidState {
            operation,
            reason: reason.into(),
        }
    }

    /// Whether this error belongs to the conflict class (never auto-retried).
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::NameConflict(_) | Self::AlreadyDiscovering(_) | Self::AlreadyBound(_)
        )
    }
}
