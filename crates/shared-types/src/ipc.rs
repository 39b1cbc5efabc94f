//! # Runtime Messages
//!
//! The vocabulary exchanged between a bus runtime and the session protocol:
//! disposition codes returned by every runtime call, and the asynchronous
//! notifications the runtime pushes back.
//!
//! ```text
//!  session protocol ──request_name / join_session / ...──→ bus runtime
//!         ↑                                                     │
//!         └──────────── Disposition (synchronous) ──────────────┤
//!         └──────────── BusNotification (asynchronous) ─────────┘
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entities::{Advertisement, BusId, SessionId, SessionPort, WellKnownName};

/// Result code of a bus runtime call.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// The call succeeded.
    Success,
    /// The name, prefix, port or membership already exists.
    AlreadyExists,
    /// The target does not exist (or is not reachable).
    NotFound,
    /// The request was refused.
    Rejected,
    /// The supplied session options are not acceptable.
    BadOptions,
    /// Any other failure (including "not connected").
    Failed,
}

impl Disposition {
    /// Whether this disposition signals success.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Convert to a `Result`, keeping the failure code.
    pub fn into_result(self) -> Result<(), Disposition> {
        match self {
            Self::Success => Ok(()),
            other => Err(other),
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::AlreadyExists => write!(f, "already exists"),
            Self::NotFound => write!(f, "not found"),
            Self::Rejected => write!(f, "rejected"),
            Self::BadOptions => write!(f, "bad options"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A signal received over a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundSignal {
    /// Unique name of the sending attachment.
    pub sender: BusId,
    /// Session the signal travelled on.
    pub session_id: SessionId,
    /// Interface the signal belongs to.
    pub interface: String,
    /// Signal member name.
    pub member: String,
    /// Opaque application payload.
    pub payload: Vec<u8>,
}

/// Asynchronous notifications pushed by the bus runtime to one attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusNotification {
    /// An advertisement matching one of our discovery prefixes appeared.
    FoundAdvertisedName(Advertisement),

    /// A previously found advertisement went away.
    LostAdvertisedName(Advertisement),

    /// A joiner was admitted on one of our bound ports.
    ///
    /// This is the only notification of an implicit session.
    SessionJoined {
        /// The bound port that admitted the joiner.
        port: SessionPort,
        /// Session the joiner was placed in.
        session_id: SessionId,
        /// Unique name of the joiner.
        joiner: BusId,
    },

    /// A session we were a member of ended. Delivered once per loss.
    SessionLost {
        /// The session that ended.
        session_id: SessionId,
    },

    /// A signal arrived on a session we are a member of.
    Signal(InboundSignal),

    /// Ownership of a well-known name changed.
    NameOwnerChanged {
        /// The name whose owner changed.
        name: WellKnownName,
        /// Previous owner, if any.
        previous_owner: Option<BusId>,
        /// New owner, if any.
        new_owner: Option<BusId>,
    },

    /// The runtime is shutting down; every attachment is being dropped.
    BusStopping,
}

impl BusNotification {
    /// Short label for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::FoundAdvertisedName(_) => "found_advertised_name",
            Self::LostAdvertisedName(_) => "lost_advertised_name",
            Self::SessionJoined { .. } => "session_joined",
            Self::SessionLost { .. } => "session_lost",
            Self::Signal(_) => "signal",
            Self::NameOwnerChanged { .. } => "name_owner_changed",
            Self::BusStopping => "bus_stopping",
        }
    }
}
