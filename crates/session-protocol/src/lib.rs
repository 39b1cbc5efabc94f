//! # Session Protocol
//!
//! Drives one peer of a Peerlink channel: well-known name ownership,
//! session port binding, prefix discovery, explicit and implicit sessions,
//! and multicast signals on a canonical session.
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture with:
//! - **Domain Layer:** pure bookkeeping (`NameRegistry`, `SessionPortBinder`,
//!   `SessionTable`, `DiscoveryEngine`), channel state and errors
//! - **Ports Layer:** `ChannelApi` (driving) and `BusRuntime` (driven)
//! - **Service Layer:** `SessionCoordinator` and its single worker task
//!
//! ```text
//!  application ──ChannelApi──► CoordinatorHandle ──queue──► worker
//!                                                             │
//!                                      SessionCoordinator ◄───┘
//!                                             │
//!                                        BusRuntime ──► bus
//!                  NotificationStream ──queue──┘
//! ```
//!
//! ## Sessions
//!
//! A peer may observe two ids for one logical channel: the one it joined
//! (explicit) and the one created when a joiner was admitted on its bound
//! port (implicit). Only explicit sessions are used for sending; the first
//! one joined is *canonical*. Implicit sessions are routing paths and are
//! never merged with explicit ones.
//!
//! ## Example
//!
//! ```rust,ignore
//! use session_protocol::{spawn, ChannelApi, ChannelConfig, SessionCoordinator};
//!
//! let coordinator = SessionCoordinator::new(runtime, ChannelConfig::default())?;
//! let (handle, _worker) = spawn(coordinator, notifications);
//!
//! handle.connect().await?;
//! handle.host_channel("lobby").await?;
//! handle.start_discovery().await?;
//! handle.send(b"hello".to_vec()).await?;
//! handle.leave().await?;
//! ```

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

// =============================================================================
// CORE MODULES
// =============================================================================

pub mod domain;
pub mod ports;
pub mod service;

/// Test utilities (RecordingRuntime).
/// Requires feature: `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// =============================================================================
// RE-EXPORTS
// =============================================================================

// Domain
pub use domain::{
    BoundPort, CanonicalChange, ChannelConfig, ChannelState, CoordinatorEvent, DiscoveryEngine,
    GatedPolicy, HostedSession, JoinedSession, LostOutcome, NameRegistry, ProtocolError,
    SessionOrigin, SessionPortBinder, SessionTable, DEFAULT_CONTACT_PORT, DEFAULT_INTERFACE,
    DEFAULT_MEMBER, DEFAULT_NAME_PREFIX,
};

// Port traits
pub use ports::{BusRuntime, ChannelApi, ChannelStatus, MessengerStats, SendOutcome};

// Service
pub use service::{
    spawn, CoordinatorHandle, Delivery, MulticastMessenger, SessionCoordinator, SignalHandler,
    SignalTable, EVENT_CHANNEL_CAPACITY,
};
