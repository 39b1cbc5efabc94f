//! # Shared Bus - In-Process Routing Daemon
//!
//! A bus runtime that lives inside one process. It owns the bus-wide tables
//! (name owners, advertisements, bound ports, sessions) and routes discovery
//! events, session events and signals between attachments.
//!
//! ```text
//! ┌──────────────┐                          ┌──────────────┐
//! │   Peer A     │  join_session()          │   Peer B     │
//! │ BusAttachment│ ──────┐                  │ BusAttachment│
//! └──────────────┘       │                  └──────────────┘
//!        ↑               ▼                          ↑
//!        │        ┌──────────────┐                  │
//!        │        │InMemoryRouter│──SessionJoined───┘
//!        │        │              │
//!        └─Signal─└──────────────┘
//!  NotificationStream
//! ```
//!
//! ## Guarantees
//!
//! - **Non-blocking delivery:** notifications are queued without bound per
//!   attachment; a slow consumer never stalls the router.
//! - **Single delivery:** `SessionLost` reaches each remaining member once.
//! - **Lock-free admission:** accept policies run with the router unlocked.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod attachment;
pub mod notifications;
pub mod router;

// Re-export main types
pub use attachment::BusAttachment;
pub use notifications::{NotificationStream, RouterError};
pub use router::{InMemoryRouter, RouterStats};

/// First port handed out for [`SessionPort::ANY`](shared_types::SessionPort::ANY) bindings.
pub const FIRST_DYNAMIC_PORT: u16 = 0x8000;
