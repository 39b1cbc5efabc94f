//! # Session Coordinator Service
//!
//! The coordinator owns all protocol state of one peer and is driven by a
//! single worker task:
//!
//! - `core`: state, component-level operations (names, ports, sessions)
//! - `api`: channel-level composites (host, discover, use, teardown)
//! - `events`: bus notification handling
//! - `messenger`: outbound sends and inbound filtering
//! - `worker`: the queue, the worker task and [`CoordinatorHandle`]

mod api;
mod core;
mod events;
mod messenger;
mod signals;
mod worker;

pub use core::{SessionCoordinator, EVENT_CHANNEL_CAPACITY};
pub use messenger::{Delivery, MulticastMessenger};
pub use signals::{SignalHandler, SignalTable};
pub use worker::{spawn, CoordinatorHandle};
