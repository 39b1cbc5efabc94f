//! # Ports Layer - Hexagonal Architecture Boundaries
//!
//! - **Driving Port (Inbound):** [`ChannelApi`], what applications call
//! - **Driven Port (Outbound):** [`BusRuntime`], what a bus runtime provides

pub mod inbound;
pub mod outbound;

pub use inbound::{ChannelApi, ChannelStatus, MessengerStats, SendOutcome};
pub use outbound::BusRuntime;
