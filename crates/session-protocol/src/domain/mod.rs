//! Domain Layer - Pure protocol bookkeeping with no I/O
//!
//! This module contains:
//! - Name ownership, advertisement and discovery-prefix tracking
//! - Session port bindings with gated admission policies
//! - The two-view session table and canonical selection
//! - Found/lost normalization
//! - Channel lifecycle, configuration, errors and observer events

pub mod channel;
pub mod discovery;
pub mod errors;
pub mod events;
pub mod name_registry;
pub mod port_binder;
pub mod session_table;

pub use channel::*;
pub use discovery::*;
pub use errors::*;
pub use events::*;
pub use name_registry::*;
pub use port_binder::*;
pub use session_table::*;
