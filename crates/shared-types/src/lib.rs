//! # Shared Types Crate
//!
//! Value types shared by the bus runtime, the session protocol and the
//! sample node.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every type that crosses a crate boundary is
//!   defined here.
//! - **Validated at Construction**: names cannot exist in an invalid form;
//!   deserialization goes through the same constructors.
//! - **Runtime-Agnostic**: nothing here knows how a runtime moves bytes.

pub mod entities;
pub mod errors;
pub mod ipc;
pub mod policy;
pub mod session;

pub use entities::*;
pub use errors::*;
pub use ipc::*;
pub use policy::*;
pub use session::*;
