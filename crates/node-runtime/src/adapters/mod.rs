//! # Adapter Implementations
//!
//! Concrete implementations of the session protocol's outbound port.
//!
//! ```text
//! SessionCoordinator ──BusRuntime──► InMemoryBusAdapter ──► BusAttachment ──► InMemoryRouter
//! ```

pub mod bus_runtime;

pub use bus_runtime::InMemoryBusAdapter;
