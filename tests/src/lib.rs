//! # Peerlink Test Suite
//!
//! Cross-crate tests: several peers, each with its own coordinator worker,
//! attached to one in-process router.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Router and protocol benchmarks
//! └── src/integration/
//!     ├── mod.rs        # Peer fixtures
//!     ├── scenarios.rs  # Protocol properties (echo, isolation, teardown)
//!     └── flows.rs      # Multi-peer channel lifecycles
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p pl-tests
//! cargo test -p pl-tests integration::scenarios::
//! cargo bench -p pl-tests
//! ```

#![allow(clippy::unwrap_used)]

pub mod integration;
