//! # Gatehouse Test Suite
//!
//! Unified integration crate exercising the helper runtime, the client
//! library, and the protocol end to end over the in-process transport.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── support.rs        # Harness: helper service + fakes + client factory
//! │
//! └── integration/
//!     ├── dispatch.rs   # Per-message state machine scenarios
//!     ├── rights.rs     # Startup rights synchronization
//!     ├── watchdog.rs   # Idle-exit behavior across connections
//!     └── client.rs     # Client-side failure plane separation
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p gatehouse-tests
//!
//! # By area
//! cargo test -p gatehouse-tests integration::dispatch
//! cargo test -p gatehouse-tests integration::watchdog
//! ```

#![allow(dead_code)]

pub mod integration;
pub mod support;
